//! CSV flat-file sources to `PatientSnapshot` converter.
//!
//! Reads the three tabular sources of the dashboard (patient directory,
//! medical history, vitals log), filters them by patient id and assembles
//! the derived metrics for the presentation layer.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use vitals_core::{
    aggregate, classify_bmi, compute_bmi, flag_vital, forecast_metric, latest_metric, risk_score,
    AggregatedVitals, FieldFlag, MetricsConfig, PatientProfile, PatientSnapshot, VitalsError,
    VitalsRecord,
};

/// One row of the medical-history source.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub patient_id: String,
    pub previous_conditions: Option<String>,
    pub medications: Option<String>,
}

/// Vitals-log rows after timestamp decoding, with the count of rows
/// dropped because their timestamp could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecords {
    pub records: Vec<VitalsRecord>,
    pub dropped: usize,
}

/// Summarize one patient from the three CSV sources.
pub fn summarize_patient_str(
    details_csv: &str,
    history_csv: &str,
    records_csv: &str,
    patient_id: &str,
    config: &MetricsConfig,
) -> Result<PatientSnapshot, VitalsError> {
    let wanted = patient_id.trim();

    let mut profile = parse_profiles(details_csv)?
        .into_iter()
        .find(|profile| profile.patient_id == wanted);
    let history = parse_history(history_csv)?
        .into_iter()
        .find(|entry| entry.patient_id == wanted);
    let parsed = parse_records(records_csv)?;
    let records: Vec<VitalsRecord> = parsed
        .records
        .into_iter()
        .filter(|record| record.patient_id == wanted)
        .collect();

    if profile.is_none() && history.is_none() && records.is_empty() {
        return Err(VitalsError::MissingData(format!("bệnh nhân {wanted}")));
    }

    if let Some(entry) = history {
        let profile = profile.get_or_insert_with(|| PatientProfile {
            patient_id: wanted.to_string(),
            ..PatientProfile::default()
        });
        profile.previous_conditions = entry.previous_conditions;
        profile.medications = entry.medications;
    }

    let vitals = aggregate(&records);

    let mut flags = Vec::new();
    let mut bmi = None;
    let mut bmi_category = None;
    let mut risk = None;
    let mut forecasts = Vec::new();

    if let Some(latest) = vitals.last() {
        flags.push(flag_vital(
            "systolic_bp",
            latest.systolic_bp,
            &config.systolic_range,
        ));
        flags.push(flag_vital(
            "diastolic_bp",
            latest.diastolic_bp,
            &config.diastolic_range,
        ));
        flags.push(flag_vital(
            "heart_rate",
            latest.heart_rate,
            &config.heart_rate_range,
        ));
        flags.push(flag_vital(
            "blood_sugar",
            latest.blood_sugar,
            &config.blood_sugar_range,
        ));

        // BMI from the most recent readings that carry both measurements.
        let weight_series: Vec<Option<f64>> = vitals.iter().map(|row| row.weight_kg).collect();
        let height_series: Vec<Option<f64>> = vitals.iter().map(|row| row.height_m).collect();
        if let (Ok(weight), Ok(height)) = (
            latest_metric("weight_kg", &weight_series),
            latest_metric("height_m", &height_series),
        ) {
            if let Ok(value) = compute_bmi(weight, height) {
                bmi_category = Some(classify_bmi(value));
                bmi = Some(value);
            }
        }
        flags.push(flag_vital("bmi", bmi, &config.bmi_range));

        if let (Some(systolic), Some(sugar), Some(bmi)) =
            (latest.systolic_bp, latest.blood_sugar, bmi)
        {
            risk = Some(risk_score(systolic, sugar, bmi));
        }

        append_forecast(
            &mut forecasts,
            "heart_rate",
            &series(&vitals, |row| row.heart_rate),
            config.forecast_horizon,
        );
        append_forecast(
            &mut forecasts,
            "weight_kg",
            &series(&vitals, |row| row.weight_kg),
            config.forecast_horizon,
        );
    }

    Ok(PatientSnapshot::new(
        profile,
        vitals,
        parsed.dropped,
        flags,
        bmi,
        bmi_category,
        risk,
        forecasts,
    ))
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    patient_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    age: Option<u32>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    contact_info: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    emergency_contact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    patient_id: String,
    #[serde(default)]
    previous_medical_condition: Option<String>,
    #[serde(default)]
    medications_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VitalsRow {
    patient_id: String,
    #[serde(default)]
    date_recorded: Option<String>,
    #[serde(default)]
    blood_pressure_systolic: Option<f64>,
    #[serde(default)]
    blood_pressure_diastolic: Option<f64>,
    #[serde(default)]
    heart_rate: Option<f64>,
    #[serde(default)]
    respiratory_rate: Option<f64>,
    #[serde(default)]
    blood_sugar_level: Option<f64>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

/// Parse the patient-directory source.
pub fn parse_profiles(csv_text: &str) -> Result<Vec<PatientProfile>, VitalsError> {
    let mut profiles = Vec::new();
    for row in read_rows::<ProfileRow>(csv_text)? {
        profiles.push(PatientProfile {
            patient_id: row.patient_id.trim().to_string(),
            name: clean(row.name),
            age: row.age,
            gender: clean(row.gender),
            contact_info: clean(row.contact_info),
            address: clean(row.address),
            emergency_contact: clean(row.emergency_contact),
            previous_conditions: None,
            medications: None,
        });
    }
    Ok(profiles)
}

/// Parse the medical-history source.
pub fn parse_history(csv_text: &str) -> Result<Vec<HistoryEntry>, VitalsError> {
    let mut entries = Vec::new();
    for row in read_rows::<HistoryRow>(csv_text)? {
        entries.push(HistoryEntry {
            patient_id: row.patient_id.trim().to_string(),
            previous_conditions: clean(row.previous_medical_condition),
            medications: clean(row.medications_used),
        });
    }
    Ok(entries)
}

/// Parse the vitals log. Rows whose `date_recorded` cannot be read are
/// dropped and counted, never turned into an error.
pub fn parse_records(csv_text: &str) -> Result<ParsedRecords, VitalsError> {
    let mut records = Vec::new();
    let mut dropped = 0;

    for row in read_rows::<VitalsRow>(csv_text)? {
        let recorded_at = row
            .date_recorded
            .as_deref()
            .and_then(parse_timestamp);

        let Some(recorded_at) = recorded_at else {
            dropped += 1;
            continue;
        };

        records.push(VitalsRecord {
            patient_id: row.patient_id.trim().to_string(),
            recorded_at,
            systolic_bp: row.blood_pressure_systolic,
            diastolic_bp: row.blood_pressure_diastolic,
            heart_rate: row.heart_rate,
            respiratory_rate: row.respiratory_rate,
            blood_sugar: row.blood_sugar_level,
            weight_kg: row.weight,
            height_m: row.height,
        });
    }

    Ok(ParsedRecords { records, dropped })
}

fn read_rows<T>(csv_text: &str) -> Result<Vec<T>, VitalsError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: T = result.map_err(|err| VitalsError::Parse(err.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

fn series<F>(vitals: &[AggregatedVitals], field: F) -> Vec<f64>
where
    F: Fn(&AggregatedVitals) -> Option<f64>,
{
    vitals.iter().filter_map(field).collect()
}

fn append_forecast(
    forecasts: &mut Vec<vitals_core::ForecastResult>,
    metric_name: &str,
    history: &[f64],
    horizon: i64,
) {
    if let Ok(result) = forecast_metric(metric_name, history, horizon) {
        forecasts.push(result);
    }
}

/// Abnormal-flag shortcut for callers that only render badges.
pub fn abnormal_fields(flags: &[FieldFlag]) -> Vec<&str> {
    flags
        .iter()
        .filter(|flag| flag.is_abnormal)
        .map(|flag| flag.field_name.as_str())
        .collect()
}
