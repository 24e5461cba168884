use std::fs;

use serde_json::Value;
use vitals_core::{MetricsConfig, RiskTier, VitalsError};
use vitals_csv::{abnormal_fields, parse_records, summarize_patient_str};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Không đọc được fixture")
}

#[test]
fn patient_bundle_matches_golden() {
    let snapshot = summarize_patient_str(
        &fixture("all_patients_details.csv"),
        &fixture("medical_history.csv"),
        &fixture("health_records.csv"),
        "12",
        &MetricsConfig::default(),
    )
    .expect("Không tạo được snapshot");

    let mut actual = serde_json::to_value(snapshot).expect("Không serialize snapshot");
    normalize_dynamic_fields(&mut actual);

    let mut expected: Value = serde_json::from_str(&fixture("patient_12_snapshot.json"))
        .expect("Golden không hợp lệ");
    normalize_dynamic_fields(&mut expected);

    assert_eq!(actual, expected);
}

fn normalize_dynamic_fields(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("generated_at") {
            obj.insert(
                "generated_at".to_string(),
                Value::String("__DYNAMIC_TIMESTAMP__".to_string()),
            );
        }
    }
}

#[test]
fn unknown_patient_is_missing_data() {
    let result = summarize_patient_str(
        &fixture("all_patients_details.csv"),
        &fixture("medical_history.csv"),
        &fixture("health_records.csv"),
        "999",
        &MetricsConfig::default(),
    );

    assert!(matches!(result, Err(VitalsError::MissingData(_))));
}

#[test]
fn patient_without_vitals_yields_empty_sections() {
    let snapshot = summarize_patient_str(
        &fixture("all_patients_details.csv"),
        &fixture("medical_history.csv"),
        &fixture("health_records.csv"),
        "14",
        &MetricsConfig::default(),
    )
    .expect("Không tạo được snapshot");

    assert!(snapshot.profile.is_some());
    assert!(snapshot.vitals.is_empty());
    assert!(snapshot.flags.is_empty());
    assert!(snapshot.bmi.is_none());
    assert!(snapshot.risk.is_none());
    assert!(snapshot.forecasts.is_empty());
}

#[test]
fn unparseable_timestamps_are_dropped_and_counted() {
    let parsed = parse_records(&fixture("health_records.csv")).expect("Không đọc được vitals log");

    assert_eq!(parsed.dropped, 1);
    assert_eq!(parsed.records.len(), 5);
    assert!(parsed
        .records
        .iter()
        .all(|record| record.recorded_at.to_rfc3339().starts_with("2024-03-0")));
}

#[test]
fn blank_numeric_cells_stay_absent_in_the_aggregate() {
    let snapshot = summarize_patient_str(
        &fixture("all_patients_details.csv"),
        &fixture("medical_history.csv"),
        &fixture("health_records.csv"),
        "12",
        &MetricsConfig::default(),
    )
    .expect("Không tạo được snapshot");

    // Hàng 2024-03-02 để trống nhịp thở.
    assert_eq!(snapshot.vitals[1].respiratory_rate, None);
    assert_eq!(snapshot.vitals[0].respiratory_rate, Some(17.0));
}

#[test]
fn abnormal_vitals_raise_flags_and_risk() {
    let records = "\
patient_id,date_recorded,blood_pressure_systolic,blood_pressure_diastolic,heart_rate,respiratory_rate,blood_sugar_level,weight,height
7,2024-03-01,150,95,110,22,190,95,1.70
7,2024-03-02,155,96,112,23,195,96,1.70
";
    let snapshot = summarize_patient_str(
        "patient_id,name,age,gender,contact_info,address,emergency_contact\n7,Binh Vo,61,male,,,",
        "patient_id,previous_medical_condition,medications_used\n",
        records,
        "7",
        &MetricsConfig::default(),
    )
    .expect("Không tạo được snapshot");

    let abnormal = abnormal_fields(&snapshot.flags);
    assert_eq!(
        abnormal,
        vec!["systolic_bp", "diastolic_bp", "heart_rate", "blood_sugar", "bmi"]
    );

    let risk = snapshot.risk.expect("thiếu đánh giá rủi ro");
    // 155 > 140, 195 > 180, BMI 96/1.7^2 = 33.22 > 30.
    assert_eq!(risk.score, 3);
    assert_eq!(risk.tier, RiskTier::High);
}
