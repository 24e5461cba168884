//! Logic lõi tính chỉ số sức khỏe và phân loại rủi ro cho bệnh nhân.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Khoảng giá trị bình thường cho một chỉ số sống.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NormalRange {
    pub low: f64,
    pub high: f64,
}

impl NormalRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Giá trị nằm trong khoảng (hai biên thuộc khoảng).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Cấu hình các ngưỡng bình thường và tầm nhìn dự báo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub systolic_range: NormalRange,
    pub diastolic_range: NormalRange,
    pub heart_rate_range: NormalRange,
    pub blood_sugar_range: NormalRange,
    pub bmi_range: NormalRange,
    /// Số ngày ngoại suy khi dự báo xu hướng.
    pub forecast_horizon: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            systolic_range: NormalRange::new(90.0, 140.0),
            diastolic_range: NormalRange::new(60.0, 90.0),
            heart_rate_range: NormalRange::new(60.0, 100.0),
            blood_sugar_range: NormalRange::new(70.0, 140.0),
            bmi_range: NormalRange::new(18.5, 24.9),
            forecast_horizon: 30,
        }
    }
}

/// Ngưỡng cộng điểm rủi ro (cố định, không phụ thuộc cấu hình).
pub const RISK_SYSTOLIC_LIMIT: f64 = 140.0;
pub const RISK_BLOOD_SUGAR_LIMIT: f64 = 180.0;
pub const RISK_BMI_LIMIT: f64 = 30.0;

/// Một lần ghi chỉ số sống của bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalsRecord {
    pub patient_id: String,
    pub recorded_at: DateTime<Utc>,
    pub systolic_bp: Option<f64>,
    pub diastolic_bp: Option<f64>,
    pub heart_rate: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub blood_sugar: Option<f64>,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
}

/// Một hàng chỉ số đã gộp: mỗi mốc thời gian một hàng, giá trị là trung bình cộng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedVitals {
    pub recorded_at: DateTime<Utc>,
    pub systolic_bp: Option<f64>,
    pub diastolic_bp: Option<f64>,
    pub heart_rate: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub blood_sugar: Option<f64>,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
}

/// Hồ sơ hành chính của bệnh nhân (dữ liệu tham chiếu, chỉ đọc).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub patient_id: String,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub contact_info: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub previous_conditions: Option<String>,
    pub medications: Option<String>,
}

/// Phân loại BMI theo ngưỡng cố định.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Healthy,
    Overweight,
    Obese,
}

/// Bậc rủi ro tổng hợp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

/// Cờ bất thường gắn với một chỉ số đơn lẻ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldFlag {
    pub field_name: String,
    /// `None` nghĩa là không có số liệu; khi đó cờ không được coi là bất thường.
    pub value: Option<f64>,
    pub normal_low: f64,
    pub normal_high: f64,
    pub is_abnormal: bool,
}

impl FieldFlag {
    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }
}

/// Kết quả đánh giá rủi ro, tính lại theo yêu cầu, không lưu trữ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub score: u8,
    pub flagged_fields: Vec<FieldFlag>,
}

/// Kết quả dự báo xu hướng cho một chỉ số.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastResult {
    pub metric_name: String,
    pub horizon_offset: i64,
    pub predicted_value: f64,
}

/// Bộ chỉ số lối sống dùng cho điểm sức khỏe tổng hợp.
///
/// Truyền tường minh qua tham số thay vì trạng thái phiên toàn cục.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifestyleMetrics {
    pub heart_rate: f64,
    pub systolic_bp: f64,
    pub diastolic_bp: f64,
    pub bmi: f64,
    pub daily_steps: u32,
    pub sleep_hours: f64,
    pub hydration_glasses: u32,
}

/// Yếu tố đầu vào cho hồ sơ rủi ro theo nhóm bệnh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactors {
    pub age: u32,
    /// Giới tính theo danh bạ bệnh nhân ("male"/"female"...).
    pub gender: String,
    pub bmi: f64,
    pub systolic_bp: f64,
    pub heart_rate: f64,
    pub blood_sugar: f64,
}

/// Điểm rủi ro 0-100 theo từng nhóm bệnh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskProfile {
    pub cardiovascular: u8,
    pub diabetes: u8,
    pub hypertension: u8,
}

/// Mức ưu tiên của một khuyến nghị.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Khuyến nghị lối sống dành cho lớp trình bày.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub category: String,
    pub message: String,
    pub priority: Priority,
}

/// Kết quả tổng hợp cuối cùng cho một bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSnapshot {
    pub generated_at: DateTime<Utc>,
    pub profile: Option<PatientProfile>,
    pub vitals: Vec<AggregatedVitals>,
    /// Số hàng nguồn bị loại vì mốc thời gian không đọc được.
    pub dropped_records: usize,
    pub flags: Vec<FieldFlag>,
    pub bmi: Option<f64>,
    pub bmi_category: Option<BmiCategory>,
    pub risk: Option<RiskAssessment>,
    pub forecasts: Vec<ForecastResult>,
}

impl PatientSnapshot {
    /// Khởi tạo snapshot từ các thành phần đã chuẩn bị.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profile: Option<PatientProfile>,
        vitals: Vec<AggregatedVitals>,
        dropped_records: usize,
        flags: Vec<FieldFlag>,
        bmi: Option<f64>,
        bmi_category: Option<BmiCategory>,
        risk: Option<RiskAssessment>,
        forecasts: Vec<ForecastResult>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            profile,
            vitals,
            dropped_records,
            flags,
            bmi,
            bmi_category,
            risk,
            forecasts,
        }
    }

    /// Chuỗi chỉ số đã gộp, tăng dần theo thời gian.
    pub fn vitals(&self) -> &[AggregatedVitals] {
        &self.vitals
    }

    /// Các cờ đang ở trạng thái bất thường.
    pub fn abnormal_flags(&self) -> Vec<&FieldFlag> {
        self.flags.iter().filter(|flag| flag.is_abnormal).collect()
    }
}

/// Lỗi chung của lớp tính toán.
#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    #[error("Dữ liệu đầu vào không hợp lệ: {0}")]
    InvalidInput(String),
    #[error("Không đủ dữ liệu: cần ít nhất {needed} điểm, chỉ có {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("Thiếu dữ liệu cho {0}")]
    MissingData(String),
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
}

/// Tiện ích dựng snapshot rỗng (dùng cho mock/testing).
pub fn empty_snapshot() -> PatientSnapshot {
    PatientSnapshot {
        generated_at: Utc::now(),
        profile: None,
        vitals: Vec::new(),
        dropped_records: 0,
        flags: Vec::new(),
        bmi: None,
        bmi_category: None,
        risk: None,
        forecasts: Vec::new(),
    }
}

#[derive(Default)]
struct FieldMean {
    sum: f64,
    count: u32,
}

impl FieldMean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / f64::from(self.count))
        }
    }
}

#[derive(Default)]
struct VitalsAccumulator {
    systolic_bp: FieldMean,
    diastolic_bp: FieldMean,
    heart_rate: FieldMean,
    respiratory_rate: FieldMean,
    blood_sugar: FieldMean,
    weight_kg: FieldMean,
    height_m: FieldMean,
}

impl VitalsAccumulator {
    fn add(&mut self, record: &VitalsRecord) {
        self.systolic_bp.add(record.systolic_bp);
        self.diastolic_bp.add(record.diastolic_bp);
        self.heart_rate.add(record.heart_rate);
        self.respiratory_rate.add(record.respiratory_rate);
        self.blood_sugar.add(record.blood_sugar);
        self.weight_kg.add(record.weight_kg);
        self.height_m.add(record.height_m);
    }

    fn into_row(self, recorded_at: DateTime<Utc>) -> AggregatedVitals {
        AggregatedVitals {
            recorded_at,
            systolic_bp: self.systolic_bp.mean(),
            diastolic_bp: self.diastolic_bp.mean(),
            heart_rate: self.heart_rate.mean(),
            respiratory_rate: self.respiratory_rate.mean(),
            blood_sugar: self.blood_sugar.mean(),
            weight_kg: self.weight_kg.mean(),
            height_m: self.height_m.mean(),
        }
    }
}

/// Gộp các lần ghi trùng mốc thời gian thành một hàng trung bình cộng.
///
/// Đầu vào rỗng trả về chuỗi rỗng. Trường vắng mặt ở mọi bản ghi trong nhóm
/// giữ nguyên `None`, không bao giờ thành 0.
pub fn aggregate(records: &[VitalsRecord]) -> Vec<AggregatedVitals> {
    let mut groups: BTreeMap<DateTime<Utc>, VitalsAccumulator> = BTreeMap::new();
    for record in records {
        groups.entry(record.recorded_at).or_default().add(record);
    }

    groups
        .into_iter()
        .map(|(recorded_at, acc)| acc.into_row(recorded_at))
        .collect()
}

/// BMI = cân nặng / chiều cao bình phương, làm tròn 2 chữ số thập phân.
pub fn compute_bmi(weight_kg: f64, height_m: f64) -> Result<f64, VitalsError> {
    if height_m <= 0.0 {
        return Err(VitalsError::InvalidInput(format!(
            "chiều cao phải dương, nhận {height_m}"
        )));
    }
    if weight_kg < 0.0 {
        return Err(VitalsError::InvalidInput(format!(
            "cân nặng không được âm, nhận {weight_kg}"
        )));
    }
    Ok(round2(weight_kg / (height_m * height_m)))
}

/// Phân loại BMI; giá trị biên thuộc bậc cao hơn.
pub fn classify_bmi(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::Healthy
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

/// Dựng cờ bất thường cho một chỉ số so với khoảng bình thường.
///
/// Giá trị vắng mặt cho cờ "không có số liệu", không coi là trong khoảng.
pub fn flag_vital(field_name: &str, value: Option<f64>, range: &NormalRange) -> FieldFlag {
    let is_abnormal = match value {
        Some(v) => !range.contains(v),
        None => false,
    };
    FieldFlag {
        field_name: field_name.to_string(),
        value,
        normal_low: range.low,
        normal_high: range.high,
        is_abnormal,
    }
}

/// Giá trị gần nhất có mặt trong chuỗi; lỗi `MissingData` nếu chuỗi trống.
pub fn latest_metric(field_name: &str, series: &[Option<f64>]) -> Result<f64, VitalsError> {
    series
        .iter()
        .rev()
        .find_map(|value| *value)
        .ok_or_else(|| VitalsError::MissingData(field_name.to_string()))
}

/// Điểm rủi ro tổng hợp từ ba quy tắc cố định. Hàm toàn phần, không có nhánh lỗi;
/// bên gọi phải bảo đảm số liệu đầu vào đã có mặt.
pub fn risk_score(systolic_bp: f64, blood_sugar: f64, bmi: f64) -> RiskAssessment {
    let rules = [
        ("systolic_bp", systolic_bp, RISK_SYSTOLIC_LIMIT),
        ("blood_sugar", blood_sugar, RISK_BLOOD_SUGAR_LIMIT),
        ("bmi", bmi, RISK_BMI_LIMIT),
    ];

    let mut flagged_fields = Vec::new();
    for (name, value, limit) in rules {
        if value > limit {
            flagged_fields.push(FieldFlag {
                field_name: name.to_string(),
                value: Some(value),
                normal_low: 0.0,
                normal_high: limit,
                is_abnormal: true,
            });
        }
    }

    let score = flagged_fields.len() as u8;
    let tier = match score {
        0 => RiskTier::Low,
        1 => RiskTier::Moderate,
        _ => RiskTier::High,
    };

    RiskAssessment {
        tier,
        score,
        flagged_fields,
    }
}

/// Điểm sức khỏe tổng hợp 0-100. Các khoản trừ độc lập, cộng dồn,
/// kẹp về [0, 100] một lần ở cuối.
pub fn health_score(metrics: &LifestyleMetrics) -> u8 {
    let mut score: i32 = 100;

    if !(60.0..=80.0).contains(&metrics.heart_rate) {
        score -= 10;
    }
    if metrics.systolic_bp > 130.0 || metrics.diastolic_bp > 85.0 {
        score -= 15;
    }
    if metrics.bmi > 25.0 {
        score -= 10;
    }
    if metrics.daily_steps < 10_000 {
        score -= 5;
    }
    if !(7.0..=9.0).contains(&metrics.sleep_hours) {
        score -= 5;
    }
    if metrics.hydration_glasses < 8 {
        score -= 5;
    }

    score.clamp(0, 100) as u8
}

/// Hồ sơ rủi ro theo nhóm bệnh từ tuổi, giới tính và chỉ số hiện tại.
/// Mỗi điểm là tổng tuyến tính các khoản cộng cố định, kẹp về [0, 100].
pub fn risk_profile(factors: &RiskFactors) -> RiskProfile {
    let age = f64::from(factors.age);
    let male = factors.gender.eq_ignore_ascii_case("male");

    let mut cardiovascular = age * 0.8;
    if factors.bmi > 25.0 {
        cardiovascular += 20.0;
    }
    if factors.systolic_bp > 130.0 {
        cardiovascular += 15.0;
    }
    if factors.heart_rate > 80.0 {
        cardiovascular += 10.0;
    }

    let mut diabetes = age * 0.6;
    if factors.bmi > 30.0 {
        diabetes += 25.0;
    }
    if factors.blood_sugar > 100.0 {
        diabetes += 20.0;
    }
    if male && factors.age > 45 {
        diabetes += 15.0;
    }

    let mut hypertension = age * 0.7;
    if factors.systolic_bp > 120.0 {
        hypertension += 30.0;
    }
    if factors.bmi > 28.0 {
        hypertension += 15.0;
    }

    RiskProfile {
        cardiovascular: clamp_score(cardiovascular),
        diabetes: clamp_score(diabetes),
        hypertension: clamp_score(hypertension),
    }
}

/// Khuyến nghị lối sống từ bộ chỉ số hiện tại, xếp theo quy tắc cố định.
pub fn recommendations(metrics: &LifestyleMetrics) -> Vec<Recommendation> {
    let mut items = Vec::new();

    if metrics.daily_steps < 10_000 {
        items.push(Recommendation {
            category: "Exercise".to_string(),
            message: "Increase daily steps to 10,000+ for better cardiovascular health"
                .to_string(),
            priority: Priority::High,
        });
    }
    if metrics.sleep_hours < 7.0 {
        items.push(Recommendation {
            category: "Sleep".to_string(),
            message: "Aim for 7-9 hours of sleep for optimal recovery".to_string(),
            priority: Priority::High,
        });
    }
    if metrics.hydration_glasses < 8 {
        items.push(Recommendation {
            category: "Hydration".to_string(),
            message: "Drink more water - aim for 8+ glasses daily".to_string(),
            priority: Priority::Medium,
        });
    }
    if metrics.systolic_bp > 130.0 {
        items.push(Recommendation {
            category: "Blood Pressure".to_string(),
            message: "Monitor blood pressure closely and consider dietary changes".to_string(),
            priority: Priority::High,
        });
    }
    if metrics.bmi > 25.0 {
        items.push(Recommendation {
            category: "Weight Management".to_string(),
            message: "Consider a balanced diet and regular exercise for weight management"
                .to_string(),
            priority: Priority::Medium,
        });
    }

    items
}

fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Khớp đường thẳng bình phương tối thiểu `y = a*x + b` trên `x = 0..n-1`
/// rồi ngoại suy tại `horizon`. Không làm mượt, không kẹp kết quả.
pub fn forecast(history: &[f64], horizon: i64) -> Result<f64, VitalsError> {
    if history.len() < 2 {
        return Err(VitalsError::InsufficientData {
            needed: 2,
            got: history.len(),
        });
    }

    let n = history.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for (i, y) in history.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    // n >= 2 nên mẫu số luôn khác 0.
    let denom = n * sum_x2 - sum_x * sum_x;
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    Ok(slope * horizon as f64 + intercept)
}

/// Dự báo kèm nhãn chỉ số, dùng cho lớp trình bày.
pub fn forecast_metric(
    metric_name: &str,
    history: &[f64],
    horizon: i64,
) -> Result<ForecastResult, VitalsError> {
    let predicted_value = forecast(history, horizon)?;
    Ok(ForecastResult {
        metric_name: metric_name.to_string(),
        horizon_offset: horizon,
        predicted_value,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
