//! Bridge WASM <-> JavaScript trung lập framework.

use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use vitals_core::{MetricsConfig, VitalsError};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsMetricsConfig {
    #[serde(default)]
    forecast_horizon: Option<i64>,
}

impl From<JsMetricsConfig> for MetricsConfig {
    fn from(cfg: JsMetricsConfig) -> Self {
        let mut base = MetricsConfig::default();
        if let Some(horizon) = cfg.forecast_horizon {
            base.forecast_horizon = horizon;
        }
        base
    }
}

#[wasm_bindgen]
pub fn summarize_patient(
    details_csv: String,
    history_csv: String,
    records_csv: String,
    patient_id: String,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsMetricsConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            MetricsConfig::from(cfg)
        }
        None => MetricsConfig::default(),
    };

    let snapshot = vitals_csv::summarize_patient_str(
        &details_csv,
        &history_csv,
        &records_csv,
        &patient_id,
        &cfg,
    )
    .map_err(|err| JsValue::from_str(&format_vitals_error(err)))?;

    to_value(&snapshot)
        .map_err(|err| JsValue::from_str(&format!("Không serialize snapshot: {err}")))
}

fn format_vitals_error(err: VitalsError) -> String {
    format!("Vitals error: {err}")
}
