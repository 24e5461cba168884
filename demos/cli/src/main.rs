use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use vitals_core::MetricsConfig;
use vitals_csv::summarize_patient_str;

#[derive(Parser, Debug)]
#[command(
    name = "vitals-cli",
    about = "Tóm tắt chỉ số sức khỏe của một bệnh nhân từ ba file CSV."
)]
struct Args {
    /// Đường dẫn tới file danh bạ bệnh nhân.
    #[arg(short, long)]
    details: PathBuf,
    /// Đường dẫn tới file tiền sử bệnh.
    #[arg(long)]
    history: PathBuf,
    /// Đường dẫn tới file nhật ký chỉ số sống.
    #[arg(short, long)]
    records: PathBuf,
    /// Mã bệnh nhân cần tóm tắt.
    #[arg(short, long)]
    patient: String,
    /// In snapshot dạng JSON thay vì bản tóm tắt.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let details = std::fs::read_to_string(&args.details)
        .with_context(|| format!("Không đọc được file {:?}", args.details))?;
    let history = std::fs::read_to_string(&args.history)
        .with_context(|| format!("Không đọc được file {:?}", args.history))?;
    let records = std::fs::read_to_string(&args.records)
        .with_context(|| format!("Không đọc được file {:?}", args.records))?;

    let config = MetricsConfig::default();
    let snapshot = summarize_patient_str(&details, &history, &records, &args.patient, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "Generated at: {}\nVitals rows: {} (dropped {})",
        snapshot.generated_at,
        snapshot.vitals.len(),
        snapshot.dropped_records
    );

    if let (Some(bmi), Some(category)) = (snapshot.bmi, snapshot.bmi_category) {
        println!("BMI: {bmi} ({category:?})");
    }
    if let Some(risk) = &snapshot.risk {
        println!("Risk: {:?} (score {})", risk.tier, risk.score);
    }

    let abnormal = snapshot.abnormal_flags();
    if abnormal.is_empty() {
        println!("Flags: all within normal ranges");
    } else {
        for flag in abnormal {
            println!(
                "Flag: {} = {:?} (normal {}..{})",
                flag.field_name, flag.value, flag.normal_low, flag.normal_high
            );
        }
    }

    for forecast in &snapshot.forecasts {
        println!(
            "Forecast {} (+{} days): {:.2}",
            forecast.metric_name, forecast.horizon_offset, forecast.predicted_value
        );
    }

    Ok(())
}
