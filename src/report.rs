use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{RiskLevel, ShipmentAssessment};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStatsEntry {
    pub sensor_code: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationCountEntry {
    pub sensor_code: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAnalysisEntry {
    pub sensor_code: String,
    pub sensor_name: String,
    pub avg: Option<f64>,
    pub unit: String,
    pub violations: usize,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallRisk {
    pub score: f64,
    pub category: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEntry {
    pub sensor_code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub ts: String,
}

/// One shipment in the exported summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentSummary {
    pub shipment_code: String,
    pub sensor_stats: Vec<SensorStatsEntry>,
    pub violations_count: Vec<ViolationCountEntry>,
    pub sensor_analysis: Vec<SensorAnalysisEntry>,
    pub critical_alerts: Vec<String>,
    pub overall_risk_score: OverallRisk,
    pub violations_detail: Vec<ViolationEntry>,
}

impl ShipmentSummary {
    pub fn from_assessment(shipment_code: &str, assessment: &ShipmentAssessment) -> Self {
        let analysis = &assessment.sensor_analysis;
        Self {
            shipment_code: shipment_code.to_string(),
            sensor_stats: analysis
                .iter()
                .map(|a| SensorStatsEntry {
                    sensor_code: a.sensor_code.clone(),
                    mean: a.average_value,
                    min: a.min_value,
                    max: a.max_value,
                })
                .collect(),
            violations_count: assessment
                .violation_counts()
                .into_iter()
                .map(|(code, count)| ViolationCountEntry {
                    sensor_code: code.to_string(),
                    count,
                })
                .collect(),
            sensor_analysis: analysis
                .iter()
                .map(|a| SensorAnalysisEntry {
                    sensor_code: a.sensor_code.clone(),
                    sensor_name: a.sensor_name.clone(),
                    avg: a.average_value,
                    unit: a.unit.clone(),
                    violations: a.violation_count,
                    risk: a.risk,
                })
                .collect(),
            critical_alerts: assessment.critical_alerts.clone(),
            overall_risk_score: OverallRisk {
                score: assessment.verdict.score,
                category: assessment.verdict.category,
            },
            violations_detail: assessment
                .verdict
                .violations
                .iter()
                .map(|v| ViolationEntry {
                    sensor_code: v.sensor_code.clone(),
                    kind: v.kind.as_str().to_string(),
                    severity: v.severity.as_str().to_string(),
                    message: v.message.clone(),
                    ts: format_ts(&v.timestamp),
                })
                .collect(),
        }
    }
}

/// Timestamps in exported reports: `YYYY-MM-DD HH:MM:SS`.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Pretty-print all summaries as one JSON array.
pub fn write_json(path: impl AsRef<Path>, summaries: &[ShipmentSummary]) -> Result<(), ReportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summaries)?;
    std::fs::write(path, json)?;
    tracing::info!("Wrote {} shipment summaries to {}", summaries.len(), path.display());
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "n/a".to_string())
}

/// Human-readable report block for one shipment.
pub fn render_text(shipment_code: &str, assessment: &ShipmentAssessment) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nShipment {shipment_code} - Sensor Stats:");
    let _ = writeln!(out, "{:<12} {:>8} {:>8} {:>8}", "sensor_code", "mean", "min", "max");
    for a in &assessment.sensor_analysis {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>8}",
            a.sensor_code,
            fmt_opt(a.average_value),
            fmt_opt(a.min_value),
            fmt_opt(a.max_value)
        );
    }

    let _ = writeln!(out, "\nViolations per sensor:");
    let counts = assessment.violation_counts();
    if counts.is_empty() {
        let _ = writeln!(out, "None");
    }
    for (code, count) in counts {
        let _ = writeln!(out, "{code:<12} {count}");
    }

    let _ = writeln!(out, "\nShipment {shipment_code} Sensor Analysis:");
    for a in &assessment.sensor_analysis {
        let avg = match a.average_value {
            Some(v) => format!("{v:.2}{}", a.unit),
            None => "n/a".to_string(),
        };
        let _ = writeln!(
            out,
            "{} ({}): Avg={avg}, Violations={} → {} Risk",
            a.sensor_code, a.sensor_name, a.violation_count, a.risk
        );
    }

    if assessment.critical_alerts.is_empty() {
        let _ = writeln!(out, "Critical Alerts: None");
    } else {
        let _ = writeln!(out, "Critical Alerts: {}", assessment.critical_alerts.join(", "));
    }
    let _ = writeln!(
        out,
        "Overall Shipment Risk Score: {} ({})",
        assessment.verdict.score, assessment.verdict.category
    );
    let _ = write!(out, "{}", "-".repeat(50));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{SensorCatalog, default_definitions};
    use crate::core::Reading;
    use crate::signals::RiskEngine;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn sample_assessment() -> ShipmentAssessment {
        let catalog = SensorCatalog::from_definitions(&default_definitions()).unwrap();
        let engine = RiskEngine::new(Arc::new(catalog));
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let readings = vec![
            Reading::new("T100", Some(10.5), base),
            Reading::new("T100", Some(5.5), base + Duration::minutes(5)),
            Reading::new("H200", Some(45.0), base),
            Reading::new("H200", None, base + Duration::minutes(5)),
        ];
        engine.assess(1, &readings).unwrap()
    }

    #[test]
    fn summary_shape() {
        let summary = ShipmentSummary::from_assessment("SHP-100", &sample_assessment());
        assert_eq!(summary.sensor_stats.len(), 2);
        assert_eq!(summary.sensor_stats[0].mean, Some(8.0));
        assert_eq!(summary.violations_count.len(), 2);
        assert_eq!(summary.critical_alerts, vec!["ThermoProbe T-100".to_string()]);
        assert_eq!(summary.overall_risk_score.score, 0.45);
        assert_eq!(summary.overall_risk_score.category, RiskLevel::Medium);
        assert_eq!(summary.violations_detail[0].ts, "2024-03-01 06:00:00");
        assert_eq!(summary.violations_detail[1].kind, "missing");
    }

    #[test]
    fn summary_json_keys() {
        let summary = ShipmentSummary::from_assessment("SHP-100", &sample_assessment());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["shipment_code"], "SHP-100");
        assert_eq!(json["overall_risk_score"]["category"], "Medium");
        assert_eq!(json["violations_detail"][0]["type"], "threshold");
        assert_eq!(json["sensor_analysis"][0]["risk"], "High");
    }

    #[test]
    fn text_report_lines() {
        let text = render_text("SHP-100", &sample_assessment());
        assert!(text.contains("Shipment SHP-100 - Sensor Stats:"));
        assert!(text.contains("T100 (ThermoProbe T-100): Avg=8.00C, Violations=1 → High Risk"));
        assert!(text.contains("H200 (HumidSensor H-200): Avg=45.00%, Violations=1 → Low Risk"));
        assert!(text.contains("Critical Alerts: ThermoProbe T-100"));
        assert!(text.contains("Overall Shipment Risk Score: 0.45 (Medium)"));
    }

    #[test]
    fn text_report_without_alerts() {
        let catalog = SensorCatalog::from_definitions(&default_definitions()).unwrap();
        let engine = RiskEngine::new(Arc::new(catalog));
        let assessment = engine
            .assess(2, &[Reading::new("G12", Some(1.0), Utc::now())])
            .unwrap();
        let text = render_text("SHP-101", &assessment);
        assert!(text.contains("Violations per sensor:\nNone"));
        assert!(text.contains("Critical Alerts: None"));
        assert!(text.contains("Overall Shipment Risk Score: 0 (Low)"));
    }

    #[test]
    fn json_written_to_disk() {
        let path = std::env::temp_dir().join(format!("medisafe_report_{}.json", std::process::id()));
        let summary = ShipmentSummary::from_assessment("SHP-100", &sample_assessment());
        write_json(&path, &[summary.clone()]).unwrap();
        let back: Vec<ShipmentSummary> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![summary]);
        let _ = std::fs::remove_file(&path);
    }
}
