pub mod detect;
pub mod rules;
pub mod score;

use std::sync::Arc;

use crate::core::catalog::SensorCatalog;
use crate::core::{Reading, RiskLevel, RiskVerdict, SensorAnalysis, ShipmentAssessment};
use detect::DetectError;

/// The risk engine turns one shipment's readings into a full assessment.
#[derive(Clone)]
pub struct RiskEngine {
    catalog: Arc<SensorCatalog>,
}

impl RiskEngine {
    pub fn new(catalog: Arc<SensorCatalog>) -> Self {
        Self { catalog }
    }

    pub fn assess(
        &self,
        shipment_id: i64,
        readings: &[Reading],
    ) -> Result<ShipmentAssessment, DetectError> {
        let violations = detect::detect_violations(readings, &self.catalog)?;
        let (score, category) = score::compute_risk(&violations);

        let mut sensor_analysis = Vec::new();
        let mut critical_alerts = Vec::new();
        for (code, group) in detect::group_by_sensor(readings) {
            // detect_violations already resolved every code
            let Some(sensor) = self.catalog.get(code) else {
                return Err(DetectError::UnknownSensor(code.to_string()));
            };
            let values: Vec<Option<f64>> = group.iter().map(|r| r.value).collect();
            let risk = score::sensor_risk(&values, &sensor.kind);
            let stats = ValueStats::from_values(&values);
            let violation_count = violations.iter().filter(|v| v.sensor_code == code).count();

            if risk == RiskLevel::High {
                critical_alerts.push(sensor.name.clone());
            }
            sensor_analysis.push(SensorAnalysis {
                sensor_code: sensor.code.clone(),
                sensor_name: sensor.name.clone(),
                unit: sensor.unit.clone(),
                reading_count: values.len(),
                missing_count: stats.missing,
                average_value: stats.mean,
                min_value: stats.min,
                max_value: stats.max,
                violation_count,
                risk,
            });
        }

        Ok(ShipmentAssessment {
            verdict: RiskVerdict {
                shipment_id,
                score,
                category,
                violations,
            },
            sensor_analysis,
            critical_alerts,
        })
    }
}

/// Mean/min/max over the present, non-NaN values, rounded to two decimals.
#[derive(Debug, Default, PartialEq)]
struct ValueStats {
    mean: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    missing: usize,
}

impl ValueStats {
    fn from_values(values: &[Option<f64>]) -> Self {
        let missing = values.iter().filter(|v| v.is_none()).count();
        let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return Self {
                missing,
                ..Self::default()
            };
        }
        let sum: f64 = present.iter().sum();
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            mean: Some(round2(sum / present.len() as f64)),
            min: Some(round2(min)),
            max: Some(round2(max)),
            missing,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::default_definitions;
    use chrono::{Duration, TimeZone, Utc};

    fn engine() -> RiskEngine {
        let catalog = SensorCatalog::from_definitions(&default_definitions()).unwrap();
        RiskEngine::new(Arc::new(catalog))
    }

    fn push_series(out: &mut Vec<Reading>, code: &str, values: &[Option<f64>]) {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        for (i, v) in values.iter().enumerate() {
            out.push(Reading::new(code, *v, base + Duration::minutes(5 * i as i64)));
        }
    }

    #[test]
    fn quiet_shipment_is_low() {
        let mut readings = Vec::new();
        push_series(&mut readings, "T100", &[Some(4.0), Some(5.0), Some(6.0)]);
        push_series(&mut readings, "B10", &[Some(3.8), Some(3.7)]);
        let a = engine().assess(7, &readings).unwrap();
        assert_eq!(a.shipment_id(), 7);
        assert_eq!(a.verdict.score, 0.0);
        assert_eq!(a.verdict.category, RiskLevel::Low);
        assert!(a.verdict.violations.is_empty());
        assert!(a.critical_alerts.is_empty());
        assert_eq!(a.sensor_analysis.len(), 2);
        assert_eq!(a.sensor_analysis[0].average_value, Some(5.0));
        assert_eq!(a.sensor_analysis[0].min_value, Some(4.0));
        assert_eq!(a.sensor_analysis[0].max_value, Some(6.0));
    }

    #[test]
    fn shock_spike_raises_alert() {
        let mut values = vec![Some(0.2); 10];
        values[3] = Some(3.0);
        let mut readings = Vec::new();
        push_series(&mut readings, "S50", &values);
        push_series(&mut readings, "H200", &[Some(45.0), Some(50.0)]);

        let a = engine().assess(1, &readings).unwrap();
        assert_eq!(a.verdict.violations.len(), 1);
        assert_eq!(a.verdict.score, 0.35);
        assert_eq!(a.verdict.category, RiskLevel::Medium);
        assert_eq!(a.critical_alerts, vec!["ShockLog S-50".to_string()]);
        let shock = &a.sensor_analysis[0];
        assert_eq!(shock.sensor_code, "S50");
        assert_eq!(shock.risk, RiskLevel::High);
        assert_eq!(shock.violation_count, 1);
        assert_eq!(a.sensor_analysis[1].risk, RiskLevel::Low);
    }

    #[test]
    fn missing_values_counted_not_averaged() {
        let mut readings = Vec::new();
        push_series(&mut readings, "B10", &[Some(3.5), None, Some(3.9), None]);
        let a = engine().assess(2, &readings).unwrap();
        let battery = &a.sensor_analysis[0];
        assert_eq!(battery.reading_count, 4);
        assert_eq!(battery.missing_count, 2);
        assert_eq!(battery.average_value, Some(3.7));
        assert_eq!(battery.violation_count, 2);
        // Missing readings are violations but do not move the sensor's own risk
        assert_eq!(battery.risk, RiskLevel::Low);
        assert_eq!(a.verdict.score, 0.2);
        assert_eq!(a.verdict.category, RiskLevel::Low);
        assert_eq!(a.violation_counts(), vec![("B10", 2)]);
    }

    #[test]
    fn all_missing_sensor_has_no_average() {
        let mut readings = Vec::new();
        push_series(&mut readings, "G12", &[None, None]);
        let a = engine().assess(3, &readings).unwrap();
        assert_eq!(a.sensor_analysis[0].average_value, None);
        assert_eq!(a.sensor_analysis[0].risk, RiskLevel::Low);
    }

    #[test]
    fn mixed_shipment_high() {
        let mut readings = Vec::new();
        push_series(&mut readings, "T100", &[Some(8.5), Some(5.0), Some(10.5)]);
        push_series(&mut readings, "TX5", &[Some(11.0)]);
        let a = engine().assess(4, &readings).unwrap();
        // warning + critical + warning = 0.55
        assert_eq!(a.verdict.score, 0.55);
        assert_eq!(a.verdict.category, RiskLevel::High);
        assert_eq!(a.critical_alerts, vec!["ThermoProbe T-100".to_string()]);
        assert_eq!(a.sensor_analysis[1].risk, RiskLevel::Medium);
    }

    #[test]
    fn unknown_sensor_rejected() {
        let mut readings = Vec::new();
        push_series(&mut readings, "NOPE", &[Some(1.0)]);
        assert!(matches!(
            engine().assess(5, &readings),
            Err(DetectError::UnknownSensor(code)) if code == "NOPE"
        ));
    }

    #[test]
    fn stats_skip_nan() {
        let stats = ValueStats::from_values(&[Some(1.0), Some(f64::NAN), Some(2.0), None]);
        assert_eq!(stats.mean, Some(1.5));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(2.0));
        assert_eq!(stats.missing, 1);
    }

    #[test]
    fn stats_round_two_places() {
        let stats = ValueStats::from_values(&[Some(1.0), Some(1.0), Some(1.001)]);
        assert_eq!(stats.mean, Some(1.0));
        assert_eq!(stats.max, Some(1.0));
    }
}
