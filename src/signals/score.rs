use crate::core::{RiskLevel, SensorKind, Severity, Violation};

use super::rules;

pub const WARNING_WEIGHT: f64 = 0.1;
pub const CRITICAL_WEIGHT: f64 = 0.35;

/// Scores strictly above these cut-points move up a category.
pub const HIGH_CUTOFF: f64 = 0.5;
pub const MEDIUM_CUTOFF: f64 = 0.2;

pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Warning => WARNING_WEIGHT,
        Severity::Critical => CRITICAL_WEIGHT,
        Severity::Normal => 0.0,
    }
}

/// Compute the shipment score (0.0-1.0, three decimals) and its category.
///
/// Violations are tallied by severity before weighting, so the result does not
/// depend on input order. Any weighted sum past 1.0 collapses to exactly 1.0.
pub fn compute_risk(violations: &[Violation]) -> (f64, RiskLevel) {
    let (warnings, criticals) = violations.iter().fold((0u32, 0u32), |(w, c), v| match v.severity {
        Severity::Warning => (w + 1, c),
        Severity::Critical => (w, c + 1),
        Severity::Normal => (w, c),
    });
    let raw = f64::from(warnings) * severity_weight(Severity::Warning)
        + f64::from(criticals) * severity_weight(Severity::Critical);
    let score = round3(raw).min(1.0);
    (score, category_for(score))
}

pub fn category_for(score: f64) -> RiskLevel {
    if score > HIGH_CUTOFF {
        RiskLevel::High
    } else if score > MEDIUM_CUTOFF {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Reduce one sensor's values to its own risk level.
///
/// Absent values are skipped. The first critical reading settles it as High;
/// otherwise any warning gives Medium.
pub fn sensor_risk(values: &[Option<f64>], kind: &SensorKind) -> RiskLevel {
    let mut risk = RiskLevel::Low;
    for value in values.iter().flatten() {
        match rules::classify(*value, kind) {
            Severity::Critical => return RiskLevel::High,
            Severity::Warning => risk = RiskLevel::Medium,
            Severity::Normal => {}
        }
    }
    risk
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BatteryThresholds, RangeThresholds, ShockThresholds, ViolationKind};
    use chrono::Utc;

    fn make_violation(severity: Severity) -> Violation {
        Violation {
            sensor_code: "T100".to_string(),
            kind: ViolationKind::Threshold,
            severity,
            message: "T100 breach".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn make_list(severities: &[Severity]) -> Vec<Violation> {
        severities.iter().map(|s| make_violation(*s)).collect()
    }

    fn core_temp() -> SensorKind {
        SensorKind::CoreTemperature(RangeThresholds {
            ideal_low: 2.0,
            ideal_high: 8.0,
            warning_margin: 1.0,
        })
    }

    #[test]
    fn empty_violations() {
        assert_eq!(compute_risk(&[]), (0.0, RiskLevel::Low));
    }

    #[test]
    fn single_warning_is_low() {
        let (score, category) = compute_risk(&make_list(&[Severity::Warning]));
        assert_eq!(score, 0.1);
        assert_eq!(category, RiskLevel::Low);
    }

    #[test]
    fn two_warnings_sit_on_medium_boundary() {
        let (score, category) = compute_risk(&make_list(&[Severity::Warning; 2]));
        assert_eq!(score, 0.2);
        assert_eq!(category, RiskLevel::Low);
    }

    #[test]
    fn three_warnings_medium() {
        let (score, category) = compute_risk(&make_list(&[Severity::Warning; 3]));
        assert_eq!(score, 0.3);
        assert_eq!(category, RiskLevel::Medium);
    }

    #[test]
    fn five_warnings_sit_on_high_boundary() {
        let (score, category) = compute_risk(&make_list(&[Severity::Warning; 5]));
        assert_eq!(score, 0.5);
        assert_eq!(category, RiskLevel::Medium);
    }

    #[test]
    fn warnings_and_critical_high() {
        let violations = make_list(&[Severity::Warning, Severity::Warning, Severity::Critical]);
        let (score, category) = compute_risk(&violations);
        assert_eq!(score, 0.55);
        assert_eq!(category, RiskLevel::High);
    }

    #[test]
    fn normal_severity_weighs_nothing() {
        let violations = make_list(&[Severity::Normal, Severity::Critical]);
        assert_eq!(compute_risk(&violations), (0.35, RiskLevel::Medium));
    }

    #[test]
    fn score_capped_at_one() {
        for n in [3usize, 4, 9, 50] {
            let (score, category) = compute_risk(&make_list(&vec![Severity::Critical; n]));
            assert_eq!(score, 1.0, "n={n}");
            assert_eq!(category, RiskLevel::High);
        }
        let mixed = make_list(&[vec![Severity::Warning; 8], vec![Severity::Critical; 1]].concat());
        assert_eq!(compute_risk(&mixed), (1.0, RiskLevel::High));
    }

    #[test]
    fn order_independent() {
        let base = [
            Severity::Warning,
            Severity::Critical,
            Severity::Warning,
            Severity::Warning,
            Severity::Critical,
        ];
        let expected = compute_risk(&make_list(&base));
        for shift in 0..base.len() {
            let mut rotated = base.to_vec();
            rotated.rotate_left(shift);
            assert_eq!(compute_risk(&make_list(&rotated)), expected);
            rotated.reverse();
            assert_eq!(compute_risk(&make_list(&rotated)), expected);
        }
    }

    #[test]
    fn sensor_risk_empty_or_absent_is_low() {
        assert_eq!(sensor_risk(&[], &core_temp()), RiskLevel::Low);
        assert_eq!(sensor_risk(&[None, None], &core_temp()), RiskLevel::Low);
    }

    #[test]
    fn sensor_risk_warning_is_medium() {
        let values = [Some(5.0), Some(8.5), None, Some(4.0)];
        assert_eq!(sensor_risk(&values, &core_temp()), RiskLevel::Medium);
    }

    #[test]
    fn sensor_risk_critical_anywhere_is_high() {
        let mut values = vec![Some(8.5); 6];
        for pos in 0..values.len() {
            let saved = values[pos];
            values[pos] = Some(10.5);
            assert_eq!(sensor_risk(&values, &core_temp()), RiskLevel::High, "pos={pos}");
            values[pos] = saved;
        }
        assert_eq!(sensor_risk(&values, &core_temp()), RiskLevel::Medium);
    }

    #[test]
    fn sensor_risk_shock_spike() {
        let kind = SensorKind::Shock(ShockThresholds { spike_threshold: 2.0 });
        let mut values = vec![Some(0.3); 10];
        values[4] = Some(3.0);
        assert_eq!(sensor_risk(&values, &kind), RiskLevel::High);
    }

    #[test]
    fn sensor_risk_battery_caps_at_medium() {
        let kind = SensorKind::BatteryVoltage(BatteryThresholds { min_voltage: 3.3 });
        let values = [Some(2.0), Some(0.0), Some(f64::NAN)];
        assert_eq!(sensor_risk(&values, &kind), RiskLevel::Medium);
    }

    #[test]
    fn category_cutpoints() {
        assert_eq!(category_for(0.0), RiskLevel::Low);
        assert_eq!(category_for(0.2), RiskLevel::Low);
        assert_eq!(category_for(0.201), RiskLevel::Medium);
        assert_eq!(category_for(0.5), RiskLevel::Medium);
        assert_eq!(category_for(0.501), RiskLevel::High);
        assert_eq!(category_for(1.0), RiskLevel::High);
    }
}
