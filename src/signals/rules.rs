use crate::core::{
    BatteryThresholds, GpsThresholds, RangeThresholds, SensorKind, Severity, ShockThresholds,
};

/// A per-reading threshold rule. Each sensor kind's threshold set carries its own.
///
/// Implementations must be total: any `f64`, including NaN and infinities,
/// maps to a severity. Non-finite input is treated as the worst tier the rule has.
pub trait ThresholdRule {
    fn classify(&self, value: f64) -> Severity;
}

/// Classify one present reading value against its sensor's rule.
pub fn classify(value: f64, kind: &SensorKind) -> Severity {
    rule_for(kind).classify(value)
}

fn rule_for(kind: &SensorKind) -> &dyn ThresholdRule {
    match kind {
        SensorKind::CoreTemperature(t)
        | SensorKind::SurfaceTemperature(t)
        | SensorKind::Humidity(t) => t,
        SensorKind::Shock(t) => t,
        SensorKind::Gps(t) => t,
        SensorKind::BatteryVoltage(t) => t,
    }
}

// --- Individual Rules ---

impl ThresholdRule for RangeThresholds {
    fn classify(&self, value: f64) -> Severity {
        if !value.is_finite() {
            return Severity::Critical;
        }
        if (self.ideal_low..=self.ideal_high).contains(&value) {
            return Severity::Normal;
        }
        let distance = if value > self.ideal_high {
            value - self.ideal_high
        } else {
            self.ideal_low - value
        };
        if distance > self.warning_margin {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// Shock has no warning tier: a spike is either there or not.
impl ThresholdRule for ShockThresholds {
    fn classify(&self, value: f64) -> Severity {
        if !value.is_finite() || value >= self.spike_threshold {
            Severity::Critical
        } else {
            Severity::Normal
        }
    }
}

/// Battery has no critical tier.
impl ThresholdRule for BatteryThresholds {
    fn classify(&self, value: f64) -> Severity {
        if !value.is_finite() || value < self.min_voltage {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

/// Route deviation is recorded but not judged; GPS readings are always normal.
impl ThresholdRule for GpsThresholds {
    fn classify(&self, _value: f64) -> Severity {
        Severity::Normal
    }
}
