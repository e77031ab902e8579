use thiserror::Error;
use tracing::debug;

use crate::core::catalog::SensorCatalog;
use crate::core::{Reading, Severity, Violation, ViolationKind};

use super::rules;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("unknown sensor {0}: no catalog entry")]
    UnknownSensor(String),
}

/// Group readings by sensor code, in order of each code's first appearance.
/// Readings within a group keep their input order.
pub fn group_by_sensor(readings: &[Reading]) -> Vec<(&str, Vec<&Reading>)> {
    let mut groups: Vec<(&str, Vec<&Reading>)> = Vec::new();
    for reading in readings {
        match groups.iter().position(|(code, _)| *code == reading.sensor_code) {
            Some(i) => groups[i].1.push(reading),
            None => groups.push((reading.sensor_code.as_str(), vec![reading])),
        }
    }
    groups
}

/// Emit one violation per missing or non-normal reading.
///
/// Output is grouped by sensor; each sensor's violations follow its readings' order.
/// Every sensor code is resolved before anything is emitted, so an unknown code
/// fails the whole batch rather than silently dropping its readings.
pub fn detect_violations(
    readings: &[Reading],
    catalog: &SensorCatalog,
) -> Result<Vec<Violation>, DetectError> {
    let groups = group_by_sensor(readings);
    let mut resolved = Vec::with_capacity(groups.len());
    for (code, group) in groups {
        let sensor = catalog
            .get(code)
            .ok_or_else(|| DetectError::UnknownSensor(code.to_string()))?;
        resolved.push((sensor, group));
    }

    let mut out = Vec::new();
    for (sensor, group) in resolved {
        for reading in group {
            let violation = match reading.value {
                None => Violation {
                    sensor_code: sensor.code.clone(),
                    kind: ViolationKind::Missing,
                    severity: Severity::Warning,
                    message: format!("Missing reading from {}", sensor.code),
                    timestamp: reading.timestamp,
                },
                Some(value) => match rules::classify(value, &sensor.kind) {
                    Severity::Normal => continue,
                    severity => Violation {
                        sensor_code: sensor.code.clone(),
                        kind: ViolationKind::Threshold,
                        severity,
                        message: format!("{} breach: {value}", sensor.code),
                        timestamp: reading.timestamp,
                    },
                },
            };
            debug!(
                "{} {} violation at {}: {}",
                violation.severity.as_str(),
                violation.kind.as_str(),
                violation.timestamp,
                violation.message
            );
            out.push(violation);
        }
    }
    Ok(out)
}
