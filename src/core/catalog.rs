use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    BatteryThresholds, GpsThresholds, RangeThresholds, SensorConfig, SensorKind, ShockThresholds,
};

const DEFAULT_WARNING_MARGIN: f64 = 1.0;
const DEFAULT_SPIKE_THRESHOLD: f64 = 2.0;
const DEFAULT_MIN_VOLTAGE: f64 = 3.3;

/// A sensor as written in configuration or storage, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDefinition {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub unit: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, f64>,
}

impl SensorDefinition {
    pub fn new(code: &str, name: &str, sensor_type: &str, unit: &str, metadata: &[(&str, f64)]) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sensor_type: sensor_type.to_string(),
            unit: unit.to_string(),
            metadata: metadata.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

/// The reference sensor set every shipment carries.
pub fn default_definitions() -> Vec<SensorDefinition> {
    vec![
        SensorDefinition::new(
            "T100",
            "ThermoProbe T-100",
            "core_temperature",
            "C",
            &[("ideal_low", 2.0), ("ideal_high", 8.0), ("warning_margin", 1.0)],
        ),
        SensorDefinition::new(
            "TX5",
            "TempTrack X5",
            "surface_temperature",
            "C",
            &[("ideal_low", 0.0), ("ideal_high", 10.0), ("warning_margin", 2.0)],
        ),
        SensorDefinition::new(
            "H200",
            "HumidSensor H-200",
            "humidity",
            "%",
            &[("ideal_low", 30.0), ("ideal_high", 60.0), ("warning_margin", 5.0)],
        ),
        SensorDefinition::new("S50", "ShockLog S-50", "shock", "g", &[("spike_threshold", 2.0)]),
        SensorDefinition::new(
            "G12",
            "GPS ColdTrack G-12",
            "gps",
            "km",
            &[("max_route_deviation_km", 5.0)],
        ),
        SensorDefinition::new(
            "B10",
            "BatteryMonitor B-10",
            "battery_voltage",
            "V",
            &[("min_voltage", 3.3)],
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("sensor definition has an empty code")]
    EmptyCode,
    #[error("duplicate sensor code {0}")]
    DuplicateCode(String),
    #[error("sensor {code}: unknown sensor type {sensor_type:?}")]
    UnknownSensorType { code: String, sensor_type: String },
    #[error("sensor {code}: missing threshold {name}")]
    MissingThreshold { code: String, name: &'static str },
    #[error("sensor {code}: threshold {name} is not finite")]
    NonFiniteThreshold { code: String, name: String },
    #[error("sensor {code}: warning_margin {margin} is negative")]
    NegativeMargin { code: String, margin: f64 },
    #[error("sensor {code}: ideal_low {low} is above ideal_high {high}")]
    InvertedRange { code: String, low: f64, high: f64 },
}

/// Immutable lookup from sensor code to its validated configuration.
#[derive(Debug, Clone, Default)]
pub struct SensorCatalog {
    sensors: Vec<SensorConfig>,
    index: HashMap<String, usize>,
}

impl SensorCatalog {
    /// Validate every definition; the first bad one aborts construction.
    pub fn from_definitions(defs: &[SensorDefinition]) -> Result<Self, CatalogError> {
        let mut sensors = Vec::with_capacity(defs.len());
        let mut index = HashMap::with_capacity(defs.len());
        for def in defs {
            let code = def.code.trim();
            if code.is_empty() {
                return Err(CatalogError::EmptyCode);
            }
            if index.contains_key(code) {
                return Err(CatalogError::DuplicateCode(code.to_string()));
            }
            let kind = parse_kind(code, &def.sensor_type, &def.metadata)?;
            index.insert(code.to_string(), sensors.len());
            sensors.push(SensorConfig {
                code: code.to_string(),
                name: def.name.clone(),
                unit: def.unit.clone(),
                kind,
            });
        }
        tracing::debug!("Sensor catalog built with {} sensors", sensors.len());
        Ok(Self { sensors, index })
    }

    pub fn get(&self, code: &str) -> Option<&SensorConfig> {
        self.index.get(code).map(|&i| &self.sensors[i])
    }

    /// Sensors in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &SensorConfig> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

fn parse_kind(
    code: &str,
    sensor_type: &str,
    meta: &BTreeMap<String, f64>,
) -> Result<SensorKind, CatalogError> {
    if let Some((name, _)) = meta.iter().find(|(_, v)| !v.is_finite()) {
        return Err(CatalogError::NonFiniteThreshold {
            code: code.to_string(),
            name: name.clone(),
        });
    }
    let required = |name: &'static str| {
        meta.get(name).copied().ok_or(CatalogError::MissingThreshold {
            code: code.to_string(),
            name,
        })
    };
    let optional = |name: &str, default: f64| meta.get(name).copied().unwrap_or(default);

    let kind = match sensor_type.trim() {
        t @ ("core_temperature" | "surface_temperature" | "humidity") => {
            let range = RangeThresholds {
                ideal_low: required("ideal_low")?,
                ideal_high: required("ideal_high")?,
                warning_margin: optional("warning_margin", DEFAULT_WARNING_MARGIN),
            };
            if range.warning_margin < 0.0 {
                return Err(CatalogError::NegativeMargin {
                    code: code.to_string(),
                    margin: range.warning_margin,
                });
            }
            if range.ideal_low > range.ideal_high {
                return Err(CatalogError::InvertedRange {
                    code: code.to_string(),
                    low: range.ideal_low,
                    high: range.ideal_high,
                });
            }
            match t {
                "core_temperature" => SensorKind::CoreTemperature(range),
                "surface_temperature" => SensorKind::SurfaceTemperature(range),
                _ => SensorKind::Humidity(range),
            }
        }
        "shock" => SensorKind::Shock(ShockThresholds {
            spike_threshold: optional("spike_threshold", DEFAULT_SPIKE_THRESHOLD),
        }),
        "gps" => SensorKind::Gps(GpsThresholds {
            max_route_deviation_km: meta.get("max_route_deviation_km").copied(),
        }),
        "battery_voltage" => SensorKind::BatteryVoltage(BatteryThresholds {
            min_voltage: optional("min_voltage", DEFAULT_MIN_VOLTAGE),
        }),
        other => {
            return Err(CatalogError::UnknownSensorType {
                code: code.to_string(),
                sensor_type: other.to_string(),
            });
        }
    };
    Ok(kind)
}
