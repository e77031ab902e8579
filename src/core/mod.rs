pub mod catalog;
pub mod pipeline;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ideal band for temperature and humidity sensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeThresholds {
    pub ideal_low: f64,
    pub ideal_high: f64,
    /// Distance outside the band that is still only a warning.
    pub warning_margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShockThresholds {
    /// Inclusive lower bound for a critical spike, in g.
    pub spike_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryThresholds {
    /// Inclusive lower bound for a healthy cell, in volts.
    pub min_voltage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsThresholds {
    /// Carried through configuration and storage; no detection rule reads it yet.
    pub max_route_deviation_km: Option<f64>,
}

/// Sensor type together with the threshold set its rule needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorKind {
    CoreTemperature(RangeThresholds),
    SurfaceTemperature(RangeThresholds),
    Humidity(RangeThresholds),
    Shock(ShockThresholds),
    Gps(GpsThresholds),
    BatteryVoltage(BatteryThresholds),
}

impl SensorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            SensorKind::CoreTemperature(_) => "core_temperature",
            SensorKind::SurfaceTemperature(_) => "surface_temperature",
            SensorKind::Humidity(_) => "humidity",
            SensorKind::Shock(_) => "shock",
            SensorKind::Gps(_) => "gps",
            SensorKind::BatteryVoltage(_) => "battery_voltage",
        }
    }

    /// Threshold parameters as a flat name → value map, the shape sensors are stored in.
    pub fn metadata(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        match self {
            SensorKind::CoreTemperature(t)
            | SensorKind::SurfaceTemperature(t)
            | SensorKind::Humidity(t) => {
                map.insert("ideal_low".to_string(), t.ideal_low);
                map.insert("ideal_high".to_string(), t.ideal_high);
                map.insert("warning_margin".to_string(), t.warning_margin);
            }
            SensorKind::Shock(t) => {
                map.insert("spike_threshold".to_string(), t.spike_threshold);
            }
            SensorKind::Gps(t) => {
                if let Some(km) = t.max_route_deviation_km {
                    map.insert("max_route_deviation_km".to_string(), km);
                }
            }
            SensorKind::BatteryVoltage(t) => {
                map.insert("min_voltage".to_string(), t.min_voltage);
            }
        }
        map
    }
}

/// A validated, immutable sensor entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub kind: SensorKind,
}

/// A monitored consignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub code: String,
    pub origin: String,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

/// One telemetry sample. `value: None` is a missing or delayed reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_code: String,
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(sensor_code: impl Into<String>, value: Option<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor_code: sensor_code.into(),
            value,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Missing,
    Threshold,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Missing => "missing",
            ViolationKind::Threshold => "threshold",
        }
    }
}

/// A departure from normal for one reading, or the absence of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub sensor_code: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Risk bucket used both per sensor and per shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipment-level verdict, recomputed from scratch on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub shipment_id: i64,
    pub score: f64, // 0.0-1.0
    pub category: RiskLevel,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAnalysis {
    pub sensor_code: String,
    pub sensor_name: String,
    pub unit: String,
    pub reading_count: usize,
    pub missing_count: usize,
    pub average_value: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub violation_count: usize,
    pub risk: RiskLevel,
}

/// Everything derived for one shipment in one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentAssessment {
    pub verdict: RiskVerdict,
    pub sensor_analysis: Vec<SensorAnalysis>,
    /// Display names of sensors whose own risk is High.
    pub critical_alerts: Vec<String>,
}

impl ShipmentAssessment {
    pub fn shipment_id(&self) -> i64 {
        self.verdict.shipment_id
    }

    /// Violation count per sensor code, in analysis order, skipping sensors with none.
    pub fn violation_counts(&self) -> Vec<(&str, usize)> {
        self.sensor_analysis
            .iter()
            .filter(|a| a.violation_count > 0)
            .map(|a| (a.sensor_code.as_str(), a.violation_count))
            .collect()
    }
}
