use serde::Deserialize;
use std::path::Path;

use crate::core::catalog::{SensorDefinition, default_definitions};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub simulation: SimulationConfig,
    pub output: OutputConfig,
    pub sensors: Vec<SensorDefinition>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub shipments: usize,
    pub readings_per_sensor: usize,
    pub interval_minutes: i64,
    pub missing_rate: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub json_path: String,
    pub text_report: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            simulation: SimulationConfig::default(),
            output: OutputConfig::default(),
            sensors: default_definitions(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/medisafe.db".into(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            shipments: 5,
            readings_per_sensor: 12,
            interval_minutes: 5,
            missing_rate: 0.03,
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_path: "shipment_summary.json".into(),
            text_report: true,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(contents)?;
        let rate = config.simulation.missing_rate;
        if !(0.0..=1.0).contains(&rate) {
            let fallback = SimulationConfig::default().missing_rate;
            tracing::warn!("simulation.missing_rate {rate} is not a probability, using {fallback}");
            config.simulation.missing_rate = fallback;
        }
        Ok(config)
    }
}
