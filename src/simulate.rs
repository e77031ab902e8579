use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};

use crate::core::catalog::SensorCatalog;
use crate::core::{Reading, SensorKind, Shipment};

const ORIGINS: &[&str] = &["Mumbai", "Delhi", "Kolkata", "Bengaluru"];
const DESTINATIONS: &[&str] = &["Chennai", "Hyderabad", "Pune", "Ahmedabad"];

/// Sample shipments `SHP-100`, `SHP-101`, …, the i-th created i days before `now`.
pub fn create_sample_shipments<R: Rng>(n: usize, now: DateTime<Utc>, rng: &mut R) -> Vec<Shipment> {
    (0..n)
        .map(|i| Shipment {
            code: format!("SHP-{}", 100 + i),
            origin: pick(ORIGINS, rng),
            destination: pick(DESTINATIONS, rng),
            created_at: now - Duration::days(i as i64),
        })
        .collect()
}

/// `n` readings per catalog sensor, `interval` apart from `start`.
/// Each value is dropped to `None` with probability `missing_rate`;
/// a non-finite rate drops nothing.
pub fn generate_readings<R: Rng>(
    catalog: &SensorCatalog,
    start: DateTime<Utc>,
    n: usize,
    interval: Duration,
    missing_rate: f64,
    rng: &mut R,
) -> Vec<Reading> {
    let missing_rate = if missing_rate.is_finite() {
        missing_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut rows = Vec::with_capacity(catalog.len() * n);
    for sensor in catalog.iter() {
        let mut ts = start;
        for _ in 0..n {
            let mut value = Some(sample_value(&sensor.kind, rng));
            if rng.gen_bool(missing_rate) {
                value = None;
            }
            rows.push(Reading::new(sensor.code.clone(), value, ts));
            ts = ts + interval;
        }
    }
    rows
}

fn sample_value<R: Rng>(kind: &SensorKind, rng: &mut R) -> f64 {
    match kind {
        SensorKind::CoreTemperature(_) => {
            let v = gauss(rng, 5.0, 1.0);
            // Occasional door-open or freezer excursion
            if rng.gen_bool(0.1) {
                v + if rng.gen_bool(0.5) { 3.0 } else { -3.0 }
            } else {
                v
            }
        }
        SensorKind::SurfaceTemperature(_) => gauss(rng, 5.0, 1.5),
        SensorKind::Humidity(_) => gauss(rng, 45.0, 5.0),
        SensorKind::Shock(_) => {
            if rng.gen_bool(0.05) {
                rng.gen_range(2.0..5.0)
            } else {
                rng.gen_range(0.0..0.4)
            }
        }
        SensorKind::Gps(_) => rng.gen_range(0.0..3.0),
        SensorKind::BatteryVoltage(_) => {
            if rng.gen_bool(0.05) {
                rng.gen_range(2.8..3.1)
            } else {
                rng.gen_range(3.2..4.1)
            }
        }
    }
}

fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

fn pick<R: Rng>(choices: &[&str], rng: &mut R) -> String {
    choices.choose(rng).copied().unwrap_or_default().to_string()
}
