mod config;
mod core;
mod db;
mod report;
mod signals;
mod simulate;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::catalog::SensorCatalog;
use crate::core::pipeline::{PipelineOutput, ShipmentBatch, run_pipeline};
use crate::db::SharedDatabase;
use crate::report::ShipmentSummary;
use crate::signals::RiskEngine;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medisafe=info")),
        )
        .init();

    tracing::info!("MediSafe monitoring starting...");

    let config = Config::load("medisafe.toml");
    tracing::debug!("Config: {:?}", config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Invalid thresholds stop us before any reading is classified
    let catalog = Arc::new(SensorCatalog::from_definitions(&config.sensors)?);
    if catalog.is_empty() {
        return Err("no sensors configured".into());
    }
    tracing::info!("Sensor catalog loaded with {} sensors", catalog.len());

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = SharedDatabase::open(db_path)?;
    tracing::info!("Database opened at {}", config.database.path);

    for sensor in catalog.iter() {
        db.upsert_sensor(sensor)?;
    }
    // Evaluate against everything registered, including sensors from earlier runs
    let registered = Arc::new(SensorCatalog::from_definitions(&db.sensor_definitions()?)?);

    let sim = &config.simulation;
    let mut rng = match sim.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let now = Utc::now();
    let start = now - Duration::hours(6);
    let interval = Duration::minutes(sim.interval_minutes);

    let mut shipments = Vec::new();
    for shipment in simulate::create_sample_shipments(sim.shipments, now, &mut rng) {
        let id = db.insert_shipment(&shipment)?;
        let readings = simulate::generate_readings(
            &catalog,
            start,
            sim.readings_per_sensor,
            interval,
            sim.missing_rate,
            &mut rng,
        );
        db.store_readings_batch(id, &readings)?;
        shipments.push((id, shipment.code));
    }
    tracing::info!("Sample data inserted for {} shipments", shipments.len());

    // Loader → Pipeline channel
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    // Pipeline → Report channel
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<PipelineOutput>();

    let engine = RiskEngine::new(registered);
    let pipeline = tokio::spawn(run_pipeline(batch_rx, out_tx, engine, Some(db.clone())));

    for (id, code) in &shipments {
        let readings = db.shipment_readings(*id)?;
        let batch = ShipmentBatch {
            shipment_id: *id,
            shipment_code: code.clone(),
            readings,
        };
        if batch_tx.send(batch).is_err() {
            tracing::warn!("Pipeline stopped early");
            break;
        }
    }
    drop(batch_tx);

    let mut summaries = Vec::new();
    while let Some(output) = out_rx.recv().await {
        match output {
            PipelineOutput::Assessed { shipment_code, assessment } => {
                if config.output.text_report {
                    println!("{}", report::render_text(&shipment_code, &assessment));
                }
                summaries.push(ShipmentSummary::from_assessment(&shipment_code, &assessment));
            }
            PipelineOutput::Failed { shipment_code, error } => {
                tracing::warn!("Skipping report for {shipment_code}: {error}");
            }
        }
    }
    pipeline.await?;

    for (id, code) in &shipments {
        if let Some(record) = db.latest_risk_score(*id)? {
            tracing::info!(
                "{code}: stored score {} ({}) at {}, {} violations on record",
                record.score,
                record.category,
                record.ts,
                db.violation_count(*id)?
            );
        }
    }

    report::write_json(&config.output.json_path, &summaries)?;
    tracing::info!("Done. JSON output saved to {}", config.output.json_path);
    Ok(())
}
