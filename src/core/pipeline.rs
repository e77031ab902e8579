use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::{Reading, ShipmentAssessment};
use crate::db::SharedDatabase;
use crate::signals::RiskEngine;

/// One shipment's joined readings, ready for evaluation.
#[derive(Debug, Clone)]
pub struct ShipmentBatch {
    pub shipment_id: i64,
    pub shipment_code: String,
    pub readings: Vec<Reading>,
}

/// Messages from pipeline to the reporting side.
#[derive(Debug, Clone)]
pub enum PipelineOutput {
    Assessed {
        shipment_code: String,
        assessment: ShipmentAssessment,
    },
    Failed {
        shipment_code: String,
        error: String,
    },
}

/// Run the pipeline: receive shipment batches, assess, persist, forward.
pub async fn run_pipeline(
    mut rx: mpsc::UnboundedReceiver<ShipmentBatch>,
    out_tx: mpsc::UnboundedSender<PipelineOutput>,
    engine: RiskEngine,
    db: Option<SharedDatabase>,
) {
    let mut assessed: u64 = 0;
    let mut failed: u64 = 0;

    info!("Pipeline started, waiting for shipments...");

    while let Some(batch) = rx.recv().await {
        let output = match engine.assess(batch.shipment_id, &batch.readings) {
            Ok(assessment) => {
                assessed += 1;
                info!(
                    "Shipment {} assessed: score={} ({}), {} violations",
                    batch.shipment_code,
                    assessment.verdict.score,
                    assessment.verdict.category,
                    assessment.verdict.violations.len()
                );
                if let Some(db) = &db {
                    match db.store_assessment(&assessment) {
                        Ok(()) => debug!("Stored assessment for shipment id {}", assessment.shipment_id()),
                        Err(e) => warn!("Failed to store assessment for {}: {e}", batch.shipment_code),
                    }
                }
                PipelineOutput::Assessed {
                    shipment_code: batch.shipment_code,
                    assessment,
                }
            }
            Err(e) => {
                failed += 1;
                warn!("Shipment {} rejected: {e}", batch.shipment_code);
                PipelineOutput::Failed {
                    shipment_code: batch.shipment_code,
                    error: e.to_string(),
                }
            }
        };

        if out_tx.send(output).is_err() {
            info!("Output channel closed, stopping pipeline");
            break;
        }
    }

    info!("Pipeline shutting down after {assessed} shipments ({failed} rejected)");
}
