pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::core::catalog::SensorDefinition;
use crate::core::{Reading, SensorConfig, Shipment, ShipmentAssessment};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode sensor metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("unknown sensor {0}")]
    UnknownSensor(String),
}

/// A persisted risk score row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreRecord {
    pub id: i64,
    pub shipment_id: i64,
    pub score: f64,
    pub category: String,
    pub details_json: String,
    pub ts: String,
}

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or refresh a sensor by code. Returns its row id.
    pub fn upsert_sensor(&self, sensor: &SensorConfig) -> Result<i64, DbError> {
        self.lock().upsert_sensor(sensor)
    }

    /// Load all stored sensor definitions, in insertion order.
    pub fn sensor_definitions(&self) -> Result<Vec<SensorDefinition>, DbError> {
        self.lock().sensor_definitions()
    }

    /// Insert a shipment unless its code already exists. Returns its row id.
    pub fn insert_shipment(&self, shipment: &Shipment) -> Result<i64, DbError> {
        self.lock().insert_shipment(shipment)
    }

    /// Batch-store readings for one shipment in a single transaction.
    pub fn store_readings_batch(
        &self,
        shipment_id: i64,
        readings: &[Reading],
    ) -> Result<(), DbError> {
        self.lock().store_readings_batch(shipment_id, readings)
    }

    /// Joined (sensor_code, value, ts) rows for a shipment, in ingestion order.
    pub fn shipment_readings(&self, shipment_id: i64) -> Result<Vec<Reading>, DbError> {
        self.lock().shipment_readings(shipment_id)
    }

    /// Persist a risk score and its violations.
    pub fn store_assessment(&self, assessment: &ShipmentAssessment) -> Result<(), DbError> {
        self.lock().store_assessment(assessment)
    }

    /// Most recent risk score for a shipment.
    pub fn latest_risk_score(
        &self,
        shipment_id: i64,
    ) -> Result<Option<RiskScoreRecord>, DbError> {
        self.lock().latest_risk_score(shipment_id)
    }

    /// Number of stored violations for a shipment.
    pub fn violation_count(&self, shipment_id: i64) -> Result<usize, DbError> {
        self.lock().violation_count(shipment_id)
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(col: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e)))
}

/// SQLite turns NaN into NULL, so non-finite values go to the `raw` text column.
fn split_value(value: Option<f64>) -> (Option<f64>, Option<String>) {
    match value {
        Some(v) if !v.is_finite() => (None, Some(v.to_string())),
        other => (other, None),
    }
}

fn join_value(value: Option<f64>, raw: Option<&str>, col: usize) -> rusqlite::Result<Option<f64>> {
    match raw {
        Some(text) => text
            .parse::<f64>()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e))),
        None => Ok(value),
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn upsert_sensor(&self, sensor: &SensorConfig) -> Result<i64, DbError> {
        let metadata = serde_json::to_string(&sensor.kind.metadata())?;
        self.conn.execute(
            "INSERT INTO sensors (sensor_code, sensor_name, sensor_type, unit, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(sensor_code) DO UPDATE SET
                sensor_name = excluded.sensor_name,
                sensor_type = excluded.sensor_type,
                unit = excluded.unit,
                metadata = excluded.metadata",
            rusqlite::params![sensor.code, sensor.name, sensor.kind.type_name(), sensor.unit, metadata],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM sensors WHERE sensor_code = ?1",
            rusqlite::params![sensor.code],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn sensor_definitions(&self) -> Result<Vec<SensorDefinition>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT sensor_code, sensor_name, sensor_type, unit, metadata FROM sensors ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let metadata_json: String = row.get(4)?;
            let metadata: BTreeMap<String, f64> = serde_json::from_str(&metadata_json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
            Ok(SensorDefinition {
                code: row.get(0)?,
                name: row.get(1)?,
                sensor_type: row.get(2)?,
                unit: row.get(3)?,
                metadata,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn insert_shipment(&self, shipment: &Shipment) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO shipments (shipment_code, origin, destination, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                shipment.code,
                shipment.origin,
                shipment.destination,
                format_ts(&shipment.created_at)
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM shipments WHERE shipment_code = ?1",
            rusqlite::params![shipment.code],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn store_readings_batch(
        &self,
        shipment_id: i64,
        readings: &[Reading],
    ) -> Result<(), DbError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO readings (shipment_id, sensor_id, value, raw, unit, ts)
                 SELECT ?1, id, ?3, ?4, unit, ?5 FROM sensors WHERE sensor_code = ?2",
            )?;
            for r in readings {
                let (value, raw) = split_value(r.value);
                let inserted = stmt.execute(rusqlite::params![
                    shipment_id,
                    r.sensor_code,
                    value,
                    raw,
                    format_ts(&r.timestamp)
                ])?;
                if inserted == 0 {
                    // Unregistered sensor: refuse the batch rather than dropping rows
                    return Err(DbError::UnknownSensor(r.sensor_code.clone()));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn shipment_readings(&self, shipment_id: i64) -> Result<Vec<Reading>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.sensor_code, r.value, r.raw, r.ts
             FROM readings r JOIN sensors s ON r.sensor_id = s.id
             WHERE r.shipment_id = ?1
             ORDER BY r.id",
        )?;
        let rows = stmt.query_map(rusqlite::params![shipment_id], |row| {
            let raw: Option<String> = row.get(2)?;
            let ts: String = row.get(3)?;
            Ok(Reading {
                sensor_code: row.get(0)?,
                value: join_value(row.get(1)?, raw.as_deref(), 2)?,
                timestamp: parse_ts(3, &ts)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn store_assessment(&self, assessment: &ShipmentAssessment) -> Result<(), DbError> {
        let verdict = &assessment.verdict;
        let details = serde_json::json!({
            "violations": verdict.violations,
            "critical_alerts": assessment.critical_alerts,
        })
        .to_string();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO risk_scores (shipment_id, score, category, details, ts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                verdict.shipment_id,
                verdict.score,
                verdict.category.as_str(),
                details,
                format_ts(&Utc::now())
            ],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO violations (shipment_id, sensor_id, type, severity, message, ts)
                 VALUES (?1, (SELECT id FROM sensors WHERE sensor_code = ?2), ?3, ?4, ?5, ?6)",
            )?;
            for v in &verdict.violations {
                stmt.execute(rusqlite::params![
                    verdict.shipment_id,
                    v.sensor_code,
                    v.kind.as_str(),
                    v.severity.as_str(),
                    v.message,
                    format_ts(&v.timestamp)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn latest_risk_score(
        &self,
        shipment_id: i64,
    ) -> Result<Option<RiskScoreRecord>, DbError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, shipment_id, score, category, details, ts
                 FROM risk_scores WHERE shipment_id = ?1 ORDER BY id DESC LIMIT 1",
                rusqlite::params![shipment_id],
                |row| {
                    Ok(RiskScoreRecord {
                        id: row.get(0)?,
                        shipment_id: row.get(1)?,
                        score: row.get(2)?,
                        category: row.get(3)?,
                        details_json: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        ts: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn violation_count(&self, shipment_id: i64) -> Result<usize, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM violations WHERE shipment_id = ?1",
            rusqlite::params![shipment_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
