use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS shipments (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            shipment_code TEXT NOT NULL UNIQUE,
            origin        TEXT NOT NULL,
            destination   TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sensors (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sensor_code TEXT NOT NULL UNIQUE,
            sensor_name TEXT NOT NULL,
            sensor_type TEXT NOT NULL,
            unit        TEXT NOT NULL,
            metadata    TEXT NOT NULL -- JSON
        );

        CREATE TABLE IF NOT EXISTS readings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            shipment_id INTEGER NOT NULL REFERENCES shipments(id) ON DELETE CASCADE,
            sensor_id   INTEGER NOT NULL REFERENCES sensors(id) ON DELETE CASCADE,
            value       REAL, -- NULL = missing reading unless raw is set
            raw         TEXT, -- NaN / inf / -inf
            unit        TEXT NOT NULL,
            ts          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS violations (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            shipment_id INTEGER NOT NULL REFERENCES shipments(id) ON DELETE CASCADE,
            sensor_id   INTEGER REFERENCES sensors(id) ON DELETE CASCADE,
            type        TEXT NOT NULL,
            severity    TEXT NOT NULL,
            message     TEXT NOT NULL,
            ts          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS risk_scores (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            shipment_id INTEGER NOT NULL REFERENCES shipments(id) ON DELETE CASCADE,
            score       REAL NOT NULL,
            category    TEXT NOT NULL,
            details     TEXT, -- JSON
            ts          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_readings_shipment ON readings(shipment_id);
        CREATE INDEX IF NOT EXISTS idx_violations_shipment ON violations(shipment_id);
        CREATE INDEX IF NOT EXISTS idx_risk_scores_shipment ON risk_scores(shipment_id, id DESC);
        ",
    )?;

    // Databases created before the raw column existed
    let has_raw: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('readings') WHERE name = 'raw'",
        [],
        |row| row.get(0),
    )?;
    if !has_raw {
        conn.execute_batch("ALTER TABLE readings ADD COLUMN raw TEXT;")?;
    }
    Ok(())
}
