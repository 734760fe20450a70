//! Full metrics and alert log.
//!
//! The engine itself keeps only the bounded trend window. Anything that wants
//! the complete run (reports, audits, `export_metrics`) reads it from here.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OpenFlags};

use crate::alerts::Alert;
use crate::metrics::MetricsSample;

pub trait MetricsLogStore {
    fn append_sample(&mut self, sample: &MetricsSample) -> Result<()>;

    fn append_alerts(&mut self, alerts: &[Alert]) -> Result<()>;

    /// Samples in append order, at most `limit`.
    fn samples(&self, limit: usize) -> Result<Vec<MetricsSample>>;

    /// Alerts in append order, at most `limit`.
    fn alerts(&self, limit: usize) -> Result<Vec<Alert>>;
}

pub struct SqliteMetricsLogStore {
    conn: Connection,
}

impl SqliteMetricsLogStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = if db_path.starts_with("file:") {
            Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )?
        } else {
            Connection::open(db_path)?
        };
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS metrics_samples (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              frame_index INTEGER NOT NULL,
              person_count INTEGER NOT NULL,
              no_helmet_count INTEGER NOT NULL,
              no_mask_count INTEGER NOT NULL,
              hazard_count INTEGER NOT NULL,
              risk_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alerts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              frame_index INTEGER NOT NULL,
              severity TEXT NOT NULL,
              payload_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_samples_frame ON metrics_samples(frame_index);
            CREATE INDEX IF NOT EXISTS idx_alerts_frame ON alerts(frame_index);
            "#,
        )?;
        Ok(())
    }
}

fn to_sql_index(frame_index: u64) -> Result<i64> {
    i64::try_from(frame_index).map_err(|_| anyhow!("frame index exceeds i64 range"))
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl MetricsLogStore for SqliteMetricsLogStore {
    fn append_sample(&mut self, sample: &MetricsSample) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO metrics_samples(frame_index, person_count, no_helmet_count,
                                        no_mask_count, hazard_count, risk_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                to_sql_index(sample.frame_index)?,
                sample.person_count,
                sample.no_helmet_count,
                sample.no_mask_count,
                sample.hazard_count,
                sample.risk_count
            ],
        )?;
        Ok(())
    }

    fn append_alerts(&mut self, alerts: &[Alert]) -> Result<()> {
        if alerts.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO alerts(frame_index, severity, payload_json) VALUES (?1, ?2, ?3)",
            )?;
            for alert in alerts {
                stmt.execute(params![
                    to_sql_index(alert.frame_index)?,
                    format!("{:?}", alert.severity),
                    serde_json::to_string(alert)?
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn samples(&self, limit: usize) -> Result<Vec<MetricsSample>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT frame_index, person_count, no_helmet_count, no_mask_count,
                   hazard_count, risk_count
            FROM metrics_samples ORDER BY id ASC LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![to_sql_limit(limit)], |row| {
            let frame_index: i64 = row.get(0)?;
            Ok((
                frame_index,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (frame_index, person_count, no_helmet_count, no_mask_count, hazard_count, risk_count) =
                row?;
            out.push(MetricsSample {
                frame_index: u64::try_from(frame_index)
                    .map_err(|_| anyhow!("corrupt metrics log: negative frame index"))?,
                person_count,
                no_helmet_count,
                no_mask_count,
                hazard_count,
                risk_count,
            });
        }
        Ok(out)
    }

    fn alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM alerts ORDER BY id ASC LIMIT ?1")?;
        let payloads = stmt
            .query_map(params![to_sql_limit(limit)], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        payloads
            .iter()
            .map(|payload| {
                serde_json::from_str(payload)
                    .map_err(|e| anyhow!("corrupt alert log entry: {}", e))
            })
            .collect()
    }
}

/// Non-persistent store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryMetricsLogStore {
    samples: Vec<MetricsSample>,
    alerts: Vec<Alert>,
}

impl InMemoryMetricsLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsLogStore for InMemoryMetricsLogStore {
    fn append_sample(&mut self, sample: &MetricsSample) -> Result<()> {
        self.samples.push(*sample);
        Ok(())
    }

    fn append_alerts(&mut self, alerts: &[Alert]) -> Result<()> {
        self.alerts.extend_from_slice(alerts);
        Ok(())
    }

    fn samples(&self, limit: usize) -> Result<Vec<MetricsSample>> {
        Ok(self.samples.iter().take(limit).copied().collect())
    }

    fn alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        Ok(self.alerts.iter().take(limit).cloned().collect())
    }
}
