//! PostgreSQL-wire sink (CockroachDB, PostgreSQL)

use super::{SampleSink, SinkTransaction, SAMPLES_TABLE};
use crate::config::DatabaseConfig;
use crate::sample::Sample;
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};

/// Savepoint wrapped around every insert so one rejected row does not abort
/// the enclosing transaction.
const SAMPLE_SAVEPOINT: &str = "promsink_sample";

/// Sink writing samples through a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect to the database described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(config.connect_options())
            .await?;

        info!(
            url = %config.redacted_url(),
            max_connections = config.max_connections,
            "Connected to database"
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl SampleSink for PostgresSink {
    fn name(&self) -> &'static str {
        "cockroachdb"
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {SAMPLES_TABLE} (
                timestamp TIMESTAMPTZ NOT NULL,
                metric TEXT NOT NULL,
                value TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        debug!(table = SAMPLES_TABLE, "Sample schema initialized");
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn SinkTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    /// Close the pool, waiting for checked-out connections to return
    async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&mut *self.tx).await.map(|_| ())
    }

    async fn insert(&mut self, sample: &Sample) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO {SAMPLES_TABLE} (timestamp, metric, value) VALUES ($1, $2, $3)"
        ))
        .bind(sample.timestamp())
        .bind(sample.metric())
        .bind(sample.value())
        .execute(&mut *self.tx)
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl SinkTransaction for PostgresTransaction {
    async fn save(&mut self, sample: &Sample) -> Result<()> {
        self.execute(&format!("SAVEPOINT {SAMPLE_SAVEPOINT}"))
            .await
            .map_err(|e| Error::Persist(format!("failed to open savepoint: {e}")))?;

        match self.insert(sample).await {
            Ok(()) => {
                self.execute(&format!("RELEASE SAVEPOINT {SAMPLE_SAVEPOINT}"))
                    .await
                    .map_err(|e| Error::Persist(format!("failed to release savepoint: {e}")))?;
                Ok(())
            }
            Err(insert_err) => {
                self.execute(&format!("ROLLBACK TO SAVEPOINT {SAMPLE_SAVEPOINT}"))
                    .await
                    .map_err(|e| {
                        Error::Persist(format!(
                            "failed to insert sample ({insert_err}) and to roll back savepoint ({e})"
                        ))
                    })?;
                Err(Error::Persist(format!(
                    "failed to insert sample {} at {}: {insert_err}",
                    sample.metric(),
                    sample.timestamp()
                )))
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| Error::Commit(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
