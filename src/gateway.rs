use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx_sqlite_conn_pool::SqlitePool;
use sqlx_sqlite_retry::{
   ExecutionResult, PoolStats, RetryingExecutor, Statement, StatementKind, StatsReporter,
};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{Error, GatewayConfig, Result};

/// Outcome of a health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
   Healthy,
   Unhealthy,
}

/// Health probe result, ready to be serialized for a status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
   pub status: HealthStatus,
   /// Unix timestamp of the probe, in seconds
   pub timestamp: i64,
   /// Probe failure, if any
   #[serde(skip_serializing_if = "Option::is_none")]
   pub error: Option<String>,
   pub stats: PoolStats,
}

/// Service handle over one SQLite database.
///
/// Constructed explicitly and shared by cloning; every clone uses the same
/// pool and counters.
#[derive(Debug, Clone)]
pub struct Gateway {
   config: GatewayConfig,
   executor: RetryingExecutor,
   reporter: StatsReporter,
}

impl Gateway {
   /// Validate `config`, build the pool and executor, and open one
   /// connection up front so path and journal-mode problems surface here
   /// rather than on the first request.
   pub async fn open(config: GatewayConfig) -> Result<Self> {
      config.validate()?;

      let pool = SqlitePool::new(&config.database_path, config.pool_config())?;

      // Warm-up connection, returned to the pool straight away
      if let Err(e) = pool.get().await {
         pool.shutdown().await;
         return Err(e.into());
      }

      let executor = RetryingExecutor::new(pool, config.retry_policy());
      let reporter = executor.reporter();

      debug!(
         path = %config.database_path.display(),
         max_connections = config.max_connections,
         "Opened SQLite gateway"
      );

      Ok(Self {
         config,
         executor,
         reporter,
      })
   }

   pub fn config(&self) -> &GatewayConfig {
      &self.config
   }

   /// Execute a SELECT query, returning every row
   pub async fn fetch_all(&self, query: &str, values: &[JsonValue]) -> Result<ExecutionResult> {
      Ok(self
         .executor
         .execute(query, values, StatementKind::Read)
         .await?)
   }

   /// Execute a write statement (INSERT/UPDATE/DELETE/DDL)
   pub async fn execute(&self, query: &str, values: &[JsonValue]) -> Result<ExecutionResult> {
      Ok(self
         .executor
         .execute(query, values, StatementKind::Write)
         .await?)
   }

   /// Execute statements atomically; see [`RetryingExecutor::execute_batch`]
   pub async fn execute_batch(
      &self,
      statements: &[Statement],
      kind: StatementKind,
   ) -> Result<ExecutionResult> {
      Ok(self.executor.execute_batch(statements, kind).await?)
   }

   pub fn stats(&self) -> PoolStats {
      self.reporter.snapshot()
   }

   /// Statistics view that outlives borrows of the gateway, e.g. for a
   /// metrics task
   pub fn reporter(&self) -> StatsReporter {
      self.reporter.clone()
   }

   /// Run `SELECT 1` through the executor and report the outcome with the
   /// current statistics.
   pub async fn health(&self) -> HealthReport {
      let probe = self.fetch_all("SELECT 1", &[]).await;
      let timestamp = OffsetDateTime::now_utc().unix_timestamp();

      let (status, error) = match probe {
         Ok(_) => (HealthStatus::Healthy, None),
         Err(e) => {
            warn!(error = %e, code = %e.error_code(), "Health probe failed");
            (HealthStatus::Unhealthy, Some(e.to_string()))
         }
      };

      HealthReport {
         status,
         timestamp,
         error,
         stats: self.stats(),
      }
   }

   /// Shut the pool down. Later calls on any clone fail with `POOL_CLOSED`.
   pub async fn close(&self) {
      self.executor.pool().shutdown().await;
   }
}
