//! Retrying statement executor over the bounded pool

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteConnection;
use sqlx_sqlite_conn_pool::{PooledConnection, SqlitePool};
use tracing::{debug, error, warn};

use crate::bind::bind_value;
use crate::decode::{JsonRow, decode_rows};
use crate::result::{ExecutionResult, Statement, StatementKind, StatementOutcome, generated_id};
use crate::retry::RetryPolicy;
use crate::stats::{Counters, StatsReporter};
use crate::{Error, Result};

/// Single attempts slower than this are logged
pub const SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_secs(1);

/// Longest statement prefix included in log events
const LOGGED_STATEMENT_CHARS: usize = 100;

/// Runs statements on pooled connections, retrying busy/locked failures
/// with exponential backoff and counting every outcome.
///
/// Cloning is cheap; clones share the pool and the counters.
#[derive(Debug, Clone)]
pub struct RetryingExecutor {
   pool: SqlitePool,
   policy: RetryPolicy,
   counters: Arc<Counters>,
}

/// One logical operation, re-run from scratch on every attempt
enum Work<'a> {
   Single {
      query: &'a str,
      values: &'a [JsonValue],
      kind: StatementKind,
   },
   Batch {
      statements: &'a [Statement],
      kind: StatementKind,
   },
}

/// What a successful attempt produced
struct Attempt {
   rows: Option<Vec<JsonRow>>,
   row_count: u64,
   generated_id: Option<i64>,
   statement_results: Option<Vec<StatementOutcome>>,
}

impl RetryingExecutor {
   pub fn new(pool: SqlitePool, policy: RetryPolicy) -> Self {
      Self {
         pool,
         policy,
         counters: Arc::new(Counters::new()),
      }
   }

   pub fn pool(&self) -> &SqlitePool {
      &self.pool
   }

   pub fn policy(&self) -> &RetryPolicy {
      &self.policy
   }

   /// Statistics view sharing this executor's counters
   pub fn reporter(&self) -> StatsReporter {
      StatsReporter::new(self.pool.clone(), Arc::clone(&self.counters))
   }

   /// Execute one statement.
   ///
   /// Reads return every row; writes autocommit and report the affected
   /// row count and, for inserts, the generated ROWID. Busy/locked
   /// failures are retried with backoff up to `max_attempts`; anything
   /// else fails immediately.
   pub async fn execute(
      &self,
      query: &str,
      values: &[JsonValue],
      kind: StatementKind,
   ) -> Result<ExecutionResult> {
      self.run(Work::Single {
         query,
         values,
         kind,
      })
      .await
   }

   /// Execute statements as one all-or-nothing unit on a single connection.
   ///
   /// Writes run inside `BEGIN IMMEDIATE`, reads inside a deferred `BEGIN`
   /// so they share one snapshot. Any failure rolls back the whole batch;
   /// busy/locked failures retry the whole batch.
   pub async fn execute_batch(
      &self,
      statements: &[Statement],
      kind: StatementKind,
   ) -> Result<ExecutionResult> {
      if statements.is_empty() {
         return Err(Error::EmptyBatch);
      }

      self.run(Work::Batch { statements, kind }).await
   }

   async fn run(&self, work: Work<'_>) -> Result<ExecutionResult> {
      let max_attempts = self.policy.attempts();
      let mut attempt = 1;

      loop {
         let mut conn = match self.pool.acquire(self.policy.max_wait_for_connection).await {
            Ok(conn) => conn,
            Err(e) => {
               let err = Error::from(e);
               if matches!(err, Error::PoolExhausted { .. }) {
                  self.counters.record_pool_exhausted();
               } else {
                  self.counters.record_failure();
               }
               warn!(error = %err, "Could not acquire a pooled connection");
               return Err(err);
            }
         };

         let started = Instant::now();
         let outcome = work.run(&mut conn).await;
         let elapsed = started.elapsed();
         self.pool.release(conn);

         if elapsed > SLOW_STATEMENT_THRESHOLD {
            warn!(
               elapsed_ms = elapsed.as_millis() as u64,
               statement = %work.summary(),
               "Slow statement"
            );
         }

         match outcome {
            Ok(done) => {
               self.counters.record_success();
               return Ok(ExecutionResult {
                  rows: done.rows,
                  row_count: done.row_count,
                  generated_id: done.generated_id,
                  elapsed,
                  kind: work.kind(),
                  attempts: attempt,
                  statement_results: done.statement_results,
               });
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
               let delay = self.policy.backoff(attempt);
               warn!(
                  attempt,
                  max_attempts,
                  delay_ms = delay.as_millis() as u64,
                  "Database busy, retrying"
               );
               tokio::time::sleep(delay).await;
               attempt += 1;
            }
            Err(err) => {
               self.counters.record_failure();
               let err = if err.is_transient() {
                  err.into_retry_exhausted(attempt)
               } else {
                  err
               };
               debug!(error = %err, code = %err.error_code(), "Statement failed");
               return Err(err);
            }
         }
      }
   }
}

impl Work<'_> {
   fn kind(&self) -> StatementKind {
      match self {
         Work::Single { kind, .. } | Work::Batch { kind, .. } => *kind,
      }
   }

   fn summary(&self) -> String {
      match self {
         Work::Single { query, .. } => truncate(query),
         Work::Batch { statements, .. } => format!(
            "batch of {} starting with {}",
            statements.len(),
            statements.first().map(|s| truncate(&s.query)).unwrap_or_default()
         ),
      }
   }

   async fn run(&self, conn: &mut PooledConnection) -> Result<Attempt> {
      match self {
         Work::Single {
            query,
            values,
            kind,
         } => run_statement(conn, query, values, *kind)
            .await
            .map_err(|e| e.at_index(None)),
         Work::Batch { statements, kind } => run_batch(conn, statements, *kind).await,
      }
   }
}

fn truncate(query: &str) -> String {
   query.chars().take(LOGGED_STATEMENT_CHARS).collect()
}

/// Run one statement on `conn`; the caller decides about transactions.
async fn run_statement(
   conn: &mut SqliteConnection,
   query: &str,
   values: &[JsonValue],
   kind: StatementKind,
) -> Result<Attempt> {
   let mut q = sqlx::query(query);
   for value in values {
      q = bind_value(q, value.clone());
   }

   match kind {
      StatementKind::Read => {
         let rows = q
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::statement(None, e))?;
         let rows = decode_rows(rows)?;
         Ok(Attempt {
            row_count: rows.len() as u64,
            rows: Some(rows),
            generated_id: None,
            statement_results: None,
         })
      }
      StatementKind::Write => {
         let done = q
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::statement(None, e))?;
         Ok(Attempt {
            rows: None,
            row_count: done.rows_affected(),
            generated_id: generated_id(query, done.rows_affected(), done.last_insert_rowid()),
            statement_results: None,
         })
      }
   }
}

async fn run_batch(
   conn: &mut PooledConnection,
   statements: &[Statement],
   kind: StatementKind,
) -> Result<Attempt> {
   let begin = match kind {
      StatementKind::Write => "BEGIN IMMEDIATE",
      StatementKind::Read => "BEGIN",
   };
   sqlx::query(begin)
      .execute(&mut **conn)
      .await
      .map_err(|e| Error::statement(None, e))?;
   conn.mark_transaction_open();

   // Execute all statements, rolling back on the first error
   let result = async {
      let mut rows = match kind {
         StatementKind::Read => Some(Vec::new()),
         StatementKind::Write => None,
      };
      let mut outcomes = Vec::with_capacity(statements.len());

      for (index, statement) in statements.iter().enumerate() {
         let attempt = run_statement(&mut **conn, &statement.query, &statement.values, kind)
            .await
            .map_err(|e| e.at_index(Some(index)))?;

         outcomes.push(StatementOutcome {
            row_count: attempt.row_count,
            generated_id: attempt.generated_id,
         });
         if let (Some(all), Some(batch_rows)) = (rows.as_mut(), attempt.rows) {
            all.extend(batch_rows);
         }
      }

      Ok::<_, Error>(Attempt {
         row_count: outcomes.iter().map(|o| o.row_count).sum(),
         generated_id: outcomes.iter().rev().find_map(|o| o.generated_id),
         rows,
         statement_results: Some(outcomes),
      })
   }
   .await;

   match result {
      Ok(attempt) => match sqlx::query("COMMIT").execute(&mut **conn).await {
         Ok(_) => {
            conn.mark_transaction_closed();
            Ok(attempt)
         }
         Err(e) => Err(rollback(conn, Error::statement(None, e)).await),
      },
      Err(e) => Err(rollback(conn, e).await),
   }
}

/// Roll back after `err`. If the rollback itself fails the connection stays
/// marked as inside a transaction and is discarded on release.
///
/// SQLite ends the transaction on its own after some errors (SQLITE_FULL,
/// SQLITE_IOERR, SQLITE_BUSY, SQLITE_NOMEM); the explicit ROLLBACK then
/// reports that no transaction is active, which counts as rolled back.
async fn rollback(conn: &mut PooledConnection, err: Error) -> Error {
   match sqlx::query("ROLLBACK").execute(&mut **conn).await {
      // Rollback succeeded, return original error
      Ok(_) => {
         conn.mark_transaction_closed();
         err
      }
      Err(rollback_err) if transaction_already_ended(&rollback_err) => {
         debug!(
            connection_id = conn.id(),
            "Transaction already rolled back by SQLite"
         );
         conn.mark_transaction_closed();
         err
      }
      Err(rollback_err) => {
         error!(
            connection_id = conn.id(),
            error = %rollback_err,
            "Rollback failed; connection will be discarded"
         );
         Error::TransactionRollbackFailed {
            transaction_error: err.to_string(),
            rollback_error: rollback_err.to_string(),
         }
      }
   }
}

fn transaction_already_ended(err: &sqlx::Error) -> bool {
   err.as_database_error()
      .is_some_and(|db_err| db_err.message().contains("no transaction is active"))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_truncate_keeps_statement_prefix() {
      let query = format!("SELECT {}", "x".repeat(200));
      let logged = truncate(&query);
      assert_eq!(logged.chars().count(), LOGGED_STATEMENT_CHARS);
      assert!(logged.starts_with("SELECT xxx"));

      // Counts characters, not bytes
      let query = "é".repeat(150);
      assert_eq!(truncate(&query), "é".repeat(100));
      assert_eq!(truncate("SELECT 1"), "SELECT 1");
   }

   #[test]
   fn test_non_database_errors_do_not_end_transactions() {
      assert!(!transaction_already_ended(&sqlx::Error::RowNotFound));
   }
}
