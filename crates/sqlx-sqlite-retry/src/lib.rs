//! # sqlx-sqlite-retry
//!
//! Statement execution on top of [`sqlx_sqlite_conn_pool`] for workloads where
//! many callers contend for one SQLite file.
//!
//! ## Core Types
//!
//! - **[`RetryingExecutor`]**: Runs single statements and atomic batches, retrying busy/locked failures with exponential backoff
//! - **[`RetryPolicy`]**: Attempt budget, base delay and connection wait
//! - **[`ExecutionResult`]**: Rows or affected count, generated ROWID, timing and attempts
//! - **[`StatsReporter`]** / **[`PoolStats`]**: Pool occupancy and request/error counters
//! - **[`Error`]**: Distinguishes pool exhaustion, exhausted retries and statement failures
//!
//! ## Behavior
//!
//! - **Retry only contention**: `SQLITE_BUSY` and `SQLITE_LOCKED` are retried; every other engine error fails at once
//! - **Whole-unit retries**: A failed batch is rolled back and re-run from its first statement
//! - **JSON in, JSON out**: Parameters bind positionally from JSON values; rows decode to ordered column maps, BLOBs as base64

mod bind;
mod decode;
mod error;
mod executor;
mod result;
mod retry;
mod stats;

// Re-export public types
pub use decode::JsonRow;
pub use error::{Error, Result};
pub use executor::{RetryingExecutor, SLOW_STATEMENT_THRESHOLD};
pub use result::{ExecutionResult, Statement, StatementKind, StatementOutcome};
pub use retry::RetryPolicy;
pub use stats::{PoolStats, StatsReporter};
