//! Request counters and the pool statistics snapshot

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use sqlx_sqlite_conn_pool::SqlitePool;

/// Monotonic counters shared by every clone of an executor.
#[derive(Debug)]
pub(crate) struct Counters {
   requests: AtomicU64,
   errors: AtomicU64,
   pool_exhausted: AtomicU64,
   started_at: Instant,
}

impl Counters {
   pub(crate) fn new() -> Self {
      Self {
         requests: AtomicU64::new(0),
         errors: AtomicU64::new(0),
         pool_exhausted: AtomicU64::new(0),
         started_at: Instant::now(),
      }
   }

   pub(crate) fn record_success(&self) {
      self.requests.fetch_add(1, Ordering::Relaxed);
   }

   /// A failed operation still counts as a completed request
   pub(crate) fn record_failure(&self) {
      self.errors.fetch_add(1, Ordering::Relaxed);
      self.requests.fetch_add(1, Ordering::Relaxed);
   }

   /// Saturation is tracked apart from faults
   pub(crate) fn record_pool_exhausted(&self) {
      self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
   }
}

/// Snapshot of pool occupancy and executor throughput.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
   /// Connections currently open
   pub total_connections: u32,
   /// Connections currently checked out
   pub active_connections: u32,
   /// Idle connections ready for reuse
   pub available_connections: u32,
   /// Pool capacity
   pub max_connections: u32,
   /// Operations that completed, successfully or not
   pub total_requests: u64,
   /// Operations that failed (pool exhaustion excluded)
   pub total_errors: u64,
   /// Operations turned away because no connection freed up in time
   pub pool_exhausted_total: u64,
   /// `total_errors / max(total_requests, 1) * 100`
   pub error_rate: f64,
   /// `total_requests / max(uptime_seconds, 1)`
   pub requests_per_second: f64,
   pub uptime_seconds: f64,
}

/// Read-only view over a pool and the counters of the executor using it.
#[derive(Debug, Clone)]
pub struct StatsReporter {
   pool: SqlitePool,
   counters: Arc<Counters>,
}

impl StatsReporter {
   pub(crate) fn new(pool: SqlitePool, counters: Arc<Counters>) -> Self {
      Self { pool, counters }
   }

   /// Current statistics.
   ///
   /// The connection figures come from one short pool lock; the request
   /// counters are read without locking.
   pub fn snapshot(&self) -> PoolStats {
      let status = self.pool.status();
      let uptime_seconds = self.counters.started_at.elapsed().as_secs_f64();
      let total_errors = self.counters.errors.load(Ordering::Relaxed);
      let total_requests = self.counters.requests.load(Ordering::Relaxed);

      PoolStats {
         total_connections: status.created,
         active_connections: status.checked_out,
         available_connections: status.idle,
         max_connections: status.capacity,
         total_requests,
         total_errors,
         pool_exhausted_total: self.counters.pool_exhausted.load(Ordering::Relaxed),
         error_rate: total_errors as f64 / total_requests.max(1) as f64 * 100.0,
         requests_per_second: total_requests as f64 / uptime_seconds.max(1.0),
         uptime_seconds,
      }
   }
}
