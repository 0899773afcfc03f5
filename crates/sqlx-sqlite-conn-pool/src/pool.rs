//! Bounded SQLite connection pool with LIFO reuse

use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::SqlitePoolConfig;
use crate::connection::{PooledConnection, close_connection, connect_options, open_connection};
use crate::{Error, Result};

/// Bounded pool of connections to a single SQLite file.
///
/// ## Architecture
///
/// - **`state`**: `created`, `checked_out` and the idle stack, guarded by one
///   mutex that is never held across an `.await` or around engine I/O
/// - **`slots`**: FIFO semaphore with one permit per connection that could
///   still be checked out; waiters are woken as soon as a connection is
///   released, never by polling
///
/// At every observation `checked_out + idle == created <= capacity`.
///
/// ## Usage Pattern
///
/// ```text
/// 1. Construct once per process (no I/O happens here)
/// 2. acquire(timeout) -> PooledConnection; connections open lazily up to capacity
/// 3. Drop the guard (or call release) to put the connection back on top of the idle stack
/// 4. shutdown() when the process exits
/// ```
#[derive(Clone)]
pub struct SqlitePool {
   inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
   path: PathBuf,
   config: SqlitePoolConfig,
   connect_options: SqliteConnectOptions,
   state: Mutex<PoolState>,
   slots: Semaphore,
   next_id: AtomicU64,
}

struct PoolState {
   created: u32,
   checked_out: u32,
   /// Most recently returned connection last
   idle: Vec<IdleConnection>,
   closed: bool,
}

struct IdleConnection {
   id: u64,
   conn: SqliteConnection,
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
   /// Connections currently open (idle + checked out)
   pub created: u32,
   /// Connections currently held by callers
   pub checked_out: u32,
   /// Connections waiting for reuse
   pub idle: u32,
   /// Upper bound on `created`
   pub capacity: u32,
   pub closed: bool,
}

enum Checkout {
   Idle(IdleConnection),
   Open(u64),
}

/// Slot reserved under the lock for a connection still being opened.
///
/// Released again if the open fails or the acquiring future is dropped.
struct SlotReservation<'a> {
   pool: &'a PoolInner,
   armed: bool,
}

impl SlotReservation<'_> {
   fn disarm(mut self) {
      self.armed = false;
   }
}

impl Drop for SlotReservation<'_> {
   fn drop(&mut self) {
      if self.armed {
         self.pool.abandon_slot();
      }
   }
}

impl SqlitePool {
   /// Create a pool for the database file at `path`.
   ///
   /// No connection is opened until the first [`acquire`](Self::acquire).
   pub fn new(path: impl AsRef<Path>, config: SqlitePoolConfig) -> Result<Self> {
      if config.max_connections == 0 {
         return Err(Error::InvalidConfig(
            "max_connections must be greater than zero".into(),
         ));
      }

      let path = path.as_ref().to_path_buf();
      let connect_options = connect_options(&path, &config.pragmas);
      let capacity = config.max_connections;

      debug!(path = %path.display(), capacity, "Created SQLite connection pool");

      Ok(Self {
         inner: Arc::new(PoolInner {
            path,
            connect_options,
            state: Mutex::new(PoolState {
               created: 0,
               checked_out: 0,
               idle: Vec::with_capacity(capacity as usize),
               closed: false,
            }),
            slots: Semaphore::new(capacity as usize),
            next_id: AtomicU64::new(1),
            config,
         }),
      })
   }

   /// Check out a connection, waiting at most `timeout` for one to free up.
   ///
   /// Reuses the most recently returned idle connection when there is one,
   /// otherwise opens a new connection if the pool is below capacity.
   /// Waiters are served in arrival order.
   pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection> {
      let inner = &self.inner;

      let permit = match tokio::time::timeout(timeout, inner.slots.acquire()).await {
         Ok(Ok(permit)) => permit,
         // The semaphore is only ever closed by shutdown()
         Ok(Err(_)) => return Err(Error::PoolClosed),
         Err(_) => {
            let checked_out = inner.state.lock().checked_out;
            debug!(
               checked_out,
               capacity = inner.config.max_connections,
               "Timed out waiting for a pooled connection"
            );
            return Err(Error::PoolExhausted {
               checked_out,
               capacity: inner.config.max_connections,
            });
         }
      };

      let checkout = {
         let mut state = inner.state.lock();
         if state.closed {
            return Err(Error::PoolClosed);
         }

         state.checked_out += 1;
         match state.idle.pop() {
            Some(idle) => Checkout::Idle(idle),
            None => {
               // Holding a permit with nothing idle means created < capacity
               state.created += 1;
               Checkout::Open(inner.next_id.fetch_add(1, Ordering::Relaxed))
            }
         }
      };

      // The permit now travels with the connection and is restored on release
      permit.forget();

      match checkout {
         Checkout::Idle(IdleConnection { id, conn }) => {
            Ok(PooledConnection::new(id, conn, Arc::clone(inner)))
         }
         Checkout::Open(id) => {
            let reservation = SlotReservation {
               pool: inner,
               armed: true,
            };
            let conn = open_connection(&inner.connect_options, id).await?;

            let closed = inner.state.lock().closed;
            if closed {
               drop(reservation);
               close_connection(conn, id).await;
               return Err(Error::PoolClosed);
            }

            reservation.disarm();
            Ok(PooledConnection::new(id, conn, Arc::clone(inner)))
         }
      }
   }

   /// [`acquire`](Self::acquire) with the configured `connection_timeout`.
   pub async fn get(&self) -> Result<PooledConnection> {
      self.acquire(self.inner.config.connection_timeout).await
   }

   /// Return a connection to the pool.
   ///
   /// Equivalent to dropping the guard.
   pub fn release(&self, conn: PooledConnection) {
      drop(conn);
   }

   /// Close every idle connection and refuse further checkouts.
   ///
   /// Callers currently waiting in [`acquire`](Self::acquire) are woken with
   /// [`Error::PoolClosed`]. Connections still checked out are closed when
   /// they are released. Calling this more than once is a no-op.
   pub async fn shutdown(&self) {
      let idle = {
         let mut state = self.inner.state.lock();
         if state.closed {
            return;
         }
         state.closed = true;
         state.created = 0;
         state.checked_out = 0;
         mem::take(&mut state.idle)
      };

      self.inner.slots.close();
      debug!(
         path = %self.inner.path.display(),
         idle = idle.len(),
         "Shutting down SQLite connection pool"
      );

      for IdleConnection { id, conn } in idle {
         close_connection(conn, id).await;
      }
   }

   /// Snapshot of the pool counters, taken under the pool lock.
   pub fn status(&self) -> PoolStatus {
      let state = self.inner.state.lock();
      PoolStatus {
         created: state.created,
         checked_out: state.checked_out,
         idle: state.idle.len() as u32,
         capacity: self.inner.config.max_connections,
         closed: state.closed,
      }
   }

   pub fn is_closed(&self) -> bool {
      self.inner.state.lock().closed
   }

   pub fn config(&self) -> &SqlitePoolConfig {
      &self.inner.config
   }

   /// Path of the database file this pool connects to
   pub fn path(&self) -> &Path {
      &self.inner.path
   }
}

impl PoolInner {
   /// Put a released connection back on top of the idle stack.
   pub(crate) fn recycle(&self, id: u64, conn: SqliteConnection) {
      let (surplus, closed) = {
         let mut state = self.state.lock();
         if state.closed {
            (Some(conn), true)
         } else {
            state.checked_out = state.checked_out.saturating_sub(1);
            if state.idle.len() >= self.config.max_connections as usize {
               state.created = state.created.saturating_sub(1);
               (Some(conn), false)
            } else {
               state.idle.push(IdleConnection { id, conn });
               (None, false)
            }
         }
      };

      if !closed {
         self.slots.add_permits(1);
      }

      if let Some(conn) = surplus {
         dispose(conn, id);
      }
   }

   /// Give up a checked-out slot whose connection is gone (failed open,
   /// discarded connection, cancelled acquire).
   pub(crate) fn abandon_slot(&self) {
      let closed = {
         let mut state = self.state.lock();
         if !state.closed {
            state.checked_out = state.checked_out.saturating_sub(1);
            state.created = state.created.saturating_sub(1);
         }
         state.closed
      };

      if !closed {
         self.slots.add_permits(1);
      }
   }
}

/// Close a connection that is not going back to the idle stack.
///
/// Runs the graceful close on the current runtime when there is one;
/// otherwise dropping the connection tears it down.
fn dispose(conn: SqliteConnection, id: u64) {
   match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
         handle.spawn(close_connection(conn, id));
      }
      Err(_) => drop(conn),
   }
}

impl fmt::Debug for SqlitePool {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("SqlitePool")
         .field("path", &self.inner.path)
         .field("status", &self.status())
         .finish()
   }
}

impl fmt::Debug for PoolInner {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("PoolInner")
         .field("path", &self.path)
         .field("config", &self.config)
         .finish_non_exhaustive()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use tempfile::TempDir;

   fn test_pool(max_connections: u32) -> (SqlitePool, TempDir) {
      let temp_dir = TempDir::new().expect("Failed to create temp directory");
      let pool = SqlitePool::new(
         temp_dir.path().join("pool.db"),
         SqlitePoolConfig {
            max_connections,
            ..Default::default()
         },
      )
      .expect("Failed to create pool");

      (pool, temp_dir)
   }

   #[test]
   fn test_zero_capacity_rejected() {
      let err = SqlitePool::new("unused.db", SqlitePoolConfig {
         max_connections: 0,
         ..Default::default()
      })
      .unwrap_err();

      assert!(matches!(err, Error::InvalidConfig(_)));
   }

   #[test]
   fn test_new_pool_opens_nothing() {
      let (pool, _temp) = test_pool(4);

      assert_eq!(pool.status(), PoolStatus {
         created: 0,
         checked_out: 0,
         idle: 0,
         capacity: 4,
         closed: false,
      });
   }

   #[tokio::test]
   async fn test_released_connection_is_reused_lifo() {
      let (pool, _temp) = test_pool(4);

      let first = pool.acquire(Duration::from_secs(1)).await.unwrap();
      let second = pool.acquire(Duration::from_secs(1)).await.unwrap();
      let (first_id, second_id) = (first.id(), second.id());
      assert_ne!(first_id, second_id);

      pool.release(first);
      pool.release(second);

      // Most recently returned comes back first
      let conn = pool.acquire(Duration::from_secs(1)).await.unwrap();
      assert_eq!(conn.id(), second_id);
      assert_eq!(pool.status().created, 2);

      drop(conn);
      pool.shutdown().await;
   }

   #[tokio::test]
   async fn test_failed_open_frees_slot() {
      let temp_dir = TempDir::new().unwrap();
      // SQLite creates the file but never its parent directory
      let missing = temp_dir.path().join("missing").join("pool.db");
      let pool = SqlitePool::new(&missing, SqlitePoolConfig {
         max_connections: 1,
         ..Default::default()
      })
      .unwrap();

      let err = pool.acquire(Duration::from_millis(200)).await.unwrap_err();
      assert!(matches!(err, Error::Sqlx(_)));

      let status = pool.status();
      assert_eq!((status.created, status.checked_out, status.idle), (0, 0, 0));

      // The slot was returned, so the next attempt fails the same way
      // instead of timing out as exhausted
      let err = pool.acquire(Duration::from_millis(200)).await.unwrap_err();
      assert!(matches!(err, Error::Sqlx(_)));
   }

   #[tokio::test]
   async fn test_connection_dropped_in_transaction_is_discarded() {
      let (pool, _temp) = test_pool(2);

      let mut conn = pool.acquire(Duration::from_secs(1)).await.unwrap();
      sqlx::query("BEGIN").execute(&mut *conn).await.unwrap();
      conn.mark_transaction_open();
      let stale_id = conn.id();
      drop(conn);

      let status = pool.status();
      assert_eq!((status.created, status.checked_out, status.idle), (0, 0, 0));

      let conn = pool.acquire(Duration::from_secs(1)).await.unwrap();
      assert_ne!(conn.id(), stale_id);
      assert!(!conn.in_transaction());

      drop(conn);
      pool.shutdown().await;
   }

   #[tokio::test]
   async fn test_discard_frees_slot() {
      let (pool, _temp) = test_pool(1);

      let conn = pool.acquire(Duration::from_secs(1)).await.unwrap();
      conn.discard().await;

      assert_eq!(pool.status().created, 0);
      let conn = pool.acquire(Duration::from_millis(100)).await.unwrap();
      assert_eq!(pool.status().created, 1);

      drop(conn);
      pool.shutdown().await;
   }
}
