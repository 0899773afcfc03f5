//! Connection bootstrap and the RAII guard handed out by the pool

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, warn};

use crate::Result;
use crate::config::EnginePragmas;
use crate::pool::PoolInner;

/// Builds the options every pooled connection is opened with.
///
/// WAL + NORMAL lets readers proceed alongside the single writer SQLite
/// allows; the remaining pragmas are tunables from [`EnginePragmas`].
pub(crate) fn connect_options(path: &Path, pragmas: &EnginePragmas) -> SqliteConnectOptions {
   SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true)
      .journal_mode(SqliteJournalMode::Wal)
      .synchronous(SqliteSynchronous::Normal)
      .busy_timeout(pragmas.busy_timeout)
      .pragma("cache_size", pragmas.cache_size.to_string())
      .pragma("mmap_size", pragmas.mmap_size.to_string())
      .pragma("temp_store", "memory")
      .pragma("wal_autocheckpoint", pragmas.wal_autocheckpoint.to_string())
}

pub(crate) async fn open_connection(
   options: &SqliteConnectOptions,
   id: u64,
) -> Result<SqliteConnection> {
   let conn = options.connect().await?;
   debug!(connection_id = id, "Opened pooled connection");
   Ok(conn)
}

pub(crate) async fn close_connection(conn: SqliteConnection, id: u64) {
   match conn.close().await {
      Ok(()) => debug!(connection_id = id, "Closed pooled connection"),
      Err(e) => warn!(connection_id = id, error = %e, "Failed to close pooled connection"),
   }
}

/// RAII guard for a checked-out connection.
///
/// Dereferences to [`SqliteConnection`]. Dropping the guard returns the
/// connection to the pool it came from. A guard dropped while marked as
/// inside an explicit transaction is closed rather than recycled, so an
/// unfinished transaction never reaches the next caller.
#[must_use = "if unused, the connection is immediately returned to the pool"]
pub struct PooledConnection {
   conn: Option<SqliteConnection>,
   id: u64,
   in_transaction: bool,
   pool: Arc<PoolInner>,
}

impl PooledConnection {
   pub(crate) fn new(id: u64, conn: SqliteConnection, pool: Arc<PoolInner>) -> Self {
      Self {
         conn: Some(conn),
         id,
         in_transaction: false,
         pool,
      }
   }

   /// Pool-unique id assigned when the underlying connection was opened.
   ///
   /// Stays the same each time the connection is recycled.
   pub fn id(&self) -> u64 {
      self.id
   }

   /// Record that an explicit transaction was begun on this connection.
   pub fn mark_transaction_open(&mut self) {
      self.in_transaction = true;
   }

   /// Record that the explicit transaction was committed or rolled back.
   pub fn mark_transaction_closed(&mut self) {
      self.in_transaction = false;
   }

   pub fn in_transaction(&self) -> bool {
      self.in_transaction
   }

   /// Close this connection instead of returning it to the pool.
   ///
   /// Frees the slot so a replacement can be opened by the next caller.
   pub async fn discard(mut self) {
      if let Some(conn) = self.conn.take() {
         self.pool.abandon_slot();
         close_connection(conn, self.id).await;
      }
   }
}

impl Drop for PooledConnection {
   fn drop(&mut self) {
      let Some(conn) = self.conn.take() else {
         return;
      };

      if self.in_transaction {
         warn!(
            connection_id = self.id,
            "Connection released inside a transaction; discarding it"
         );
         self.pool.abandon_slot();
         drop(conn);
      } else {
         self.pool.recycle(self.id, conn);
      }
   }
}

impl Deref for PooledConnection {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      self.conn.as_ref().expect("connection already released")
   }
}

impl DerefMut for PooledConnection {
   fn deref_mut(&mut self) -> &mut Self::Target {
      self.conn.as_mut().expect("connection already released")
   }
}

impl fmt::Debug for PooledConnection {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("PooledConnection")
         .field("id", &self.id)
         .field("in_transaction", &self.in_transaction)
         .finish()
   }
}
