//! Configuration for the bounded SQLite connection pool

use std::time::Duration;

/// Configuration for [`SqlitePool`](crate::SqlitePool)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_pool::SqlitePoolConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SqlitePoolConfig::default();
///
/// // Override just one field
/// let config = SqlitePoolConfig {
///     max_connections: 10,
///     ..Default::default()
/// };
///
/// assert_eq!(config.connection_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
   /// Maximum number of live connections (the pool's capacity)
   ///
   /// Connections are opened lazily, so fewer may exist at any moment.
   /// Must be greater than zero.
   ///
   /// Default: 25
   pub max_connections: u32,

   /// Default wait used by callers that don't pass their own deadline
   /// when every connection is checked out
   ///
   /// Default: 60 seconds
   pub connection_timeout: Duration,

   /// Engine settings applied to every connection when it is opened
   pub pragmas: EnginePragmas,
}

impl Default for SqlitePoolConfig {
   fn default() -> Self {
      Self {
         max_connections: 25,
         connection_timeout: Duration::from_secs(60),
         pragmas: EnginePragmas::default(),
      }
   }
}

/// Per-connection SQLite settings.
///
/// Journal mode is always WAL and synchronous is always NORMAL; those two are
/// what make concurrent readers alongside a single writer possible and are
/// not configurable.
#[derive(Debug, Clone)]
pub struct EnginePragmas {
   /// How long SQLite itself spins on a locked database before reporting
   /// SQLITE_BUSY.
   ///
   /// Default: 60 seconds
   pub busy_timeout: Duration,

   /// `PRAGMA cache_size`, in pages (negative values are KiB, as in SQLite).
   ///
   /// Default: 2000
   pub cache_size: i64,

   /// `PRAGMA mmap_size`, in bytes.
   ///
   /// Default: 512 MiB
   pub mmap_size: u64,

   /// `PRAGMA wal_autocheckpoint`, in pages.
   ///
   /// Default: 1000
   pub wal_autocheckpoint: u32,
}

impl Default for EnginePragmas {
   fn default() -> Self {
      Self {
         busy_timeout: Duration::from_secs(60),
         cache_size: 2000,
         mmap_size: 512 * 1024 * 1024,
         wal_autocheckpoint: 1000,
      }
   }
}
