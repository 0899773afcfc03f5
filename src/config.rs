//! File-based gateway configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx_sqlite_conn_pool::{EnginePragmas, SqlitePoolConfig};
use sqlx_sqlite_retry::RetryPolicy;

use crate::{Error, Result};

/// Gateway settings, usually loaded from a JSON file.
///
/// Missing fields take their defaults; unknown fields are rejected so a
/// misspelled key fails loudly instead of being ignored.
///
/// # Examples
///
/// ```
/// use sqlite_gateway::GatewayConfig;
///
/// let config = GatewayConfig::from_json(r#"{ "database_path": "orders.db", "max_connections": 8 }"#).unwrap();
///
/// assert_eq!(config.max_connections, 8);
/// assert_eq!(config.max_retry_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
   /// SQLite database file, created if missing
   ///
   /// Default: `app.db`
   pub database_path: PathBuf,

   /// Pool capacity
   ///
   /// Default: 25
   pub max_connections: u32,

   /// How long an operation waits for a pooled connection
   ///
   /// Default: 60000
   pub connection_timeout_ms: u64,

   /// Attempts per operation, including the first
   ///
   /// Default: 5
   pub max_retry_attempts: u32,

   /// First backoff delay; doubles after every further busy/locked failure
   ///
   /// Default: 50
   pub base_retry_delay_ms: u64,

   /// SQLite's own busy wait before reporting SQLITE_BUSY
   ///
   /// Default: 60000
   pub busy_timeout_ms: u64,

   /// `PRAGMA cache_size`
   ///
   /// Default: 2000
   pub cache_size: i64,

   /// `PRAGMA mmap_size`, in bytes
   ///
   /// Default: 536870912
   pub mmap_size: u64,

   /// `PRAGMA wal_autocheckpoint`, in pages
   ///
   /// Default: 1000
   pub wal_autocheckpoint: u32,
}

impl Default for GatewayConfig {
   fn default() -> Self {
      let pool = SqlitePoolConfig::default();
      let policy = RetryPolicy::default();

      Self {
         database_path: PathBuf::from("app.db"),
         max_connections: pool.max_connections,
         connection_timeout_ms: policy.max_wait_for_connection.as_millis() as u64,
         max_retry_attempts: policy.max_attempts,
         base_retry_delay_ms: policy.base_delay.as_millis() as u64,
         busy_timeout_ms: pool.pragmas.busy_timeout.as_millis() as u64,
         cache_size: pool.pragmas.cache_size,
         mmap_size: pool.pragmas.mmap_size,
         wal_autocheckpoint: pool.pragmas.wal_autocheckpoint,
      }
   }
}

impl GatewayConfig {
   /// Parse a JSON document and validate it.
   pub fn from_json(json: &str) -> Result<Self> {
      let config: Self = serde_json::from_str(json)?;
      config.validate()?;
      Ok(config)
   }

   /// Read, parse and validate a JSON configuration file.
   pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
      let json = std::fs::read_to_string(path)?;
      Self::from_json(&json)
   }

   pub fn validate(&self) -> Result<()> {
      if self.database_path.as_os_str().is_empty() {
         return Err(Error::Config("database_path must not be empty".into()));
      }
      if self.max_connections == 0 {
         return Err(Error::Config(
            "max_connections must be greater than zero".into(),
         ));
      }
      if self.max_retry_attempts == 0 {
         return Err(Error::Config(
            "max_retry_attempts must be greater than zero".into(),
         ));
      }
      if self.connection_timeout_ms == 0 {
         return Err(Error::Config(
            "connection_timeout_ms must be greater than zero".into(),
         ));
      }
      Ok(())
   }

   pub fn pool_config(&self) -> SqlitePoolConfig {
      SqlitePoolConfig {
         max_connections: self.max_connections,
         connection_timeout: Duration::from_millis(self.connection_timeout_ms),
         pragmas: EnginePragmas {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            cache_size: self.cache_size,
            mmap_size: self.mmap_size,
            wal_autocheckpoint: self.wal_autocheckpoint,
         },
      }
   }

   pub fn retry_policy(&self) -> RetryPolicy {
      RetryPolicy {
         max_attempts: self.max_retry_attempts,
         base_delay: Duration::from_millis(self.base_retry_delay_ms),
         max_wait_for_connection: Duration::from_millis(self.connection_timeout_ms),
      }
   }
}
