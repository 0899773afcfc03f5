//! Error types for sqlx-sqlite-conn-pool

use thiserror::Error;

/// Errors that may occur when working with sqlx-sqlite-conn-pool
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library, typically raised while opening or
   /// closing a connection
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// No connection became available before the caller's deadline
   #[error("connection pool exhausted: {checked_out} of {capacity} connections checked out")]
   PoolExhausted { checked_out: u32, capacity: u32 },

   /// Pool has been shut down and cannot hand out connections
   #[error("connection pool has been shut down")]
   PoolClosed,

   /// Pool configuration was rejected at construction
   #[error("invalid pool configuration: {0}")]
   InvalidConfig(String),
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
