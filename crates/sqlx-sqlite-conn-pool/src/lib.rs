//! # sqlx-sqlite-conn-pool
//!
//! A bounded connection pool over SQLx for a single SQLite file, for services
//! whose callers far outnumber the connections SQLite handles comfortably.
//!
//! ## Core Types
//!
//! - **[`SqlitePool`]**: Hands out at most `max_connections` connections, reusing the most recently returned first
//! - **[`SqlitePoolConfig`]** / **[`EnginePragmas`]**: Capacity, default wait and per-connection engine settings
//! - **[`PooledConnection`]**: RAII guard returning its connection to the pool on drop
//! - **[`PoolStatus`]**: Snapshot of the pool counters
//! - **[`Error`]**: Error type for pool operations
//!
//! ## Architecture
//!
//! - **Lazy growth**: Connections open on demand, up to capacity, and are recycled indefinitely
//! - **LIFO reuse**: The warmest connection (largest page cache) is handed out first
//! - **Notified waits**: Callers blocked on a full pool are woken in arrival order when a connection is released
//! - **WAL everywhere**: Every connection runs in WAL mode with `synchronous=NORMAL`, so readers never block the writer

mod config;
mod connection;
mod error;
mod pool;

// Re-export public types
pub use config::{EnginePragmas, SqlitePoolConfig};
pub use connection::PooledConnection;
pub use error::{Error, Result};
pub use pool::{PoolStatus, SqlitePool};
