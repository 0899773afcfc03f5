//! # sqlite-gateway
//!
//! Service handle for executing SQL against one SQLite file on behalf of many
//! concurrent callers. HTTP handlers, GUI clients and other front ends build
//! one [`Gateway`] at startup and share clones of it.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use sqlite_gateway::{Gateway, GatewayConfig};
//!
//! # async fn run() -> sqlite_gateway::Result<()> {
//! let gateway = Gateway::open(GatewayConfig::from_path("gateway.json")?).await?;
//!
//! gateway
//!    .execute("INSERT INTO users (name) VALUES (?)", &[json!("Ada")])
//!    .await?;
//! let users = gateway.fetch_all("SELECT * FROM users", &[]).await?;
//!
//! println!("{} users, error rate {:.1}%", users.row_count, gateway.stats().error_rate);
//! gateway.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod gateway;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use gateway::{Gateway, HealthReport, HealthStatus};

// Types that appear in the gateway's signatures
pub use sqlx_sqlite_retry::{
   ExecutionResult, JsonRow, PoolStats, Statement, StatementKind, StatementOutcome, StatsReporter,
};
