/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from statement execution (pool exhaustion, retries, engine errors).
   #[error(transparent)]
   Execution(#[from] sqlx_sqlite_retry::Error),

   /// Error from the connection pool outside of statement execution.
   #[error(transparent)]
   Pool(#[from] sqlx_sqlite_conn_pool::Error),

   /// Configuration rejected by validation.
   #[error("invalid configuration: {0}")]
   Config(String),

   /// Configuration file could not be read.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),

   /// Configuration file is not valid JSON for [`GatewayConfig`](crate::GatewayConfig).
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// Execution errors keep the codes of the executor crate.
   pub fn error_code(&self) -> String {
      match self {
         Error::Execution(err) => err.error_code(),
         Error::Pool(sqlx_sqlite_conn_pool::Error::PoolExhausted { .. }) => {
            "POOL_EXHAUSTED".to_string()
         }
         Error::Pool(sqlx_sqlite_conn_pool::Error::PoolClosed) => "POOL_CLOSED".to_string(),
         Error::Pool(_) => "CONNECTION_ERROR".to_string(),
         Error::Config(_) => "INVALID_CONFIG".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::Json(_) => "INVALID_CONFIG".to_string(),
      }
   }
}
