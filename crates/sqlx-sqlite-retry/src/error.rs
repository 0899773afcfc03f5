/// Result type alias for executor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pooled statement execution.
///
/// Callers match on the first three variants: `PoolExhausted` is
/// backpressure, `RetryExhausted` is contention that outlived the retry
/// budget, `StatementFailed` is anything the engine rejected outright.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// No connection became available before the pool deadline.
   #[error("connection pool exhausted: {checked_out} of {capacity} connections checked out")]
   PoolExhausted { checked_out: u32, capacity: u32 },

   /// The database stayed busy or locked for every attempt.
   #[error("database still busy after {attempts} attempts: {source}")]
   RetryExhausted { attempts: u32, source: sqlx::Error },

   /// Non-transient engine error (constraint violation, syntax error, ...).
   ///
   /// `index` is the position of the failing statement within a batch.
   #[error("{}", describe_statement_failure(.index, .source))]
   StatementFailed {
      index: Option<usize>,
      source: sqlx::Error,
   },

   /// Batch failed and rollback also failed.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: String,
      rollback_error: String,
   },

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Batch submitted without statements.
   #[error("batch contains no statements")]
   EmptyBatch,

   /// Pool failure other than exhaustion (closed pool, failed open).
   #[error(transparent)]
   ConnectionPool(sqlx_sqlite_conn_pool::Error),
}

fn describe_statement_failure(index: &Option<usize>, source: &sqlx::Error) -> String {
   match index {
      Some(index) => format!("statement {index} failed: {source}"),
      None => format!("statement failed: {source}"),
   }
}

impl From<sqlx_sqlite_conn_pool::Error> for Error {
   fn from(err: sqlx_sqlite_conn_pool::Error) -> Self {
      match err {
         sqlx_sqlite_conn_pool::Error::PoolExhausted {
            checked_out,
            capacity,
         } => Error::PoolExhausted {
            checked_out,
            capacity,
         },
         other => Error::ConnectionPool(other),
      }
   }
}

impl Error {
   pub(crate) fn statement(index: Option<usize>, source: sqlx::Error) -> Self {
      Error::StatementFailed { index, source }
   }

   /// Attach the failing statement's batch position
   pub(crate) fn at_index(self, index: Option<usize>) -> Self {
      match self {
         Error::StatementFailed { source, .. } => Error::StatementFailed { index, source },
         other => other,
      }
   }

   /// Extract a structured error code from the error type.
   ///
   /// Engine errors report `SQLITE_<extended code>`.
   pub fn error_code(&self) -> String {
      match self {
         Error::PoolExhausted { .. } => "POOL_EXHAUSTED".to_string(),
         Error::RetryExhausted { .. } => "RETRY_EXHAUSTED".to_string(),
         Error::StatementFailed { source, .. } => {
            if let Some(code) = source.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "STATEMENT_FAILED".to_string()
         }
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::EmptyBatch => "EMPTY_BATCH".to_string(),
         Error::ConnectionPool(sqlx_sqlite_conn_pool::Error::PoolClosed) => {
            "POOL_CLOSED".to_string()
         }
         Error::ConnectionPool(_) => "CONNECTION_ERROR".to_string(),
      }
   }

   /// Whether this failure is SQLite reporting busy/locked contention.
   pub fn is_transient(&self) -> bool {
      match self {
         Error::StatementFailed { source, .. } => crate::retry::is_transient(source),
         _ => false,
      }
   }

   /// Whether the statement violated a UNIQUE, FOREIGN KEY, NOT NULL or
   /// CHECK constraint, as opposed to an operational failure.
   pub fn is_integrity_violation(&self) -> bool {
      match self {
         Error::StatementFailed { source, .. } => source
            .as_database_error()
            .is_some_and(|db_err| !matches!(db_err.kind(), sqlx::error::ErrorKind::Other)),
         _ => false,
      }
   }

   /// Whether the caller may reasonably resubmit the same operation later.
   pub fn is_retryable(&self) -> bool {
      matches!(
         self,
         Error::PoolExhausted { .. } | Error::RetryExhausted { .. }
      )
   }

   /// Turn a transient statement failure into the terminal retry error.
   pub(crate) fn into_retry_exhausted(self, attempts: u32) -> Self {
      match self {
         Error::StatementFailed { source, .. } => Error::RetryExhausted { attempts, source },
         other => other,
      }
   }
}
