//! Retry policy and transient-error classification

use std::time::Duration;

/// SQLITE_BUSY primary result code
const SQLITE_BUSY: i32 = 5;
/// SQLITE_LOCKED primary result code
const SQLITE_LOCKED: i32 = 6;

/// How the executor reacts to busy/locked failures.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 4,
///     base_delay: Duration::from_millis(50),
///     ..Default::default()
/// };
///
/// assert_eq!(policy.backoff(1), Duration::from_millis(50));
/// assert_eq!(policy.backoff(3), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
   /// Total attempts per operation, including the first one. Zero is
   /// treated as one.
   ///
   /// Default: 5
   pub max_attempts: u32,

   /// Delay after the first transient failure; doubles for each further
   /// failure.
   ///
   /// Default: 50 milliseconds
   pub base_delay: Duration,

   /// How long one attempt may wait for a pooled connection.
   ///
   /// Default: 60 seconds
   pub max_wait_for_connection: Duration,
}

impl Default for RetryPolicy {
   fn default() -> Self {
      Self {
         max_attempts: 5,
         base_delay: Duration::from_millis(50),
         max_wait_for_connection: Duration::from_secs(60),
      }
   }
}

impl RetryPolicy {
   /// Sleep before the attempt that follows failed attempt number `attempt`
   /// (counted from 1): `base_delay * 2^(attempt - 1)`, saturating.
   pub fn backoff(&self, attempt: u32) -> Duration {
      let factor = 1u32
         .checked_shl(attempt.saturating_sub(1))
         .unwrap_or(u32::MAX);
      self.base_delay.saturating_mul(factor)
   }

   pub(crate) fn attempts(&self) -> u32 {
      self.max_attempts.max(1)
   }
}

/// Whether SQLite reported the database as busy or locked.
///
/// Checks the primary result code of the (extended) code first and falls
/// back to the message for errors that carry no code.
pub(crate) fn is_transient(err: &sqlx::Error) -> bool {
   let Some(db_err) = err.as_database_error() else {
      return false;
   };

   if let Some(code) = db_err.code().and_then(|code| code.parse::<i32>().ok()) {
      return matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED);
   }

   let message = db_err.message().to_lowercase();
   message.contains("database is locked") || message.contains("busy")
}
