use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

/// Bind a JSON parameter to a SQLx query positionally
pub(crate) fn bind_value<'a>(
   query: Query<'a, Sqlite, SqliteArguments<'a>>,
   value: JsonValue,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::String(text) => query.bind(text),
      JsonValue::Bool(flag) => query.bind(flag),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Only reachable above i64::MAX; SQLite has no unsigned INTEGER
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      // Arrays and objects are stored as JSON text
      other => query.bind(other),
   }
}
