//! Statement inputs and execution results

use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::decode::JsonRow;

/// Whether a statement reads rows or changes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
   Read,
   Write,
}

/// Statement with its positional bind values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
   pub query: String,
   #[serde(default)]
   pub values: Vec<JsonValue>,
}

impl Statement {
   pub fn new(query: impl Into<String>, values: Vec<JsonValue>) -> Self {
      Self {
         query: query.into(),
         values,
      }
   }
}

/// Outcome of one statement inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
   /// Rows returned (reads) or affected (writes)
   pub row_count: u64,
   /// SQLite ROWID generated by an INSERT/REPLACE
   pub generated_id: Option<i64>,
}

/// Result of one logical operation, single statement or batch.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
   /// Decoded rows for reads, `None` for writes
   pub rows: Option<Vec<JsonRow>>,

   /// Rows returned (reads) or affected (writes); summed over a batch
   pub row_count: u64,

   /// ROWID generated by the (last) INSERT/REPLACE, if any.
   ///
   /// Tables created `WITHOUT ROWID` never report one.
   pub generated_id: Option<i64>,

   /// Execution time of the successful attempt
   #[serde(rename = "execution_time", serialize_with = "serialize_secs")]
   pub elapsed: Duration,

   pub kind: StatementKind,

   /// Attempts used, including the successful one
   pub attempts: u32,

   /// Per-statement outcomes, only for batches
   #[serde(skip_serializing_if = "Option::is_none")]
   pub statement_results: Option<Vec<StatementOutcome>>,
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
   serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Whether a successful write of `query` produced a fresh ROWID.
///
/// `last_insert_rowid` is per connection and survives recycling, so it is
/// only meaningful right after an INSERT or REPLACE that changed rows.
pub(crate) fn generated_id(query: &str, rows_affected: u64, last_insert_rowid: i64) -> Option<i64> {
   let keyword = query
      .trim_start()
      .split(|c: char| c.is_whitespace() || c == '(')
      .next()
      .unwrap_or_default();

   let inserts = keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE");
   (inserts && rows_affected > 0).then_some(last_insert_rowid)
}
