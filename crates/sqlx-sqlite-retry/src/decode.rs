//! SQLite row to JSON decoding

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Decode, Row, Sqlite, TypeInfo, ValueRef};

use crate::{Error, Result};

/// One decoded row: column name to value, in select-list order.
pub type JsonRow = IndexMap<String, JsonValue>;

/// Decode rows into ordered column maps
pub(crate) fn decode_rows(rows: Vec<SqliteRow>) -> Result<Vec<JsonRow>> {
   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::with_capacity(row.columns().len());
      for (i, column) in row.columns().iter().enumerate() {
         let raw = row
            .try_get_raw(i)
            .map_err(|e| Error::statement(None, e))?;
         value.insert(column.name().to_string(), to_json(raw)?);
      }
      values.push(value);
   }
   Ok(values)
}

/// Map one SQLite value to JSON using its runtime storage class.
///
/// BLOBs become base64 strings.
pub(crate) fn to_json(value: SqliteValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_name = value.type_info().name().to_string();
   let json = match type_name.as_str() {
      "INTEGER" | "BOOLEAN" => JsonValue::from(decode::<i64>(value)?),
      "REAL" => {
         let real = decode::<f64>(value)?;
         serde_json::Number::from_f64(real)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
      }
      "TEXT" | "DATE" | "TIME" | "DATETIME" => JsonValue::String(decode::<String>(value)?),
      "BLOB" => JsonValue::String(BASE64.encode(decode::<Vec<u8>>(value)?)),
      _ => return Err(Error::UnsupportedDatatype(type_name)),
   };

   Ok(json)
}

fn decode<'r, T>(value: SqliteValueRef<'r>) -> Result<T>
where
   T: Decode<'r, Sqlite>,
{
   T::decode(value).map_err(|e| Error::statement(None, sqlx::Error::Decode(e)))
}
