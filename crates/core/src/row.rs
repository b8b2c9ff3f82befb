//! Rows: ordered column-name → value records flowing through a pipeline.

use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::error::WranglerError;
use crate::token::{decimal_to_json, ByteSize, TimeDuration, TokenKind};

/// A cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    ByteSize(ByteSize),
    TimeDuration(TimeDuration),
    /// Arrays and objects passed through untouched.
    Json(JsonValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::ByteSize(_) => "byte size",
            Value::TimeDuration(_) => "time duration",
            Value::Json(_) => "json",
        }
    }

    /// Byte sizes and durations serialize as their structured token form so
    /// that [`Value::from_json`] can restore them.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Decimal(d) => decimal_to_json(*d),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::ByteSize(b) => crate::token::Token::ByteSize(b.clone()).to_json(),
            Value::TimeDuration(d) => crate::token::Token::TimeDuration(d.clone()).to_json(),
            Value::Json(v) => v.clone(),
        }
    }

    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string()))
                    .map(Value::Decimal)
                    .unwrap_or_else(|_| Value::Json(json.clone())),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Object(map) => typed_token(map).unwrap_or_else(|| Value::Json(json.clone())),
            JsonValue::Array(_) => Value::Json(json.clone()),
        }
    }
}

/// Recognise `{"type": "BYTE_SIZE" | "TIME_DURATION", "value": "..."}`.
fn typed_token(map: &Map<String, JsonValue>) -> Option<Value> {
    let kind = map.get("type")?.as_str()?;
    let text = map.get("value")?.as_str()?;
    if kind == TokenKind::ByteSize.as_str() {
        ByteSize::parse(text).ok().map(Value::ByteSize)
    } else if kind == TokenKind::TimeDuration.as_str() {
        TimeDuration::parse(text).ok().map(Value::TimeDuration)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::ByteSize(b) => write!(f, "{}", b),
            Value::TimeDuration(d) => write!(f, "{}", d),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<ByteSize> for Value {
    fn from(b: ByteSize) -> Self {
        Value::ByteSize(b)
    }
}

impl From<TimeDuration> for Value {
    fn from(d: TimeDuration) -> Self {
        Value::TimeDuration(d)
    }
}

/// One record. Column names are unique; insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(k, _)| k == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Replace the value of an existing column in place, or append a new one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.columns.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.columns.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.find(name)?;
        Some(self.columns.remove(idx).1)
    }

    /// Rename a column, keeping its position. Returns false if `old` is
    /// absent. An existing column called `new` is replaced.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if self.find(old).is_none() {
            return false;
        }
        if old != new {
            if let Some(clash) = self.find(new) {
                self.columns.remove(clash);
            }
        }
        if let Some(idx) = self.find(old) {
            self.columns[idx].0 = new.to_owned();
        }
        true
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        JsonValue::Object(map)
    }

    pub fn from_json(json: &JsonValue) -> Result<Row, WranglerError> {
        let JsonValue::Object(map) = json else {
            return Err(WranglerError::InvalidRows(format!(
                "expected a JSON object per row, got {}",
                json
            )));
        };
        Ok(Row {
            columns: map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        })
    }
}

/// Decode a JSON array of objects into a row batch.
pub fn rows_from_json(json: &JsonValue) -> Result<Vec<Row>, WranglerError> {
    let JsonValue::Array(items) = json else {
        return Err(WranglerError::InvalidRows(
            "expected a JSON array of rows".to_owned(),
        ));
    };
    items.iter().map(Row::from_json).collect()
}

pub fn rows_to_json(rows: &[Row]) -> JsonValue {
    JsonValue::Array(rows.iter().map(Row::to_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_replaces_in_place() {
        let mut row = Row::new().with("a", 1i64).with("b", 2i64);
        row.set("a", "x");
        let names: Vec<&str> = row.columns().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Text("x".into())));
    }

    #[test]
    fn rename_keeps_position_and_replaces_clash() {
        let mut row = Row::new().with("a", 1i64).with("b", 2i64).with("c", 3i64);
        assert!(row.rename("c", "a"));
        let names: Vec<&str> = row.columns().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(row.get("a"), Some(&Value::Int(3)));
        assert!(!row.rename("missing", "z"));
    }

    #[test]
    fn json_preserves_column_order_and_typed_tokens() {
        let input = json!({
            "z": 1,
            "a": "text",
            "size": {"type": "BYTE_SIZE", "value": "2KB"},
            "ratio": 0.5
        });
        let row = Row::from_json(&input).unwrap();
        let names: Vec<&str> = row.columns().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["z", "a", "size", "ratio"]);
        assert_eq!(
            row.get("size"),
            Some(&Value::ByteSize(ByteSize::parse("2KB").unwrap()))
        );
        assert_eq!(
            row.get("ratio"),
            Some(&Value::Decimal(Decimal::from_str("0.5").unwrap()))
        );

        let back = Row::from_json(&row.to_json()).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn rejects_non_object_rows() {
        assert!(rows_from_json(&json!([1, 2])).is_err());
        assert!(rows_from_json(&json!({"a": 1})).is_err());
    }
}
