use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// A single value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Converts a JSON value into a cell.
    ///
    /// Arrays and objects are kept as their compact JSON text.
    pub fn from_json(value: serde_json::Value) -> Cell {
        match value {
            serde_json::Value::Null => Cell::Null,
            serde_json::Value::Bool(value) => Cell::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::I64(value),
                None => number
                    .as_f64()
                    .map(Cell::F64)
                    .unwrap_or_else(|| Cell::String(number.to_string())),
            },
            serde_json::Value::String(value) => Cell::String(value),
            value @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Cell::String(value.to_string())
            }
        }
    }
}

/// Renders the cell as it appears in a delimited page file. Null is empty.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::String(value) => f.write_str(value),
            Cell::Timestamp(value) => {
                f.write_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}

/// An ordered record fetched from a source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    pub values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Converts a JSON record into a row.
    ///
    /// Object fields become cells in key order; any other value becomes a
    /// single-cell row.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                Self::new(map.into_iter().map(|(_, value)| Cell::from_json(value)).collect())
            }
            other => Self::new(vec![Cell::from_json(other)]),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_rows_in_key_order() {
        let row = TableRow::from_json(json!({"b": 2, "a": "x", "c": null, "d": [1, 2]}));

        assert_eq!(
            row.values,
            vec![
                Cell::String("x".to_owned()),
                Cell::I64(2),
                Cell::Null,
                Cell::String("[1,2]".to_owned()),
            ]
        );
    }

    #[test]
    fn scalars_become_single_cell_rows() {
        assert_eq!(TableRow::from_json(json!(1.5)).values, vec![Cell::F64(1.5)]);
    }

    #[test]
    fn null_renders_as_empty_field() {
        assert_eq!(Cell::Null.to_string(), "");
        assert_eq!(Cell::Bool(true).to_string(), "true");
    }
}
