//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Rows provide both index-based and name-based access to column values.
/// Rows from one result set share their column metadata.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.index_of(name).is_some()
    }

    /// Get a typed value by column index.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            type_error(
                std::any::type_name::<T>(),
                format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
            )
        })?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Consume the row, returning its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

fn type_error(expected: &'static str, actual: impl Into<String>) -> Error {
    Error::Type(TypeError {
        expected,
        actual: actual.into(),
        column: None,
    })
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| type_error("bool", value.type_name()))
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let v = value
                        .as_i64()
                        .ok_or_else(|| type_error(stringify!($ty), value.type_name()))?;
                    <$ty>::try_from(v).map_err(|_| {
                        type_error(stringify!($ty), format!("value {} out of range", v))
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, u8, u16, u32, u64);

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| type_error("i64", value.type_name()))
    }
}

#[allow(clippy::cast_possible_truncation)]
impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            other => other
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| type_error("f32", other.type_name())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| type_error("f64", value.type_name()))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Json(j) => Ok(j.to_string()),
            _ => Err(type_error("String", value.type_name())),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| type_error("Vec<u8>", value.type_name()))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| type_error("valid JSON", format!("invalid JSON: {}", e))),
            _ => Err(type_error("JSON", value.type_name())),
        }
    }
}

/// Decode a whole row into a typed value.
///
/// Implemented for `Row` itself and for tuples of up to six `FromValue`
/// columns, matched by position.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

macro_rules! impl_from_row_tuple {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                if row.len() < $len {
                    return Err(type_error(
                        std::any::type_name::<Self>(),
                        format!("row with {} columns", row.len()),
                    ));
                }
                Ok(($(row.get_as::<$name>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1 => A: 0);
impl_from_row_tuple!(2 => A: 0, B: 1);
impl_from_row_tuple!(3 => A: 0, B: 1, C: 2);
impl_from_row_tuple!(4 => A: 0, B: 1, C: 2, D: 3);
impl_from_row_tuple!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
impl_from_row_tuple!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

#[cfg(test)]
mod tests {
    use super::*;

    fn hero_row() -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
            vec![
                Value::BigInt(1),
                Value::Text("Alice".to_string()),
                Value::Null,
            ],
        )
    }

    #[test]
    fn test_row_basic_access() {
        let row = hero_row();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
        assert_eq!(
            row.get_by_name("name"),
            Some(&Value::Text("Alice".to_string()))
        );
        assert!(row.get_by_name("missing").is_none());
        assert!(row.contains_column("age"));
    }

    #[test]
    fn test_get_named_narrows_integers() {
        let row = hero_row();
        let id: i32 = row.get_named("id").unwrap();
        assert_eq!(id, 1);
        let age: Option<i32> = row.get_named("age").unwrap();
        assert_eq!(age, None);
    }

    #[test]
    fn test_get_named_reports_column() {
        let row = hero_row();
        let err = row.get_named::<i64>("name").unwrap_err();
        match err {
            Error::Type(te) => {
                assert_eq!(te.expected, "i64");
                assert_eq!(te.column.as_deref(), Some("name"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(row.get_named::<String>("nope").is_err());
    }

    #[test]
    fn test_out_of_range_integer() {
        let err = i8::from_value(&Value::BigInt(1000)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_json_from_text() {
        let v = serde_json::Value::from_value(&Value::Text("{\"a\":1}".into())).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_from_row_tuples() {
        let row = hero_row();
        let (id,): (i64,) = FromRow::from_row(&row).unwrap();
        assert_eq!(id, 1);
        let (id, name, age): (i64, String, Option<i64>) = FromRow::from_row(&row).unwrap();
        assert_eq!((id, name.as_str(), age), (1, "Alice", None));
        let too_wide: Result<(i64, String, Option<i64>, i64)> = FromRow::from_row(&row);
        assert!(too_wide.is_err());
    }
}
