//! Database connection trait, SQL dialects and bind parameters.

use crate::Result;
use crate::row::Row;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// SQL dialect spoken by a connection.
///
/// Statement builders consult it for placeholder and identifier syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// SQLite dialect (uses ?1, ?2 placeholders)
    #[default]
    Sqlite,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{index}"),
        }
    }

    /// Quote an identifier for this dialect, doubling embedded quotes.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

/// Bind parameters for one statement.
///
/// Positional values bind to `?N` placeholders in order; named values bind
/// to `:name` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named parameter, replacing an earlier one of the same name.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// In-place form of [`Params::bind`].
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.named.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.named.push((name, value));
        }
    }

    /// Append a positional parameter.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.positional.push(value.into());
    }

    /// Merge another parameter set into this one.
    ///
    /// Positional values are appended; named values override by name.
    pub fn extend(&mut self, other: Params) {
        self.positional.extend(other.positional);
        for (name, value) in other.named {
            self.set(name, value);
        }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &[(String, Value)] {
        &self.named
    }

    /// Look up a named parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::new()
    }
}

impl From<Vec<Value>> for Params {
    fn from(positional: Vec<Value>) -> Self {
        Params {
            positional,
            named: Vec::new(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Params {
    fn from(pairs: Vec<(K, V)>) -> Self {
        let mut params = Params::new();
        for (k, v) in pairs {
            params.set(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: Into<Value>, S> From<HashMap<K, V, S>> for Params {
    fn from(map: HashMap<K, V, S>) -> Self {
        let mut params = Params::new();
        for (k, v) in map {
            params.set(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Params {
    fn from(map: BTreeMap<K, V>) -> Self {
        let mut params = Params::new();
        for (k, v) in map {
            params.set(k, v);
        }
        params
    }
}

/// Build a named [`Params`] set.
///
/// ```ignore
/// let p = params! { "id" => 1, "name" => "Deadpond" };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Params::new()$(.bind($name, $value))+
    };
}

/// A synchronous database connection.
///
/// Implementations serialize access internally, so a connection can be shared
/// behind an `Arc` across threads. Transactions are connection-wide.
pub trait Connection: Send + Sync {
    /// The dialect this connection speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(&self, sql: &str, params: &Params) -> Result<u64>;

    /// Execute an INSERT and return the last inserted row id.
    fn insert(&self, sql: &str, params: &Params) -> Result<i64>;

    /// Execute one or more statements without parameters.
    fn execute_raw(&self, sql: &str) -> Result<()>;

    /// Begin a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Sqlite.placeholder(2), "?2");
        assert_eq!(Dialect::default().placeholder(11), "?11");
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(Dialect::Sqlite.quote_identifier("hero"), "\"hero\"");
        assert_eq!(Dialect::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_params_macro_and_override() {
        let p = crate::params! { "id" => 1_i32, "name" => "a" };
        assert_eq!(p.get("id"), Some(&Value::Int(1)));
        let p = p.bind("id", 2_i64);
        assert_eq!(p.get("id"), Some(&Value::BigInt(2)));
        assert_eq!(p.named().len(), 2);
        assert!(crate::params! {}.is_empty());
    }

    #[test]
    fn test_params_from_collections() {
        let mut map = HashMap::new();
        map.insert("id", 1_i64);
        let p = Params::from(map);
        assert_eq!(p.get("id"), Some(&Value::BigInt(1)));

        let p = Params::from(vec![Value::Int(1), Value::Text("x".into())]);
        assert_eq!(p.positional().len(), 2);
        assert!(p.named().is_empty());

        let mut merged = Params::from(vec![("a", 1_i32)]);
        merged.extend(Params::from(vec![("a", 2_i32), ("b", 3_i32)]));
        assert_eq!(merged.get("a"), Some(&Value::Int(2)));
        assert_eq!(merged.get("b"), Some(&Value::Int(3)));
    }
}
