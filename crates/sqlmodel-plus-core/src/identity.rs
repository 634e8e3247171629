//! Primary key identities used for lookups by key.

use crate::Result;
use crate::error::Error;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// A primary key as supplied by a caller.
///
/// A single value addresses a one-column key, a sequence addresses a
/// composite key in declaration order, and name/value pairs address key
/// columns by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Single(Value),
    Composite(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Identity {
    /// Order this identity's values to match `primary_key`.
    pub fn resolve(&self, primary_key: &[&str]) -> Result<Vec<Value>> {
        match self {
            Identity::Single(value) => {
                if primary_key.len() != 1 {
                    return Err(Error::config(format!(
                        "a single value was given for a {}-column primary key ({})",
                        primary_key.len(),
                        primary_key.join(", ")
                    )));
                }
                Ok(vec![value.clone()])
            }
            Identity::Composite(values) => {
                if values.len() != primary_key.len() {
                    return Err(Error::config(format!(
                        "expected {} primary key values ({}), got {}",
                        primary_key.len(),
                        primary_key.join(", "),
                        values.len()
                    )));
                }
                Ok(values.clone())
            }
            Identity::Named(pairs) => {
                if let Some((unknown, _)) = pairs
                    .iter()
                    .find(|(name, _)| !primary_key.contains(&name.as_str()))
                {
                    return Err(Error::config(format!(
                        "'{}' is not a primary key column (expected {})",
                        unknown,
                        primary_key.join(", ")
                    )));
                }
                primary_key
                    .iter()
                    .map(|col| {
                        pairs
                            .iter()
                            .find(|(name, _)| name == col)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| {
                                Error::config(format!("missing primary key column '{}'", col))
                            })
                    })
                    .collect()
            }
        }
    }
}

macro_rules! impl_single_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Identity {
                fn from(v: $ty) -> Self {
                    Identity::Single(Value::from(v))
                }
            }
        )*
    };
}

impl_single_identity!(i16, i32, i64, u32, bool, &str, String, &String);

impl From<Value> for Identity {
    fn from(v: Value) -> Self {
        Identity::Single(v)
    }
}

impl From<Vec<Value>> for Identity {
    fn from(values: Vec<Value>) -> Self {
        Identity::Composite(values)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Identity {
    fn from((a, b): (A, B)) -> Self {
        Identity::Composite(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Identity {
    fn from((a, b, c): (A, B, C)) -> Self {
        Identity::Composite(vec![a.into(), b.into(), c.into()])
    }
}

impl<K: Into<String>, V: Into<Value>, S> From<HashMap<K, V, S>> for Identity {
    fn from(map: HashMap<K, V, S>) -> Self {
        Identity::Named(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Identity {
    fn from(map: BTreeMap<K, V>) -> Self {
        Identity::Named(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single() {
        let values = Identity::from(1_i64).resolve(&["id"]).unwrap();
        assert_eq!(values, vec![Value::BigInt(1)]);
        assert!(Identity::from(1_i32).resolve(&["a", "b"]).is_err());
    }

    #[test]
    fn test_composite_arity() {
        let id = Identity::from((1_i32, "x"));
        assert_eq!(
            id.resolve(&["a", "b"]).unwrap(),
            vec![Value::Int(1), Value::Text("x".into())]
        );
        assert!(id.resolve(&["a"]).is_err());
    }

    #[test]
    fn test_named_reorders_to_key_order() {
        let mut map = BTreeMap::new();
        map.insert("b", 2_i32);
        map.insert("a", 1_i32);
        let values = Identity::from(map).resolve(&["a", "b"]).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_named_rejects_unknown_and_missing() {
        let mut map = HashMap::new();
        map.insert("nope", 1_i32);
        let err = Identity::from(map).resolve(&["id"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let mut map = HashMap::new();
        map.insert("a", 1_i32);
        assert!(Identity::from(map).resolve(&["a", "b"]).is_err());
    }
}
