//! Model trait for ORM-style struct mapping.
//!
//! The `Model` trait defines the contract for structs that can be
//! mapped to database tables. It is typically derived using the
//! `#[derive(Model)]` macro from `sqlmodel-plus-macros`.

use crate::Result;
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use sqlmodel_plus::prelude::*;
///
/// #[derive(Model)]
/// #[sqlmodel(table = "hero")]
/// struct Hero {
///     #[sqlmodel(primary_key)]
///     id: Option<i64>,
///     name: String,
///     age: Option<i32>,
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field(s), in `PRIMARY_KEY` order.
    fn primary_key_value(&self) -> Vec<Value>;

    /// Check if this is a new record (primary key is None/default).
    fn is_new(&self) -> bool;

    /// Store a database-generated integer key after an INSERT.
    ///
    /// Models without a single integer primary key keep the default no-op.
    fn set_generated_id(&mut self, id: i64) {
        let _ = id;
    }

    /// Whether every primary key component carries a non-NULL value.
    fn has_primary_key(&self) -> bool {
        let pk = self.primary_key_value();
        !pk.is_empty() && pk.iter().all(|v| !v.is_null())
    }

    /// Look up field metadata by column name.
    fn field(column: &str) -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.column_name == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    struct Tag {
        id: Option<i64>,
        label: String,
    }

    impl Model for Tag {
        const TABLE_NAME: &'static str = "tag";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt)
                    .primary_key(true)
                    .nullable(true),
                FieldInfo::new("label", "label", SqlType::Text),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", Value::from(self.id)),
                ("label", Value::from(&self.label)),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                label: row.get_named("label")?,
            })
        }

        fn primary_key_value(&self) -> Vec<Value> {
            vec![Value::from(self.id)]
        }

        fn is_new(&self) -> bool {
            self.id.is_none()
        }

        fn set_generated_id(&mut self, id: i64) {
            self.id = Some(id);
        }
    }

    #[test]
    fn test_has_primary_key() {
        let mut tag = Tag {
            id: None,
            label: "x".into(),
        };
        assert!(!tag.has_primary_key());
        tag.set_generated_id(7);
        assert!(tag.has_primary_key());
        assert_eq!(tag.primary_key_value(), vec![Value::BigInt(7)]);
    }

    #[test]
    fn test_field_lookup_and_from_row() {
        assert!(Tag::field("label").is_some());
        assert!(Tag::field("missing").is_none());

        let row = Row::new(
            vec!["id".into(), "label".into()],
            vec![Value::BigInt(3), Value::Text("rust".into())],
        );
        let tag = Tag::from_row(&row).unwrap();
        assert_eq!(tag.id, Some(3));
        assert_eq!(tag.label, "rust");
        assert_eq!(tag.to_row().len(), 2);
    }
}
