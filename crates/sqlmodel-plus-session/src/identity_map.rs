//! Identity map entries tracked by a [`Session`](crate::Session).
//!
//! Each tracked object is stored type-erased together with the row it maps
//! to, so one session can hold objects of any number of model types. Keys
//! combine the model type with its normalized primary key values; integer
//! widths are folded together so `Int(1)` and `BigInt(1)` address the same
//! row.

use sqlmodel_plus_core::{FieldInfo, Model, Value};
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Unique key for an object in the identity map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    type_id: TypeId,
    kind: KeyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyKind {
    /// Normalized primary key values.
    Persistent(Arc<[KeyPart]>),
    /// A new object whose key the database has not generated yet.
    Transient(u64),
}

/// One primary key component, comparable and hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern of the value widened to f64.
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Json(String),
}

impl From<&Value> for KeyPart {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                KeyPart::Int(v.as_i64().unwrap_or_default())
            }
            Value::Float(f) => KeyPart::Float(f64::from(*f).to_bits()),
            Value::Double(f) => KeyPart::Float(f.to_bits()),
            Value::Text(s) => KeyPart::Text(s.clone()),
            Value::Bytes(b) => KeyPart::Bytes(b.clone()),
            Value::Json(j) => KeyPart::Json(j.to_string()),
        }
    }
}

fn key_parts(pk: &[Value]) -> Arc<[KeyPart]> {
    pk.iter().map(KeyPart::from).collect()
}

impl ObjectKey {
    /// Key for a model instance, which must carry a complete primary key.
    pub fn from_model<M: Model>(obj: &M) -> Self {
        Self::from_pk::<M>(&obj.primary_key_value())
    }

    /// Key for a model type and primary key values.
    pub fn from_pk<M: Model>(pk: &[Value]) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            kind: KeyKind::Persistent(key_parts(pk)),
        }
    }

    pub(crate) fn transient<M: Model>(seq: u64) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            kind: KeyKind::Transient(seq),
        }
    }

    pub(crate) fn with_pk(&self, pk: &[Value]) -> Self {
        Self {
            type_id: self.type_id,
            kind: KeyKind::Persistent(key_parts(pk)),
        }
    }

    /// Whether this key names an object still waiting for a generated key.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, KeyKind::Transient(_))
    }
}

/// State of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Scheduled for INSERT.
    New,
    /// Loaded from or written to the database.
    Persistent,
    /// Scheduled for DELETE.
    Deleted,
}

/// Monomorphized entry points for a type-erased model.
#[derive(Clone, Copy)]
struct ModelOps {
    set_generated_id: fn(&mut (dyn Any + Send + Sync), i64),
    to_row: fn(&(dyn Any + Send + Sync)) -> Vec<(&'static str, Value)>,
}

impl ModelOps {
    fn of<M: Model>() -> Self {
        Self {
            set_generated_id: |obj, id| {
                if let Some(model) = obj.downcast_mut::<M>() {
                    model.set_generated_id(id);
                }
            },
            to_row: |obj| obj.downcast_ref::<M>().map(M::to_row).unwrap_or_default(),
        }
    }
}

/// A tracked object in the session.
pub(crate) struct TrackedObject {
    object: Box<dyn Any + Send + Sync>,
    pub(crate) state: ObjectState,
    pub(crate) table_name: &'static str,
    pub(crate) fields: &'static [FieldInfo],
    pub(crate) pk_columns: &'static [&'static str],
    /// Current column values.
    pub(crate) values: Vec<(&'static str, Value)>,
    /// Column values as last read from or written to the database.
    original: Option<Vec<(&'static str, Value)>>,
    ops: ModelOps,
}

impl TrackedObject {
    pub(crate) fn new<M: Model + Clone>(obj: &M, state: ObjectState) -> Self {
        let values = obj.to_row();
        let original = (state == ObjectState::Persistent).then(|| values.clone());
        Self {
            object: Box::new(obj.clone()),
            state,
            table_name: M::TABLE_NAME,
            fields: M::fields(),
            pk_columns: M::PRIMARY_KEY,
            values,
            original,
            ops: ModelOps::of::<M>(),
        }
    }

    /// Replace the tracked copy with a newer version of the same object.
    pub(crate) fn replace<M: Model + Clone>(&mut self, obj: &M) {
        self.values = obj.to_row();
        self.object = Box::new(obj.clone());
    }

    pub(crate) fn get<M: Model + Clone>(&self) -> Option<M> {
        self.object.downcast_ref::<M>().cloned()
    }

    pub(crate) fn pk_values(&self) -> Vec<Value> {
        self.pk_columns
            .iter()
            .map(|col| {
                self.values
                    .iter()
                    .find(|(name, _)| name == col)
                    .map_or(Value::Null, |(_, v)| v.clone())
            })
            .collect()
    }

    /// Whether the current values differ from what the database holds.
    pub(crate) fn is_dirty(&self) -> bool {
        self.original
            .as_ref()
            .is_none_or(|original| *original != self.values)
    }

    pub(crate) fn apply_generated_id(&mut self, id: i64) {
        (self.ops.set_generated_id)(self.object.as_mut(), id);
        self.values = (self.ops.to_row)(self.object.as_ref());
    }

    pub(crate) fn mark_persistent(&mut self) {
        self.state = ObjectState::Persistent;
        self.original = Some(self.values.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmodel_plus_core::{Result, Row, SqlType};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: Option<i64>,
        label: String,
    }

    impl Model for Item {
        const TABLE_NAME: &'static str = "item";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt)
                    .primary_key(true)
                    .auto_increment(true)
                    .nullable(true),
                FieldInfo::new("label", "label", SqlType::Text),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![("id", Value::from(self.id)), ("label", Value::from(&self.label))]
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
    fn test_integer_widths_share_a_key() {
        assert_eq!(
            ObjectKey::from_pk::<Item>(&[Value::Int(1)]),
            ObjectKey::from_pk::<Item>(&[Value::BigInt(1)])
        );
        assert_ne!(
            ObjectKey::from_pk::<Item>(&[Value::BigInt(1)]),
            ObjectKey::from_pk::<Item>(&[Value::Text("1".into())])
        );
        assert_eq!(
            ObjectKey::from_pk::<Item>(&[Value::SmallInt(4)]),
            ObjectKey::from_model(&Item {
                id: Some(4),
                label: String::new(),
            })
        );
    }

    #[test]
    fn test_keys_compare_values_not_digests() {
        let mut map = std::collections::HashMap::new();
        for id in 0..10_000_i64 {
            map.insert(ObjectKey::from_pk::<Item>(&[Value::BigInt(id)]), id);
        }
        assert_eq!(map.len(), 10_000);
        assert_eq!(
            map.get(&ObjectKey::from_pk::<Item>(&[Value::Int(4242)])),
            Some(&4242)
        );
        assert_ne!(
            ObjectKey::from_pk::<Item>(&[Value::Text("a".into()), Value::Text("bc".into())]),
            ObjectKey::from_pk::<Item>(&[Value::Text("ab".into()), Value::Text("c".into())])
        );
    }

    #[test]
    fn test_transient_keys_are_distinct() {
        let a = ObjectKey::transient::<Item>(1);
        let b = ObjectKey::transient::<Item>(2);
        assert_ne!(a, b);
        assert!(a.is_transient());
        assert!(!a.with_pk(&[Value::BigInt(1)]).is_transient());
    }

    #[test]
    fn test_tracked_object_dirty_and_generated_id() {
        let item = Item {
            id: None,
            label: "a".into(),
        };
        let mut tracked = TrackedObject::new(&item, ObjectState::New);
        assert!(tracked.is_dirty());

        tracked.apply_generated_id(9);
        assert_eq!(tracked.pk_values(), vec![Value::BigInt(9)]);
        tracked.mark_persistent();
        assert!(!tracked.is_dirty());

        let mut changed = tracked.get::<Item>().unwrap();
        assert_eq!(changed.id, Some(9));
        changed.label = "b".into();
        tracked.replace(&changed);
        assert!(tracked.is_dirty());
    }
}
