//! Column, related-field and join-pair descriptors.

use crate::relation::{JoinShape, RelationTarget};
use crate::value::{cast, CoercionError, FieldType};
use sea_query::Value;
use std::fmt;
use std::sync::Arc;

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<(), CoercionError> + Send + Sync>;

/// A struct field mapped to a database column
///
/// Carries the column metadata plus a precomputed accessor pair, so reading
/// and writing the field never goes through any runtime lookup.
pub struct ColumnField<T> {
    pub(crate) field: String,
    pub(crate) column: String,
    pub(crate) key: bool,
    pub(crate) auto_increment: bool,
    pub(crate) soft_delete: Option<(String, String)>,
    pub(crate) field_type: FieldType,
    pub(crate) getter: Getter<T>,
    pub(crate) setter: Setter<T>,
}

impl<T> Clone for ColumnField<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            column: self.column.clone(),
            key: self.key,
            auto_increment: self.auto_increment,
            soft_delete: self.soft_delete.clone(),
            field_type: self.field_type,
            getter: Arc::clone(&self.getter),
            setter: Arc::clone(&self.setter),
        }
    }
}

impl<T> fmt::Debug for ColumnField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnField")
            .field("field", &self.field)
            .field("column", &self.column)
            .field("key", &self.key)
            .field("auto_increment", &self.auto_increment)
            .field("soft_delete", &self.soft_delete)
            .field("field_type", &self.field_type)
            .finish()
    }
}

impl<T> ColumnField<T> {
    /// Rust field name
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Database column name
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// The `(not_deleted, deleted)` marker, when both values are non-blank
    pub fn soft_delete(&self) -> Option<(&str, &str)> {
        match &self.soft_delete {
            Some((active, deleted)) if !active.trim().is_empty() && !deleted.trim().is_empty() => {
                Some((active.as_str(), deleted.as_str()))
            }
            _ => None,
        }
    }

    /// The `Value` variant this field stores
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Read the field from an entity
    pub fn get_value(&self, entity: &T) -> Value {
        (self.getter)(entity)
    }

    /// Write a value into the field, coercing it to the field's type first
    ///
    /// Coercion failures are logged and reported as `false`; the field keeps
    /// its previous value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relmap::{meta, Entity, EntityBuilder};
    /// use sea_query::Value;
    ///
    /// #[derive(Default)]
    /// struct User {
    ///     id: i64,
    /// }
    ///
    /// impl Entity for User {
    ///     fn describe(b: &mut EntityBuilder<Self>) {
    ///         b.table("t_user");
    ///         b.column("id", "id", |u| &u.id, |u| &mut u.id).key();
    ///     }
    /// }
    ///
    /// let key = meta::get_one_key_column::<User>().unwrap();
    /// let mut user = User::default();
    /// assert!(key.set_value(&mut user, Value::from("42")));
    /// assert_eq!(user.id, 42);
    /// ```
    pub fn set_value(&self, entity: &mut T, value: Value) -> bool {
        let result = cast(value, self.field_type).and_then(|value| (self.setter)(entity, value));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to set field {} (column {}): {}", self.field, self.column, e);
                false
            }
        }
    }
}

/// The column-level parts of a related field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub field: String,
    pub local_column: String,
    pub remote_column: String,
    pub extra_where: Option<String>,
    pub data_service: Option<String>,
}

/// A field filled from another entity type by `local = remote` matching
pub struct RelatedField<T> {
    pub(crate) spec: RelationSpec,
    pub(crate) target: Arc<dyn RelationTarget<T>>,
}

impl<T> Clone for RelatedField<T> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            target: Arc::clone(&self.target),
        }
    }
}

impl<T> fmt::Debug for RelatedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedField")
            .field("spec", &self.spec)
            .field("remote_entity", &self.target.remote_entity())
            .field("is_list", &self.target.is_list())
            .finish()
    }
}

impl<T> RelatedField<T> {
    pub fn spec(&self) -> &RelationSpec {
        &self.spec
    }

    pub fn field(&self) -> &str {
        &self.spec.field
    }

    pub fn local_column(&self) -> &str {
        &self.spec.local_column
    }

    pub fn remote_column(&self) -> &str {
        &self.spec.remote_column
    }

    pub fn extra_where(&self) -> Option<&str> {
        self.spec.extra_where.as_deref()
    }

    pub fn data_service(&self) -> Option<&str> {
        self.spec.data_service.as_deref()
    }

    /// Whether the field holds a list of remote entities
    pub fn is_list(&self) -> bool {
        self.target.is_list()
    }

    /// Type name of the remote entity
    pub fn remote_entity(&self) -> &'static str {
        self.target.remote_entity()
    }
}

/// How the two sides of a join pair are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// SQL keyword for this join
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// A left/right entity pair fetched together through one join
pub struct JoinPair<T> {
    pub(crate) kind: JoinKind,
    pub(crate) on: String,
    pub(crate) shape: Arc<dyn JoinShape<T>>,
}

impl<T> Clone for JoinPair<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            on: self.on.clone(),
            shape: Arc::clone(&self.shape),
        }
    }
}

impl<T> fmt::Debug for JoinPair<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPair")
            .field("kind", &self.kind)
            .field("on", &self.on)
            .finish()
    }
}

impl<T> JoinPair<T> {
    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    /// The ON condition, written against the `t1` / `t2` aliases
    pub fn on(&self) -> &str {
        &self.on
    }
}
