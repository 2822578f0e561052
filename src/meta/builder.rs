//! Entity descriptor builder.
//!
//! Every entity type describes itself once through [`EntityBuilder`]; the
//! registry turns the finished builder into an immutable [`EntityMeta`].

use super::column::{ColumnField, Getter, JoinKind, JoinPair, RelatedField, RelationSpec, Setter};
use super::{Entity, EntityMeta};
use crate::error::MetaError;
use crate::relation::{LiftedTarget, TypedJoin, TypedTarget};
use crate::value::{CoercionError, FieldValue};
use sea_query::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Collects the columns, related fields and join shape of an entity type
///
/// # Example
///
/// ```rust
/// use relmap::{Entity, EntityBuilder};
///
/// #[derive(Default, Clone)]
/// struct Audit {
///     created_by: String,
///     deleted: bool,
/// }
///
/// impl Entity for Audit {
///     fn describe(b: &mut EntityBuilder<Self>) {
///         b.column("created_by", "created_by", |a| &a.created_by, |a| &mut a.created_by);
///         b.column("deleted", "deleted", |a| &a.deleted, |a| &mut a.deleted)
///             .soft_delete("0", "1");
///     }
/// }
///
/// #[derive(Default, Clone)]
/// struct Order {
///     audit: Audit,
///     id: i64,
///     user_id: i64,
/// }
///
/// impl Entity for Order {
///     fn describe(b: &mut EntityBuilder<Self>) {
///         b.extends(|o| &o.audit, |o| &mut o.audit);
///         b.table("t_order");
///         b.column("id", "id", |o| &o.id, |o| &mut o.id).key().auto_increment();
///         b.column("user_id", "user_id", |o| &o.user_id, |o| &mut o.user_id);
///     }
/// }
///
/// let columns = relmap::meta::get_columns::<Order>().unwrap();
/// let names: Vec<&str> = columns.iter().map(|c| c.column()).collect();
/// assert_eq!(names, ["created_by", "deleted", "id", "user_id"]);
/// ```
pub struct EntityBuilder<T> {
    table: Option<String>,
    columns: Vec<ColumnField<T>>,
    related: Vec<RelatedField<T>>,
    join: Option<JoinPair<T>>,
}

/// Handle to the column just declared, for setting its flags
pub struct ColumnDecl<'a, T> {
    column: &'a mut ColumnField<T>,
}

impl<T> ColumnDecl<'_, T> {
    /// Mark the column as (part of) the entity key
    pub fn key(self) -> Self {
        self.column.key = true;
        self
    }

    pub fn auto_increment(self) -> Self {
        self.column.auto_increment = true;
        self
    }

    /// Mark the column as the soft-delete flag with its two literal values
    pub fn soft_delete(self, not_deleted: &str, deleted: &str) -> Self {
        self.column.soft_delete = Some((not_deleted.to_string(), deleted.to_string()));
        self
    }
}

/// Handle to the related field just declared
pub struct RelatedDecl<'a, T> {
    related: &'a mut RelatedField<T>,
}

impl<T> RelatedDecl<'_, T> {
    /// Extra predicate ANDed with the `remote IN (..)` filter
    pub fn extra_where(self, predicate: &str) -> Self {
        self.related.spec.extra_where = Some(predicate.to_string());
        self
    }

    /// Fetch the related entities through the named data service
    pub fn data_service(self, name: &str) -> Self {
        self.related.spec.data_service = Some(name.to_string());
        self
    }
}

impl<T: Entity> EntityBuilder<T> {
    fn new() -> Self {
        Self {
            table: None,
            columns: Vec::new(),
            related: Vec::new(),
            join: None,
        }
    }

    /// Run `T::describe` on a fresh builder
    pub(crate) fn described() -> Self {
        let mut builder = Self::new();
        T::describe(&mut builder);
        builder
    }

    /// Set the table name
    pub fn table(&mut self, table: &str) -> &mut Self {
        self.table = Some(table.to_string());
        self
    }

    /// Declare a column backed by a struct field
    ///
    /// # Arguments
    ///
    /// * `field` - The Rust field name, used in log lines
    /// * `column` - The database column name
    /// * `get` / `get_mut` - Accessors for the field
    pub fn column<V, G, M>(&mut self, field: &str, column: &str, get: G, get_mut: M) -> ColumnDecl<'_, T>
    where
        V: FieldValue + Clone + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let getter: Getter<T> = Arc::new(move |entity: &T| get(entity).clone().into_value());
        let setter: Setter<T> = Arc::new(move |entity: &mut T, value: Value| -> Result<(), CoercionError> {
            *get_mut(entity) = V::from_value(value)?;
            Ok(())
        });
        self.columns.push(ColumnField {
            field: field.to_string(),
            column: column.to_string(),
            key: false,
            auto_increment: false,
            soft_delete: None,
            field_type: V::field_type(),
            getter,
            setter,
        });
        let idx = self.columns.len() - 1;
        ColumnDecl {
            column: &mut self.columns[idx],
        }
    }

    /// Merge the columns and related fields of a parent entity embedded in `T`
    ///
    /// The parent's declarations are placed before anything `T` declares
    /// afterwards, and the parent's table is used when `T` declares none.
    /// Call it first in `describe` to keep parent columns in front.
    pub fn extends<P, G, M>(&mut self, get: G, get_mut: M) -> &mut Self
    where
        P: Entity,
        G: Fn(&T) -> &P + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        let parent = EntityBuilder::<P>::described();
        let get = Arc::new(get);
        let get_mut = Arc::new(get_mut);

        if self.table.is_none() {
            self.table = parent.table.clone();
        }

        for column in parent.columns {
            let parent_get = column.getter;
            let parent_set = column.setter;
            let outer_get = Arc::clone(&get);
            let outer_mut = Arc::clone(&get_mut);
            self.columns.push(ColumnField {
                field: column.field,
                column: column.column,
                key: column.key,
                auto_increment: column.auto_increment,
                soft_delete: column.soft_delete,
                field_type: column.field_type,
                getter: Arc::new(move |entity: &T| parent_get(outer_get(entity))),
                setter: Arc::new(move |entity: &mut T, value: Value| parent_set(outer_mut(entity), value)),
            });
        }

        for related in parent.related {
            let outer_mut = Arc::clone(&get_mut);
            self.related.push(RelatedField {
                spec: related.spec,
                target: Arc::new(LiftedTarget::new(related.target, move |entity: &mut T| outer_mut(entity))),
            });
        }
        self
    }

    /// Declare a list-valued related field filled with every `R` whose
    /// `remote` column equals this entity's `local` column
    pub fn related_many<R, S>(&mut self, field: &str, local: &str, remote: &str, slot: S) -> RelatedDecl<'_, T>
    where
        R: Entity + Clone,
        S: Fn(&mut T) -> &mut Vec<R> + Send + Sync + 'static,
    {
        let target = Arc::new(TypedTarget::<T, R>::many(slot));
        self.push_related(field, local, remote, target)
    }

    /// Declare a single-valued related field filled with the first matching `R`
    pub fn related_one<R, S>(&mut self, field: &str, local: &str, remote: &str, slot: S) -> RelatedDecl<'_, T>
    where
        R: Entity + Clone,
        S: Fn(&mut T) -> &mut Option<R> + Send + Sync + 'static,
    {
        let target = Arc::new(TypedTarget::<T, R>::one(slot));
        self.push_related(field, local, remote, target)
    }

    fn push_related(
        &mut self,
        field: &str,
        local: &str,
        remote: &str,
        target: Arc<dyn crate::relation::RelationTarget<T>>,
    ) -> RelatedDecl<'_, T> {
        self.related.push(RelatedField {
            spec: RelationSpec {
                field: field.to_string(),
                local_column: local.to_string(),
                remote_column: remote.to_string(),
                extra_where: None,
                data_service: None,
            },
            target,
        });
        let idx = self.related.len() - 1;
        RelatedDecl {
            related: &mut self.related[idx],
        }
    }

    /// Make `T` a join pair of `L` (alias `t1`) and `R` (alias `t2`)
    ///
    /// `on` is written against the aliases, e.g. ``t1.`id` = t2.`user_id` ``.
    pub fn join<L, R, LS, RS>(&mut self, kind: JoinKind, on: &str, left: LS, right: RS) -> &mut Self
    where
        L: Entity,
        R: Entity,
        LS: Fn(&mut T) -> &mut Option<L> + Send + Sync + 'static,
        RS: Fn(&mut T) -> &mut Option<R> + Send + Sync + 'static,
    {
        self.join = Some(JoinPair {
            kind,
            on: on.to_string(),
            shape: Arc::new(TypedJoin::<T, L, R>::new(left, right)),
        });
        self
    }

    /// Validate and freeze the descriptor
    pub(crate) fn build(self) -> Result<EntityMeta<T>, MetaError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.column.as_str()) {
                return Err(MetaError::DuplicateColumn {
                    entity: std::any::type_name::<T>().to_string(),
                    column: column.column.clone(),
                });
            }
        }
        Ok(EntityMeta {
            table: self.table,
            columns: self.columns.into(),
            related: self.related.into(),
            join: self.join,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldType;

    #[derive(Default)]
    struct Base {
        id: i64,
        created: String,
    }

    impl Entity for Base {
        fn describe(b: &mut EntityBuilder<Self>) {
            b.table("t_base");
            b.column("id", "id", |e| &e.id, |e| &mut e.id).key();
            b.column("created", "created", |e| &e.created, |e| &mut e.created);
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        name: Option<String>,
    }

    impl Entity for Derived {
        fn describe(b: &mut EntityBuilder<Self>) {
            b.extends(|e| &e.base, |e| &mut e.base);
            b.column("name", "name", |e| &e.name, |e| &mut e.name);
        }
    }

    #[derive(Default)]
    struct Clash {
        base: Base,
        other_id: i64,
    }

    impl Entity for Clash {
        fn describe(b: &mut EntityBuilder<Self>) {
            b.extends(|e| &e.base, |e| &mut e.base);
            b.column("other_id", "id", |e| &e.other_id, |e| &mut e.other_id);
        }
    }

    #[test]
    fn test_extends_places_parent_first_and_inherits_table() {
        let meta = EntityBuilder::<Derived>::described().build().unwrap();
        let names: Vec<&str> = meta.columns.iter().map(|c| c.column()).collect();
        assert_eq!(names, ["id", "created", "name"]);
        assert_eq!(meta.table.as_deref(), Some("t_base"));
        assert!(meta.columns[0].is_key());
        assert_eq!(meta.columns[2].field_type(), FieldType::String);
    }

    #[test]
    fn test_lifted_accessors_reach_embedded_parent() {
        let meta = EntityBuilder::<Derived>::described().build().unwrap();
        let mut entity = Derived::default();
        assert!(meta.columns[0].set_value(&mut entity, sea_query::Value::from(9i32)));
        assert_eq!(entity.base.id, 9);
        assert_eq!(meta.columns[0].get_value(&entity), sea_query::Value::BigInt(Some(9)));
    }

    #[test]
    fn test_duplicate_column_is_rejected() {
        let err = EntityBuilder::<Clash>::described().build().err().unwrap();
        assert!(matches!(err, MetaError::DuplicateColumn { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_failed_coercion_keeps_value() {
        let meta = EntityBuilder::<Base>::described().build().unwrap();
        let mut entity = Base {
            id: 3,
            ..Default::default()
        };
        assert!(!meta.columns[0].set_value(&mut entity, sea_query::Value::from("abc")));
        assert_eq!(entity.id, 3);
    }
}
