//! Entity metadata: descriptors, parent merging and the process-wide cache.
//!
//! An entity type implements [`Entity`] and describes its table, columns and
//! related fields through an [`EntityBuilder`]. The first lookup builds the
//! descriptor; every later lookup returns the same cached [`EntityMeta`].
//!
//! # Examples
//!
//! ```rust
//! use relmap::{meta, Entity, EntityBuilder};
//! use std::sync::Arc;
//!
//! #[derive(Default, Clone)]
//! struct Tag {
//!     id: i32,
//!     label: String,
//! }
//!
//! impl Entity for Tag {
//!     fn describe(b: &mut EntityBuilder<Self>) {
//!         b.table("t_tag");
//!         b.column("id", "id", |t| &t.id, |t| &mut t.id).key();
//!         b.column("label", "label", |t| &t.label, |t| &mut t.label);
//!     }
//! }
//!
//! let first = meta::get_columns::<Tag>().unwrap();
//! let second = meta::get_columns::<Tag>().unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(meta::get_one_key_column::<Tag>().unwrap().column(), "id");
//! ```

pub mod builder;
pub mod column;
pub mod registry;

pub use builder::{ColumnDecl, EntityBuilder, RelatedDecl};
pub use column::{ColumnField, JoinKind, JoinPair, RelatedField, RelationSpec};
pub use registry::{
    entity_meta, get_auto_increment_column, get_columns, get_field_by_column_name, get_join_pair,
    get_key_columns, get_not_key_columns, get_one_key_column, get_related_columns,
    get_soft_delete_column, get_table,
};

use std::sync::Arc;

/// A type mapped to a table (or to a join of two tables)
///
/// Implementations describe their shape once; the descriptor is cached for
/// the life of the process.
pub trait Entity: Default + Send + Sync + 'static {
    /// Declare the table, columns, related fields or join shape
    fn describe(builder: &mut EntityBuilder<Self>);
}

/// The frozen descriptor of an entity type
pub struct EntityMeta<T> {
    pub(crate) table: Option<String>,
    pub(crate) columns: Arc<[ColumnField<T>]>,
    pub(crate) related: Arc<[RelatedField<T>]>,
    pub(crate) join: Option<JoinPair<T>>,
}

impl<T> EntityMeta<T> {
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn columns(&self) -> &Arc<[ColumnField<T>]> {
        &self.columns
    }

    pub fn related(&self) -> &Arc<[RelatedField<T>]> {
        &self.related
    }

    pub fn join(&self) -> Option<&JoinPair<T>> {
        self.join.as_ref()
    }
}
