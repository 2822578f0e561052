//! Process-wide metadata registry
//!
//! Descriptors are built on first use and never evicted. Lookups take a read
//! lock; a missing entry is built outside any lock and published under the
//! write lock only if no other thread got there first, so readers only ever
//! see complete entries.

use super::{ColumnField, Entity, EntityBuilder, EntityMeta, JoinPair, RelatedField};
use crate::error::MetaError;
use once_cell::sync::Lazy;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Registry = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

/// Global metadata registry, keyed by entity type
static REGISTRY: Lazy<Registry> = Lazy::new(|| RwLock::new(HashMap::new()));

fn lookup<T: Entity>() -> Option<Arc<EntityMeta<T>>> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .get(&TypeId::of::<T>())
        .cloned()
        .and_then(|entry| entry.downcast::<EntityMeta<T>>().ok())
}

/// Get the cached descriptor of `T`, building it on first use
///
/// # Errors
///
/// Returns `MetaError::DuplicateColumn` if the merged parent chain maps a
/// column twice. Failed builds are not cached.
pub fn entity_meta<T: Entity>() -> Result<Arc<EntityMeta<T>>, MetaError> {
    if let Some(meta) = lookup::<T>() {
        return Ok(meta);
    }

    let built = Arc::new(EntityBuilder::<T>::described().build()?);
    log::debug!("Registered entity metadata for {}", type_name::<T>());

    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    let entry = registry
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::clone(&built) as Arc<dyn Any + Send + Sync>)
        .clone();
    drop(registry);

    Ok(entry.downcast::<EntityMeta<T>>().unwrap_or(built))
}

/// All columns of `T`, parent columns first, in declaration order
///
/// Repeated calls return the same `Arc`.
///
/// # Errors
///
/// Returns `MetaError::NoColumnMetadata` if no column is declared anywhere in
/// the chain (join pairs own no columns).
pub fn get_columns<T: Entity>() -> Result<Arc<[ColumnField<T>]>, MetaError> {
    let meta = entity_meta::<T>()?;
    if meta.columns.is_empty() {
        return Err(MetaError::NoColumnMetadata {
            entity: type_name::<T>().to_string(),
        });
    }
    Ok(Arc::clone(&meta.columns))
}

/// Key columns of `T`
///
/// # Errors
///
/// Returns `MetaError::NoKeyColumn` if no column is marked as key.
pub fn get_key_columns<T: Entity>() -> Result<Vec<ColumnField<T>>, MetaError> {
    let keys: Vec<_> = get_columns::<T>()?.iter().filter(|c| c.key).cloned().collect();
    if keys.is_empty() {
        return Err(MetaError::NoKeyColumn {
            entity: type_name::<T>().to_string(),
        });
    }
    Ok(keys)
}

/// Non-key columns of `T`
pub fn get_not_key_columns<T: Entity>() -> Result<Vec<ColumnField<T>>, MetaError> {
    Ok(get_columns::<T>()?.iter().filter(|c| !c.key).cloned().collect())
}

/// The single key column of `T`
///
/// # Errors
///
/// Returns `MetaError::MultipleKeyColumns` unless exactly one key exists
/// (a count of 0 included).
pub fn get_one_key_column<T: Entity>() -> Result<ColumnField<T>, MetaError> {
    let mut keys: Vec<_> = get_columns::<T>()?.iter().filter(|c| c.key).cloned().collect();
    if keys.len() != 1 {
        return Err(MetaError::MultipleKeyColumns {
            entity: type_name::<T>().to_string(),
            count: keys.len(),
        });
    }
    Ok(keys.remove(0))
}

pub fn get_auto_increment_column<T: Entity>() -> Result<Option<ColumnField<T>>, MetaError> {
    Ok(get_columns::<T>()?.iter().find(|c| c.auto_increment).cloned())
}

/// The first column carrying a complete soft-delete marker
pub fn get_soft_delete_column<T: Entity>() -> Result<Option<ColumnField<T>>, MetaError> {
    Ok(get_columns::<T>()?.iter().find(|c| c.soft_delete().is_some()).cloned())
}

pub fn get_field_by_column_name<T: Entity>(column: &str) -> Result<Option<ColumnField<T>>, MetaError> {
    Ok(get_columns::<T>()?.iter().find(|c| c.column == column).cloned())
}

/// Related fields of `T`; empty when none are declared or the descriptor
/// cannot be built
pub fn get_related_columns<T: Entity>() -> Arc<[RelatedField<T>]> {
    match entity_meta::<T>() {
        Ok(meta) => Arc::clone(&meta.related),
        Err(e) => {
            log::warn!("No related fields for {}: {}", type_name::<T>(), e);
            Arc::from(Vec::new())
        }
    }
}

/// Table name of `T`, inherited from the nearest parent when `T` declares none
///
/// # Errors
///
/// Returns `MetaError::NoTableMetadata` if the chain declares no table.
pub fn get_table<T: Entity>() -> Result<String, MetaError> {
    entity_meta::<T>()?
        .table
        .clone()
        .ok_or_else(|| MetaError::NoTableMetadata {
            entity: type_name::<T>().to_string(),
        })
}

/// The join shape of `T`, if `T` is a join pair
pub fn get_join_pair<T: Entity>() -> Result<Option<JoinPair<T>>, MetaError> {
    Ok(entity_meta::<T>()?.join.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Default)]
    struct Account {
        tenant: String,
        id: u64,
        name: String,
        deleted: i8,
    }

    impl Entity for Account {
        fn describe(b: &mut EntityBuilder<Self>) {
            b.table("t_account");
            b.column("tenant", "tenant", |e| &e.tenant, |e| &mut e.tenant).key();
            b.column("id", "id", |e| &e.id, |e| &mut e.id).key().auto_increment();
            b.column("name", "name", |e| &e.name, |e| &mut e.name);
            b.column("deleted", "deleted", |e| &e.deleted, |e| &mut e.deleted)
                .soft_delete("0", "1");
        }
    }

    #[derive(Default)]
    struct Bare;

    impl Entity for Bare {
        fn describe(_b: &mut EntityBuilder<Self>) {}
    }

    #[derive(Default)]
    struct HalfMarked {
        id: i32,
        flag: i32,
    }

    impl Entity for HalfMarked {
        fn describe(b: &mut EntityBuilder<Self>) {
            b.table("t_half");
            b.column("id", "id", |e| &e.id, |e| &mut e.id);
            b.column("flag", "flag", |e| &e.flag, |e| &mut e.flag).soft_delete("0", " ");
        }
    }

    #[test]
    fn test_columns_are_cached() {
        let first = get_columns::<Account>().unwrap();
        let second = get_columns::<Account>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_concurrent_first_access_publishes_one_entry() {
        #[derive(Default)]
        struct Racy {
            id: i64,
        }

        impl Entity for Racy {
            fn describe(b: &mut EntityBuilder<Self>) {
                b.table("t_racy");
                b.column("id", "id", |e| &e.id, |e| &mut e.id).key();
            }
        }

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    get_columns::<Racy>().unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let cached = get_columns::<Racy>().unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &cached)));
    }

    #[test]
    fn test_key_lookups() {
        let keys = get_key_columns::<Account>().unwrap();
        assert_eq!(keys.len(), 2);
        let err = get_one_key_column::<Account>().unwrap_err();
        assert_eq!(
            err,
            MetaError::MultipleKeyColumns {
                entity: type_name::<Account>().to_string(),
                count: 2
            }
        );
        let others: Vec<_> = get_not_key_columns::<Account>()
            .unwrap()
            .iter()
            .map(|c| c.column().to_string())
            .collect();
        assert_eq!(others, ["name", "deleted"]);
        assert!(matches!(
            get_one_key_column::<HalfMarked>(),
            Err(MetaError::MultipleKeyColumns { count: 0, .. })
        ));
        assert!(matches!(
            get_key_columns::<HalfMarked>(),
            Err(MetaError::NoKeyColumn { .. })
        ));
    }

    #[test]
    fn test_flag_lookups() {
        assert_eq!(
            get_auto_increment_column::<Account>().unwrap().unwrap().column(),
            "id"
        );
        assert_eq!(
            get_soft_delete_column::<Account>().unwrap().unwrap().soft_delete(),
            Some(("0", "1"))
        );
        assert!(get_soft_delete_column::<HalfMarked>().unwrap().is_none());
        assert!(get_auto_increment_column::<HalfMarked>().unwrap().is_none());
    }

    #[test]
    fn test_field_by_column_name() {
        let field = get_field_by_column_name::<Account>("name").unwrap().unwrap();
        assert_eq!(field.field(), "name");
        assert!(get_field_by_column_name::<Account>("nope").unwrap().is_none());
    }

    #[test]
    fn test_missing_metadata() {
        assert!(matches!(
            get_columns::<Bare>(),
            Err(MetaError::NoColumnMetadata { .. })
        ));
        assert!(matches!(get_table::<Bare>(), Err(MetaError::NoTableMetadata { .. })));
        assert!(get_related_columns::<Bare>().is_empty());
        assert!(get_join_pair::<Bare>().unwrap().is_none());
        assert_eq!(get_table::<Account>().unwrap(), "t_account");
    }
}
