//! Related-field resolution
//!
//! After a batch of entities is fetched, every related field is filled with
//! one batched query for the whole batch:
//!
//! 1. Collect the batch's non-null values of the local column.
//! 2. Fetch every remote entity whose remote column is `IN` those values
//!    (or ask the field's named data service).
//! 3. Match each entity to the fetched rows by `local == remote`.
//!
//! A batch of 50 orders with a `user` field costs one query for users, not 50.
//! Join pairs skip related fields and resolve their left and right sides
//! as two independent batches.
//!
//! Misconfigured relations (blank or unknown columns, unknown data services,
//! an extra WHERE that cannot be spliced) are logged and skipped or degraded;
//! the rest of the batch is still resolved.

pub mod join;
pub mod service;
pub mod target;

pub(crate) use join::{JoinSide, TypedJoin};
pub use service::DataService;
pub(crate) use service::ServiceRegistry;
pub(crate) use target::{LiftedTarget, TypedTarget};

use crate::error::{DbError, MetaError};
use crate::executor::Row;
use crate::meta::{self, Entity, RelatedField, RelationSpec};
use crate::query::DbHelper;
use crate::sql::{quote_ident, Param};
use crate::value::is_null;
use sea_query::Value;
use std::any::type_name;

/// Type-erased handler of one related field of `T`
pub(crate) trait RelationTarget<T>: Send + Sync {
    fn is_list(&self) -> bool;

    fn remote_entity(&self) -> &'static str;

    fn has_remote_column(&self, column: &str) -> bool;

    /// Set a list-valued field to an empty list; scalar fields are left alone
    fn assign_empty(&self, entity: &mut T);

    /// Fetch the remote entities for `values` and assign them across `batch`
    ///
    /// `locals[i]` is the local column value of `batch[i]`.
    fn fetch_and_assign(
        &self,
        helper: &DbHelper,
        spec: &RelationSpec,
        batch: &mut [&mut T],
        locals: &[Value],
        values: Vec<Value>,
    ) -> Result<(), DbError>;
}

/// Type-erased left/right projection of a join pair `T`
pub(crate) trait JoinShape<T>: Send + Sync {
    fn sides(&self) -> Result<(JoinSide, JoinSide), MetaError>;

    fn map_row(&self, row: &Row) -> Result<T, DbError>;

    fn resolve(&self, helper: &DbHelper, batch: &mut [&mut T]) -> Result<(), DbError>;
}

/// Fill every related field of every entity in `batch`
pub(crate) fn resolve<T: Entity>(helper: &DbHelper, batch: &mut [&mut T]) -> Result<(), DbError> {
    if batch.is_empty() {
        return Ok(());
    }

    if let Some(join) = meta::get_join_pair::<T>()? {
        return join.shape.resolve(helper, batch);
    }

    let related = meta::get_related_columns::<T>();
    for field in related.iter() {
        resolve_field(helper, field, batch)?;
    }
    Ok(())
}

fn resolve_field<T: Entity>(helper: &DbHelper, field: &RelatedField<T>, batch: &mut [&mut T]) -> Result<(), DbError> {
    let spec = &field.spec;
    if spec.local_column.trim().is_empty() || spec.remote_column.trim().is_empty() {
        log::warn!(
            "Related field {} of {} has a blank local or remote column, skipped",
            spec.field,
            type_name::<T>()
        );
        return Ok(());
    }

    let Some(local) = meta::get_field_by_column_name::<T>(&spec.local_column)? else {
        log::warn!(
            "Related field {}: local column {} not found on {}, skipped",
            spec.field,
            spec.local_column,
            type_name::<T>()
        );
        return Ok(());
    };
    if !field.target.has_remote_column(&spec.remote_column) {
        log::warn!(
            "Related field {}: remote column {} not found on {}, skipped",
            spec.field,
            spec.remote_column,
            field.target.remote_entity()
        );
        return Ok(());
    }

    let locals: Vec<Value> = batch.iter().map(|entity| local.get_value(entity)).collect();
    let mut values: Vec<Value> = Vec::new();
    for value in &locals {
        if !is_null(value) && !values.contains(value) {
            values.push(value.clone());
        }
    }

    if values.is_empty() {
        if field.target.is_list() {
            for entity in batch.iter_mut() {
                field.target.assign_empty(&mut **entity);
            }
        }
        return Ok(());
    }

    field.target.fetch_and_assign(helper, spec, batch, &locals, values)
}

/// One batched fetch of the remote entities for a related field
pub(crate) fn fetch_remote<R: Entity>(helper: &DbHelper, spec: &RelationSpec, values: Vec<Value>) -> Result<Vec<R>, DbError> {
    if let Some(name) = spec.data_service.as_deref() {
        return match helper.data_service::<R>(name) {
            Some(service) => service.get(&values),
            None => {
                log::error!(
                    "Related field {}: no data service named {} supplies {}",
                    spec.field,
                    name,
                    type_name::<R>()
                );
                Ok(Vec::new())
            }
        };
    }

    let in_clause = format!("{} IN (?)", quote_ident(&spec.remote_column));
    let post_sql = match spec.extra_where.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => format!("WHERE {in_clause}"),
        Some(extra) => match helper.splicer().splice_and(extra, &in_clause) {
            Ok(spliced) => spliced,
            Err(e) => {
                log::error!(
                    "Related field {}: extra where [{}] could not be spliced ({}), using the plain IN filter",
                    spec.field,
                    extra,
                    e
                );
                format!("WHERE {in_clause}")
            }
        },
    };

    helper.get_related_where::<R>(&post_sql, &[Param::List(values)])
}
