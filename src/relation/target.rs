//! Typed handlers behind each related field.

use super::{fetch_remote, RelationTarget};
use crate::error::DbError;
use crate::meta::{self, Entity, RelationSpec};
use crate::query::DbHelper;
use crate::value::{is_null, loose_eq};
use sea_query::Value;
use std::any::type_name;
use std::sync::Arc;

type ManySlot<T, R> = Box<dyn Fn(&mut T) -> &mut Vec<R> + Send + Sync>;
type OneSlot<T, R> = Box<dyn Fn(&mut T) -> &mut Option<R> + Send + Sync>;

enum Slot<T, R> {
    Many(ManySlot<T, R>),
    One(OneSlot<T, R>),
}

/// Related field of `T` holding `R` values
pub(crate) struct TypedTarget<T, R> {
    slot: Slot<T, R>,
}

impl<T, R> TypedTarget<T, R> {
    pub(crate) fn many<S>(slot: S) -> Self
    where
        S: Fn(&mut T) -> &mut Vec<R> + Send + Sync + 'static,
    {
        Self {
            slot: Slot::Many(Box::new(slot)),
        }
    }

    pub(crate) fn one<S>(slot: S) -> Self
    where
        S: Fn(&mut T) -> &mut Option<R> + Send + Sync + 'static,
    {
        Self {
            slot: Slot::One(Box::new(slot)),
        }
    }
}

/// Local/remote equality; cross-type matches are logged once per field
fn values_match(local: &Value, remote: &Value, spec: &RelationSpec, warned: &mut bool) -> bool {
    let (matched, cross_type) = loose_eq(local, remote);
    if matched && cross_type && !*warned {
        log::warn!(
            "Related field {} matched {} against {} by string form; column types differ ({:?} vs {:?})",
            spec.field,
            spec.local_column,
            spec.remote_column,
            local,
            remote
        );
        *warned = true;
    }
    matched
}

impl<T, R> RelationTarget<T> for TypedTarget<T, R>
where
    T: Entity,
    R: Entity + Clone,
{
    fn is_list(&self) -> bool {
        matches!(self.slot, Slot::Many(_))
    }

    fn remote_entity(&self) -> &'static str {
        type_name::<R>()
    }

    fn has_remote_column(&self, column: &str) -> bool {
        matches!(meta::get_field_by_column_name::<R>(column), Ok(Some(_)))
    }

    fn assign_empty(&self, entity: &mut T) {
        if let Slot::Many(slot) = &self.slot {
            slot(entity).clear();
        }
    }

    fn fetch_and_assign(
        &self,
        helper: &DbHelper,
        spec: &RelationSpec,
        batch: &mut [&mut T],
        locals: &[Value],
        values: Vec<Value>,
    ) -> Result<(), DbError> {
        let Some(remote) = meta::get_field_by_column_name::<R>(&spec.remote_column)? else {
            log::warn!(
                "Related field {}: column {} not found on {}",
                spec.field,
                spec.remote_column,
                type_name::<R>()
            );
            return Ok(());
        };

        let fetched: Vec<R> = fetch_remote::<R>(helper, spec, values)?;
        let remote_values: Vec<Value> = fetched.iter().map(|r| remote.get_value(r)).collect();
        let mut warned = false;

        for (entity, local) in batch.iter_mut().zip(locals) {
            match &self.slot {
                Slot::Many(slot) => {
                    let mut matched = Vec::new();
                    if !is_null(local) {
                        for (candidate, value) in fetched.iter().zip(&remote_values) {
                            if values_match(local, value, spec, &mut warned) {
                                matched.push(candidate.clone());
                            }
                        }
                    }
                    *slot(&mut **entity) = matched;
                }
                Slot::One(slot) => {
                    if is_null(local) {
                        continue;
                    }
                    let found = fetched
                        .iter()
                        .zip(&remote_values)
                        .find(|(_, value)| values_match(local, value, spec, &mut warned))
                        .map(|(candidate, _)| candidate.clone());
                    if found.is_some() {
                        *slot(&mut **entity) = found;
                    }
                }
            }
        }
        Ok(())
    }
}

/// A parent's related field, reached through the embedded parent value
pub(crate) struct LiftedTarget<T, P> {
    inner: Arc<dyn RelationTarget<P>>,
    parent: Box<dyn Fn(&mut T) -> &mut P + Send + Sync>,
}

impl<T, P> LiftedTarget<T, P> {
    pub(crate) fn new<F>(inner: Arc<dyn RelationTarget<P>>, parent: F) -> Self
    where
        F: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        Self {
            inner,
            parent: Box::new(parent),
        }
    }
}

impl<T, P> RelationTarget<T> for LiftedTarget<T, P>
where
    T: Entity,
    P: Entity,
{
    fn is_list(&self) -> bool {
        self.inner.is_list()
    }

    fn remote_entity(&self) -> &'static str {
        self.inner.remote_entity()
    }

    fn has_remote_column(&self, column: &str) -> bool {
        self.inner.has_remote_column(column)
    }

    fn assign_empty(&self, entity: &mut T) {
        self.inner.assign_empty((self.parent)(entity));
    }

    fn fetch_and_assign(
        &self,
        helper: &DbHelper,
        spec: &RelationSpec,
        batch: &mut [&mut T],
        locals: &[Value],
        values: Vec<Value>,
    ) -> Result<(), DbError> {
        let mut parents: Vec<&mut P> = batch.iter_mut().map(|e| (self.parent)(&mut **e)).collect();
        self.inner.fetch_and_assign(helper, spec, &mut parents, locals, values)
    }
}
