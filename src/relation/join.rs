//! Join pairs: a left and a right entity read from one joined row.

use super::{resolve, JoinShape};
use crate::error::{DbError, MetaError};
use crate::executor::Row;
use crate::meta::{self, Entity};
use crate::query::DbHelper;
use crate::value::is_null;

/// Table facts of one join side, as the SQL builder needs them
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinSide {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    /// `(column, not_deleted)` when the side has a soft-delete column
    pub(crate) soft_delete: Option<(String, String)>,
}

impl JoinSide {
    fn of<E: Entity>() -> Result<Self, MetaError> {
        let columns = meta::get_columns::<E>()?;
        let soft_delete = meta::get_soft_delete_column::<E>()?.and_then(|col| {
            col.soft_delete()
                .map(|(active, _)| (col.column().to_string(), active.to_string()))
        });
        Ok(Self {
            table: meta::get_table::<E>()?,
            columns: columns.iter().map(|c| c.column().to_string()).collect(),
            soft_delete,
        })
    }
}

type SideSlot<T, E> = Box<dyn Fn(&mut T) -> &mut Option<E> + Send + Sync>;

pub(crate) struct TypedJoin<T, L, R> {
    left: SideSlot<T, L>,
    right: SideSlot<T, R>,
}

impl<T, L, R> TypedJoin<T, L, R> {
    pub(crate) fn new<LS, RS>(left: LS, right: RS) -> Self
    where
        LS: Fn(&mut T) -> &mut Option<L> + Send + Sync + 'static,
        RS: Fn(&mut T) -> &mut Option<R> + Send + Sync + 'static,
    {
        Self {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Read one side out of a joined row; a side whose columns are all null
/// (the missing side of an outer join) maps to `None`
fn map_side<E: Entity>(row: &Row, alias: &str) -> Result<Option<E>, MetaError> {
    let columns = meta::get_columns::<E>()?;
    let mut entity = E::default();
    let mut present = false;
    for column in columns.iter() {
        if let Some(value) = row.get(&format!("{alias}.{}", column.column())) {
            if !is_null(value) {
                present = true;
                column.set_value(&mut entity, value.clone());
            }
        }
    }
    Ok(present.then_some(entity))
}

impl<T, L, R> JoinShape<T> for TypedJoin<T, L, R>
where
    T: Entity,
    L: Entity,
    R: Entity,
{
    fn sides(&self) -> Result<(JoinSide, JoinSide), MetaError> {
        Ok((JoinSide::of::<L>()?, JoinSide::of::<R>()?))
    }

    fn map_row(&self, row: &Row) -> Result<T, DbError> {
        let mut pair = T::default();
        *(self.left)(&mut pair) = map_side::<L>(row, "t1")?;
        *(self.right)(&mut pair) = map_side::<R>(row, "t2")?;
        Ok(pair)
    }

    fn resolve(&self, helper: &DbHelper, batch: &mut [&mut T]) -> Result<(), DbError> {
        let mut lefts: Vec<&mut L> = batch
            .iter_mut()
            .filter_map(|pair| (self.left)(&mut **pair).as_mut())
            .collect();
        resolve::<L>(helper, &mut lefts)?;

        let mut rights: Vec<&mut R> = batch
            .iter_mut()
            .filter_map(|pair| (self.right)(&mut **pair).as_mut())
            .collect();
        resolve::<R>(helper, &mut rights)
    }
}
