//! SQL generation from entity metadata.
//!
//! Everything here is pure string building over the cached metadata; no I/O.
//! Statement shells come from `sea-query` with MySQL identifier quoting, and
//! the trailing fragments (`WHERE`, soft-delete condition, `LIMIT`) are
//! appended as text so callers can pass their own trailing clause.
//!
//! ## Fragments
//!
//! - **`select_sql`** / **`select_count_sql`** - Statement heads, join aware
//! - **`key_where_sql`** / **`key_where_sql_for`** / **`key_in_where_sql`** - Key filters
//! - **`auto_soft_delete`** - Injects the soft-delete condition into a trailing clause
//! - **`limit_sql`** - Pagination
//!
//! Fragments that follow a statement head start with a space.

pub mod params;
pub mod splice;

pub use params::{expand, Param};
pub use splice::{ClauseSplicer, LexicalSplicer};

use crate::error::{DbError, MetaError};
use crate::meta::{self, Entity, JoinKind};
use crate::relation::JoinSide;
use regex::Regex;
use sea_query::{Expr, Iden, JoinType, MysqlQueryBuilder, Query, SelectStatement, Value};
use splice::{mask_literals, split_tail, starts_with_where};
use std::any::type_name;

/// Query returning the row count of the preceding `SQL_CALC_FOUND_ROWS` select
///
/// Must run right after the row query on the same connection.
pub const FOUND_ROWS_SQL: &str = "SELECT FOUND_ROWS()";

const LEFT_ALIAS: &str = "t1";
const RIGHT_ALIAS: &str = "t2";

struct Ident(String);

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Quote an identifier with backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal with single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn join_type(kind: JoinKind) -> JoinType {
    match kind {
        JoinKind::Inner => JoinType::Join,
        JoinKind::Left => JoinType::LeftJoin,
        JoinKind::Right => JoinType::RightJoin,
    }
}

fn soft_delete_condition(alias: Option<&str>, column: &str, not_deleted: &str) -> String {
    match alias {
        Some(alias) => format!("{}.{} = {}", alias, quote_ident(column), quote_literal(not_deleted)),
        None => format!("{} = {}", quote_ident(column), quote_literal(not_deleted)),
    }
}

/// Soft-delete conditions of a join pair, split into (WHERE, ON) parts
///
/// The preserved side of an outer join is filtered in WHERE, the optional
/// side in ON so unmatched rows survive.
fn join_soft_delete(kind: JoinKind, left: &JoinSide, right: &JoinSide) -> (Vec<(String, String)>, Vec<String>) {
    let left_cond = left
        .soft_delete
        .as_ref()
        .map(|(col, active)| (col.clone(), soft_delete_condition(Some(LEFT_ALIAS), col, active)));
    let right_cond = right
        .soft_delete
        .as_ref()
        .map(|(col, active)| (col.clone(), soft_delete_condition(Some(RIGHT_ALIAS), col, active)));

    let mut in_where = Vec::new();
    let mut in_on = Vec::new();
    match kind {
        JoinKind::Inner => {
            in_where.extend(left_cond.map(|(c, s)| (format!("{LEFT_ALIAS}.{c}"), s)));
            in_where.extend(right_cond.map(|(c, s)| (format!("{RIGHT_ALIAS}.{c}"), s)));
        }
        JoinKind::Left => {
            in_where.extend(left_cond.map(|(c, s)| (format!("{LEFT_ALIAS}.{c}"), s)));
            in_on.extend(right_cond.map(|(_, s)| s));
        }
        JoinKind::Right => {
            in_on.extend(left_cond.map(|(_, s)| s));
            in_where.extend(right_cond.map(|(c, s)| (format!("{RIGHT_ALIAS}.{c}"), s)));
        }
    }
    (in_where, in_on)
}

/// Add FROM (and JOIN) to a select, returning the join sides if any
fn add_from<T: Entity>(query: &mut SelectStatement) -> Result<Option<(JoinSide, JoinSide)>, MetaError> {
    match meta::get_join_pair::<T>()? {
        Some(join) => {
            let (left, right) = join.shape.sides()?;
            let (_, in_on) = join_soft_delete(join.kind, &left, &right);
            let mut on = join.on.clone();
            for cond in in_on {
                on = format!("{on} AND {cond}");
            }
            query.from_as(Ident(left.table.clone()), Ident(LEFT_ALIAS.to_string()));
            query.join_as(
                join_type(join.kind),
                Ident(right.table.clone()),
                Ident(RIGHT_ALIAS.to_string()),
                Expr::cust(on),
            );
            Ok(Some((left, right)))
        }
        None => {
            query.from(Ident(meta::get_table::<T>()?));
            Ok(None)
        }
    }
}

/// `SELECT [SQL_CALC_FOUND_ROWS] <columns> FROM <table>`
///
/// Join pairs select every column of both sides, labelled `t1.<col>` and
/// `t2.<col>`.
///
/// # Errors
///
/// Returns `MetaError` if the entity has no table or no columns.
pub fn select_sql<T: Entity>(with_count: bool) -> Result<String, MetaError> {
    let mut query = Query::select();
    match add_from::<T>(&mut query)? {
        Some((left, right)) => {
            for (alias, side) in [(LEFT_ALIAS, &left), (RIGHT_ALIAS, &right)] {
                for column in &side.columns {
                    query.expr_as(
                        Expr::col((Ident(alias.to_string()), Ident(column.clone()))),
                        Ident(format!("{alias}.{column}")),
                    );
                }
            }
        }
        None => {
            for column in meta::get_columns::<T>()?.iter() {
                query.column(Ident(column.column().to_string()));
            }
        }
    }
    let (sql, _) = query.build(MysqlQueryBuilder);
    if with_count {
        Ok(sql.replacen("SELECT ", "SELECT SQL_CALC_FOUND_ROWS ", 1))
    } else {
        Ok(sql)
    }
}

/// `SELECT COUNT(*) FROM <table>`
pub fn select_count_sql<T: Entity>() -> Result<String, MetaError> {
    let mut query = Query::select();
    query.expr(Expr::cust("COUNT(*)"));
    add_from::<T>(&mut query)?;
    let (sql, _) = query.build(MysqlQueryBuilder);
    Ok(sql)
}

/// ``" WHERE `k1` = ? AND `k2` = ?"`` over every key column
pub fn key_where_sql<T: Entity>() -> Result<String, MetaError> {
    let keys = meta::get_key_columns::<T>()?;
    let conditions: Vec<String> = keys
        .iter()
        .map(|k| format!("{} = ?", quote_ident(k.column())))
        .collect();
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// Same as [`key_where_sql`], pushing the entity's key values onto `values`
///
/// # Errors
///
/// Returns `DbError::MissingKeyValue` if a key field is null.
pub fn key_where_sql_for<T: Entity>(entity: &T, values: &mut Vec<Value>) -> Result<String, DbError> {
    let keys = meta::get_key_columns::<T>()?;
    let mut conditions = Vec::with_capacity(keys.len());
    for key in &keys {
        let value = key.get_value(entity);
        if crate::value::is_null(&value) {
            return Err(DbError::MissingKeyValue {
                entity: type_name::<T>().to_string(),
                column: key.column().to_string(),
            });
        }
        values.push(value);
        conditions.push(format!("{} = ?", quote_ident(key.column())));
    }
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// ``" WHERE `k` IN (?)"`` for the single key column
pub fn key_in_where_sql<T: Entity>() -> Result<String, MetaError> {
    let key = meta::get_one_key_column::<T>()?;
    Ok(format!(" WHERE {} IN (?)", quote_ident(key.column())))
}

fn references_column(post_sql: &str, reference: &str) -> bool {
    let pattern = match reference.split_once('.') {
        Some((alias, column)) => format!(
            r"(?i)\b{}\s*\.\s*(`{}`|{}\b)",
            regex::escape(alias),
            regex::escape(column),
            regex::escape(column)
        ),
        None => format!(r"(?i)\b{}\b", regex::escape(reference)),
    };
    Regex::new(&pattern)
        .map(|re| re.is_match(&mask_literals(post_sql)))
        .unwrap_or(false)
}

/// Prefix form used when splicing fails; the caller's predicate stays
/// parenthesised so an `OR` in it cannot escape the condition
fn prefix_condition(body: &str, condition: &str) -> String {
    match split_tail(body) {
        Some((predicate, tail)) => {
            let mut out = format!(" WHERE {condition}");
            if !predicate.is_empty() {
                out.push_str(&format!(" AND ({predicate})"));
            }
            if !tail.is_empty() {
                out.push(' ');
                out.push_str(tail);
            }
            out
        }
        None => format!(" WHERE {condition} AND ({body})"),
    }
}

/// Inject the soft-delete condition into a trailing clause
///
/// Returns the clause to append after the statement head. Entities without a
/// soft-delete column, and clauses that already mention the column, pass
/// through unchanged.
///
/// # Arguments
///
/// * `post_sql` - The caller's trailing clause (`WHERE ..`, `ORDER BY ..`, ..)
/// * `splicer` - Used to AND the condition into an existing WHERE
///
/// # Example
///
/// ```rust
/// use relmap::{sql, Entity, EntityBuilder, LexicalSplicer};
///
/// #[derive(Default)]
/// struct Note {
///     id: i64,
///     deleted: i8,
/// }
///
/// impl Entity for Note {
///     fn describe(b: &mut EntityBuilder<Self>) {
///         b.table("t_note");
///         b.column("id", "id", |n| &n.id, |n| &mut n.id).key();
///         b.column("deleted", "deleted", |n| &n.deleted, |n| &mut n.deleted)
///             .soft_delete("0", "1");
///     }
/// }
///
/// assert_eq!(
///     sql::auto_soft_delete::<Note>(None, &LexicalSplicer).unwrap(),
///     " WHERE `deleted` = '0'"
/// );
/// ```
pub fn auto_soft_delete<T: Entity>(post_sql: Option<&str>, splicer: &dyn ClauseSplicer) -> Result<String, MetaError> {
    let post = post_sql.unwrap_or("").trim();

    let candidates: Vec<(String, String)> = match meta::get_join_pair::<T>()? {
        Some(join) => {
            let (left, right) = join.shape.sides()?;
            join_soft_delete(join.kind, &left, &right).0
        }
        None => meta::get_soft_delete_column::<T>()?
            .and_then(|col| {
                col.soft_delete()
                    .map(|(active, _)| (col.column().to_string(), soft_delete_condition(None, col.column(), active)))
            })
            .into_iter()
            .collect(),
    };

    let conditions: Vec<String> = candidates
        .into_iter()
        .filter(|(reference, _)| !references_column(post, reference))
        .map(|(_, cond)| cond)
        .collect();

    if conditions.is_empty() {
        return Ok(if post.is_empty() { String::new() } else { format!(" {post}") });
    }
    let condition = conditions.join(" AND ");

    if post.is_empty() {
        return Ok(format!(" WHERE {condition}"));
    }
    if !starts_with_where(post) {
        return Ok(format!(" WHERE {condition} {post}"));
    }
    match splicer.splice_and(post, &condition) {
        Ok(spliced) => Ok(format!(" {spliced}")),
        Err(e) => {
            log::warn!("Soft delete condition could not be spliced into [{post}]: {e}; prefixing it instead");
            let body = post.trim_start()[5..].trim_start();
            Ok(prefix_condition(body, &condition))
        }
    }
}

/// `LIMIT` fragment; both `None` means no limit
///
/// # Errors
///
/// Returns `DbError::Param` when an offset is given without a limit.
pub fn limit_sql(offset: Option<i64>, limit: Option<i64>) -> Result<String, DbError> {
    match (offset, limit) {
        (None, None) => Ok(String::new()),
        (None, Some(limit)) => Ok(format!(" LIMIT {limit}")),
        (Some(offset), Some(limit)) => Ok(format!(" LIMIT {offset},{limit}")),
        (Some(offset), None) => Err(DbError::Param(format!(
            "offset {offset} given without a limit"
        ))),
    }
}
