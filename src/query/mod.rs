//! Query engine: key lookups, paged lists, counts and existence checks.
//!
//! [`DbHelper`] ties the pieces together. Every list-style call goes through
//! one paged primitive:
//!
//! ```text
//! select_sql + auto_soft_delete(post_sql) + limit_sql  ->  Executor
//!     -> rows mapped onto entities -> [SELECT FOUND_ROWS()] -> relation resolution
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use relmap::{params, DbHelper, Entity, EntityBuilder};
//! # use relmap::{DbError, Executor, Row};
//! # struct Conn;
//! # impl Executor for Conn {
//! #     fn query_all(&self, _: &str, _: &[sea_query::Value]) -> Result<Vec<Row>, DbError> { Ok(vec![]) }
//! # }
//!
//! #[derive(Default, Clone)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     fn describe(b: &mut EntityBuilder<Self>) {
//!         b.table("t_user");
//!         b.column("id", "id", |u| &u.id, |u| &mut u.id).key();
//!         b.column("name", "name", |u| &u.name, |u| &mut u.name);
//!     }
//! }
//!
//! let db = DbHelper::new(Conn);
//! let page = db.get_page::<User>(1, 20, "WHERE name LIKE ? ORDER BY id", &params!["a%"])?;
//! println!("{} of {}", page.data.len(), page.total);
//! # Ok::<(), DbError>(())
//! ```

pub(crate) mod error_handling;
pub mod page;

pub use page::{KeyedResult, PageData};

use crate::config::DbHelperConfig;
use crate::error::DbError;
use crate::executor::{Executor, Row};
use crate::meta::{self, Entity};
use crate::relation::{self, DataService, ServiceRegistry};
use crate::sql::{self, expand, ClauseSplicer, LexicalSplicer, Param, FOUND_ROWS_SQL};
use crate::value::{cast, is_null, loose_eq, FieldType, FieldValue};
use error_handling::is_no_rows_error;
use sea_query::Value;
use std::any::{type_name, Any};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Entry point for reading entities
///
/// Holds the executor, the clause splicer, named data services and settings.
/// `DbHelper` is `Send + Sync`; share it behind an `Arc` across threads.
pub struct DbHelper {
    executor: Arc<dyn Executor>,
    splicer: Arc<dyn ClauseSplicer>,
    services: ServiceRegistry,
    config: DbHelperConfig,
}

/// Read every column present in `row` into `entity`
fn fill_row<T: Entity>(entity: &mut T, row: &Row) -> Result<(), DbError> {
    for column in meta::get_columns::<T>()?.iter() {
        if let Some(value) = row.get(column.column()) {
            column.set_value(entity, value.clone());
        }
    }
    Ok(())
}

/// Map a row onto a fresh entity (or join pair)
pub(crate) fn map_row<T: Entity>(row: &Row) -> Result<T, DbError> {
    if let Some(join) = meta::get_join_pair::<T>()? {
        return join.shape.map_row(row);
    }
    let mut entity = T::default();
    fill_row(&mut entity, row)?;
    Ok(entity)
}

/// First column of a count-style row as `i64`; no row counts as 0
fn read_count(row: Option<Row>) -> Result<i64, DbError> {
    let Some(row) = row else {
        return Ok(0);
    };
    let value = row
        .get_index(0)
        .cloned()
        .ok_or_else(|| DbError::Mapping("count query returned no column".to_string()))?;
    let value = cast(value, FieldType::BigInt)
        .map_err(|e| DbError::Mapping(format!("count query returned a non-integer value: {e}")))?;
    Ok(Option::<i64>::from_value(value)?.unwrap_or(0))
}

impl DbHelper {
    /// Create a helper over an executor, with the lexical splicer and
    /// default settings
    pub fn new<E: Executor + 'static>(executor: E) -> Self {
        Self {
            executor: Arc::new(executor),
            splicer: Arc::new(LexicalSplicer),
            services: ServiceRegistry::default(),
            config: DbHelperConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DbHelperConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the splicer used to AND conditions into trailing clauses
    pub fn with_splicer<S: ClauseSplicer + 'static>(mut self, splicer: S) -> Self {
        self.splicer = Arc::new(splicer);
        self
    }

    /// Register a data service for related fields naming `name`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use relmap::{DbError, DbHelper, Executor, Row};
    /// # use sea_query::Value;
    /// # struct Conn;
    /// # impl Executor for Conn {
    /// #     fn query_all(&self, _: &str, _: &[Value]) -> Result<Vec<Row>, DbError> { Ok(vec![]) }
    /// # }
    /// #[derive(Default, Clone)]
    /// struct Avatar {
    ///     user_id: i64,
    ///     url: String,
    /// }
    ///
    /// let db = DbHelper::new(Conn).with_data_service::<Avatar, _>(
    ///     "avatars",
    ///     |ids: &[Value]| -> Result<Vec<Avatar>, DbError> {
    ///         Ok(Vec::new())
    ///     },
    /// );
    /// ```
    pub fn with_data_service<R, S>(mut self, name: &str, service: S) -> Self
    where
        R: 'static,
        S: DataService<R> + 'static,
    {
        let service: Arc<dyn DataService<R>> = Arc::new(service);
        self.services.register(name, service);
        self
    }

    pub fn config(&self) -> &DbHelperConfig {
        &self.config
    }

    pub(crate) fn splicer(&self) -> &dyn ClauseSplicer {
        self.splicer.as_ref()
    }

    pub(crate) fn data_service<R: 'static>(&self, name: &str) -> Option<Arc<dyn DataService<R>>> {
        self.services.get::<R>(name)
    }

    /// Time one round trip, log it, and record metrics
    fn timed<R>(&self, sql: &str, values: &[Value], call: impl FnOnce() -> Result<R, DbError>) -> Result<R, DbError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        if self.config.log_sql {
            log::debug!("Executing SQL: {} args: {:?}", sql, values);
        }

        let start = Instant::now();
        let result = call();
        let elapsed = start.elapsed();

        #[cfg(feature = "metrics")]
        {
            METRICS.record_query(elapsed);
            if result.is_err() {
                METRICS.record_query_error();
            }
        }

        if elapsed > self.config.slow_sql_threshold() {
            #[cfg(feature = "metrics")]
            METRICS.record_slow_query();
            log::warn!(
                "Slow SQL: {}ms, sql: {}, args: {:?}",
                elapsed.as_millis(),
                sql,
                values
            );
        }
        result
    }

    fn run_all(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>, DbError> {
        match self.timed(sql, values, || self.executor.query_all(sql, values)) {
            Err(e) if is_no_rows_error(&e) => Ok(Vec::new()),
            other => other,
        }
    }

    fn run_one(&self, sql: &str, values: &[Value]) -> Result<Option<Row>, DbError> {
        match self.timed(sql, values, || self.executor.query_one(sql, values)) {
            Err(e) if is_no_rows_error(&e) => Ok(None),
            other => other,
        }
    }

    /// Fill `entity` by its current key values
    ///
    /// Soft-deleted rows are found too. Related fields are resolved when a
    /// row matches.
    ///
    /// # Returns
    ///
    /// `true` if a row matched.
    ///
    /// # Errors
    ///
    /// Returns `DbError::MissingKeyValue` if a key field is null.
    pub fn get_by_key<T: Entity>(&self, entity: &mut T) -> Result<bool, DbError> {
        let mut values = Vec::new();
        let sql = format!(
            "{}{}",
            sql::select_sql::<T>(false)?,
            sql::key_where_sql_for(entity, &mut values)?
        );
        match self.run_one(&sql, &values)? {
            Some(row) => {
                fill_row(entity, &row)?;
                self.handle_related_one(entity)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetch the entity whose single key column equals `key`
    ///
    /// # Errors
    ///
    /// Returns `MetaError::MultipleKeyColumns` unless `T` has exactly one key
    /// column, and `DbError::MissingKeyValue` if `key` is null.
    pub fn get_by_key_value<T: Entity, K: FieldValue>(&self, key: K) -> Result<Option<T>, DbError> {
        let key_column = meta::get_one_key_column::<T>()?;
        let value = key.into_value();
        if is_null(&value) {
            return Err(DbError::MissingKeyValue {
                entity: type_name::<T>().to_string(),
                column: key_column.column().to_string(),
            });
        }

        let sql = format!("{}{}", sql::select_sql::<T>(false)?, sql::key_where_sql::<T>()?);
        match self.run_one(&sql, &[value])? {
            Some(row) => {
                let mut entity = map_row::<T>(&row)?;
                self.handle_related_one(&mut entity)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Fetch the entities for a list of key values with one `IN` query
    ///
    /// The result iterates in the order of `keys`. Null keys and keys without
    /// a row are left out, and repeated keys appear once. An empty `keys`
    /// returns an empty result without touching the database.
    pub fn get_by_key_list<T, K>(&self, keys: &[K]) -> Result<KeyedResult<K, T>, DbError>
    where
        T: Entity + Clone,
        K: FieldValue + Clone + PartialEq,
    {
        let mut result = KeyedResult::default();
        if keys.is_empty() {
            return Ok(result);
        }

        let key_column = meta::get_one_key_column::<T>()?;
        let mut values: Vec<Value> = Vec::new();
        for key in keys {
            let value = key.clone().into_value();
            if !is_null(&value) && !values.contains(&value) {
                values.push(value);
            }
        }
        if values.is_empty() {
            return Ok(result);
        }

        let sql = format!("{}{}", sql::select_sql::<T>(false)?, sql::key_in_where_sql::<T>()?);
        let (sql, args) = expand(&sql, &[Param::List(values)])?;
        let rows = self.run_all(&sql, &args)?;
        let mut entities = rows.iter().map(map_row::<T>).collect::<Result<Vec<_>, _>>()?;
        self.handle_related(&mut entities)?;

        let entity_keys: Vec<Value> = entities.iter().map(|e| key_column.get_value(e)).collect();
        for key in keys {
            let value = key.clone().into_value();
            if is_null(&value) || result.contains_key(key) {
                continue;
            }
            if let Some(idx) = entity_keys.iter().position(|k| loose_eq(&value, k).0) {
                result.push(key.clone(), entities[idx].clone());
            }
        }
        Ok(result)
    }

    /// Page `page` (1-based) of `page_size` rows, with the total row count
    ///
    /// The offset is `(page - 1) * page_size`; non-positive arguments are not
    /// validated.
    pub fn get_page<T: Entity>(&self, page: i64, page_size: i64, post_sql: &str, args: &[Param]) -> Result<PageData<T>, DbError> {
        let offset = (page - 1).saturating_mul(page_size);
        self.fetch_page(true, Some(offset), Some(page_size), Some(post_sql), args, true)
    }

    /// Like [`get_page`](Self::get_page) without the count query; `total` is `-1`
    pub fn get_page_without_count<T: Entity>(
        &self,
        page: i64,
        page_size: i64,
        post_sql: &str,
        args: &[Param],
    ) -> Result<PageData<T>, DbError> {
        let offset = (page - 1).saturating_mul(page_size);
        self.fetch_page(false, Some(offset), Some(page_size), Some(post_sql), args, true)
    }

    /// Every row of `T`'s table (minus soft-deleted rows)
    pub fn get_all<T: Entity>(&self) -> Result<Vec<T>, DbError> {
        Ok(self.fetch_page(false, None, None, None, &[], true)?.data)
    }

    pub fn get_all_where<T: Entity>(&self, post_sql: &str, args: &[Param]) -> Result<Vec<T>, DbError> {
        Ok(self.fetch_page(false, None, None, Some(post_sql), args, true)?.data)
    }

    /// Batched fetch for relation resolution; the `IN` list bounds it
    pub(crate) fn get_related_where<T: Entity>(&self, post_sql: &str, args: &[Param]) -> Result<Vec<T>, DbError> {
        Ok(self.fetch_page(false, None, None, Some(post_sql), args, false)?.data)
    }

    pub fn get_one<T: Entity>(&self) -> Result<Option<T>, DbError> {
        Ok(self.fetch_page(false, None, Some(1), None, &[], true)?.data.into_iter().next())
    }

    pub fn get_one_where<T: Entity>(&self, post_sql: &str, args: &[Param]) -> Result<Option<T>, DbError> {
        Ok(self
            .fetch_page(false, None, Some(1), Some(post_sql), args, true)?
            .data
            .into_iter()
            .next())
    }

    /// Row count of `T`'s table, soft-deleted rows excluded
    pub fn get_count<T: Entity>(&self) -> Result<i64, DbError> {
        let sql = format!(
            "{}{}",
            sql::select_count_sql::<T>()?,
            sql::auto_soft_delete::<T>(None, self.splicer())?
        );
        read_count(self.run_one(&sql, &[])?)
    }

    /// Number of rows matching `post_sql`
    ///
    /// Counted the same way [`get_page`](Self::get_page) counts its total, so
    /// `GROUP BY` or `DISTINCT` clauses give the same number in both.
    pub fn get_count_where<T: Entity>(&self, post_sql: &str, args: &[Param]) -> Result<i64, DbError> {
        Ok(self.fetch_page::<T>(true, Some(0), Some(1), Some(post_sql), args, true)?.total)
    }

    /// Whether any row matches `post_sql`
    pub fn is_exist<T: Entity>(&self, post_sql: &str, args: &[Param]) -> Result<bool, DbError> {
        Ok(self.get_one_where::<T>(post_sql, args)?.is_some())
    }

    /// Whether at least `n` rows match `post_sql`
    pub fn is_exist_at_least<T: Entity>(&self, n: i64, post_sql: &str, args: &[Param]) -> Result<bool, DbError> {
        if n == 1 {
            return self.is_exist::<T>(post_sql, args);
        }
        Ok(self.get_count_where::<T>(post_sql, args)? >= n)
    }

    /// Resolve the related fields of a batch of entities
    pub fn handle_related<T: Entity>(&self, entities: &mut [T]) -> Result<(), DbError> {
        let mut batch: Vec<&mut T> = entities.iter_mut().collect();
        relation::resolve(self, &mut batch)
    }

    pub fn handle_related_one<T: Entity>(&self, entity: &mut T) -> Result<(), DbError> {
        relation::resolve(self, &mut [entity])
    }

    /// Resolve the related fields of a type-erased batch
    ///
    /// # Errors
    ///
    /// Returns `DbError::MixedTypeBatch` if any element is not a `T`; nothing
    /// is resolved in that case.
    pub fn resolve_dyn<T: Entity>(&self, batch: &mut [Box<dyn Any + Send>]) -> Result<(), DbError> {
        if batch.iter().any(|item| !item.is::<T>()) {
            return Err(DbError::MixedTypeBatch {
                expected: type_name::<T>().to_string(),
            });
        }
        let mut typed: Vec<&mut T> = batch.iter_mut().filter_map(|item| item.downcast_mut::<T>()).collect();
        relation::resolve(self, &mut typed)
    }

    /// The paged primitive behind every list-style call
    ///
    /// With `with_count`, the total comes from `SELECT FOUND_ROWS()` issued
    /// right after the row query; otherwise it stays `-1`.
    fn fetch_page<T: Entity>(
        &self,
        with_count: bool,
        offset: Option<i64>,
        limit: Option<i64>,
        post_sql: Option<&str>,
        args: &[Param],
        warn_unbounded: bool,
    ) -> Result<PageData<T>, DbError> {
        let mut sql = sql::select_sql::<T>(with_count)?;
        sql.push_str(&sql::auto_soft_delete::<T>(post_sql, self.splicer())?);
        sql.push_str(&sql::limit_sql(offset, limit)?);

        if limit.is_none() && warn_unbounded && self.config.warn_unbounded {
            log::warn!("Query for {} has no LIMIT and may return every row: {}", type_name::<T>(), sql);
        }

        let (sql, values) = expand(&sql, args)?;
        let rows = self.run_all(&sql, &values)?;
        let mut data = rows.iter().map(map_row::<T>).collect::<Result<Vec<_>, _>>()?;

        let total = if with_count {
            read_count(self.run_one(FOUND_ROWS_SQL, &[])?)?
        } else {
            PageData::<T>::UNKNOWN_TOTAL
        };

        self.handle_related(&mut data)?;
        Ok(PageData::new(data, total, limit))
    }
}
