//! # relmap
//!
//! Descriptor-driven SQL mapper for MySQL-dialect databases.
//!
//! Entity types describe their table, columns and related fields once
//! ([`Entity::describe`]). From that descriptor the crate builds SQL, maps
//! rows back onto entities, hides soft-deleted rows, pages with a
//! `FOUND_ROWS()` total, and fills related fields with one batched query per
//! field instead of one query per entity.
//!
//! The crate does not own connections: every statement goes through an
//! [`Executor`] supplied by the application.
//!
//! ## Modules
//!
//! - **`meta`** - Entity descriptors and the process-wide metadata cache
//! - **`value`** - Field types and value coercion
//! - **`sql`** - SQL fragments, parameter expansion, clause splicing
//! - **`query`** - [`DbHelper`], the query engine
//! - **`relation`** - Batched related-field resolution and join pairs
//! - **`config`** - Settings loaded from `config/config.toml` and `RELMAP__RELMAP__*`
//! - **`metrics`** - OpenTelemetry counters and tracing spans (optional)

pub mod config;
pub mod error;
pub mod executor;
pub mod meta;
pub mod metrics;
pub mod query;
pub mod relation;
pub mod sql;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod value;

pub use config::DbHelperConfig;
pub use error::{DbError, MetaError, SpliceError};
pub use executor::{Executor, Row};
pub use meta::{Entity, EntityBuilder, JoinKind};
pub use query::{DbHelper, KeyedResult, PageData};
pub use relation::DataService;
pub use sql::{ClauseSplicer, LexicalSplicer, Param};
pub use value::{CoercionError, FieldType, FieldValue};
