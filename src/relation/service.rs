//! Named data services supplying related entities
//!
//! A related field can name a service instead of being fetched from the
//! remote table. Services are registered on the `DbHelper` under that name.

use crate::error::DbError;
use sea_query::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Supplies remote entities for a batch of local values
///
/// Closures `Fn(&[Value]) -> Result<Vec<R>, DbError>` implement it directly.
pub trait DataService<R>: Send + Sync {
    /// Fetch every entity whose remote column matches one of `values`
    fn get(&self, values: &[Value]) -> Result<Vec<R>, DbError>;
}

impl<R, F> DataService<R> for F
where
    F: Fn(&[Value]) -> Result<Vec<R>, DbError> + Send + Sync,
{
    fn get(&self, values: &[Value]) -> Result<Vec<R>, DbError> {
        self(values)
    }
}

/// Services by name; each entry holds an `Arc<dyn DataService<R>>`
#[derive(Clone, Default)]
pub(crate) struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    pub(crate) fn register<R: 'static>(&mut self, name: &str, service: Arc<dyn DataService<R>>) {
        self.services.insert(name.to_string(), Arc::new(service));
    }

    /// The service registered under `name`, if it supplies `R`
    pub(crate) fn get<R: 'static>(&self, name: &str) -> Option<Arc<dyn DataService<R>>> {
        self.services
            .get(name)?
            .downcast_ref::<Arc<dyn DataService<R>>>()
            .cloned()
    }
}
