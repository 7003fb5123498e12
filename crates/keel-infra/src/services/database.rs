use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use keel_core::{CoreError, Disposable, ServiceResult};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{AdapterError, AdapterResult, IntoServiceResult};
use crate::services::config::ConfigurationProvider;
use crate::services::logger::Logger;

/// Document-oriented persistence capability
///
/// Records are JSON objects grouped in named collections and addressed by a
/// generated id. Implementations are closed when the container is disposed.
#[async_trait]
pub trait Database: Disposable {
    /// Adapter name used in logs
    fn name(&self) -> &str;

    /// Store `record` and return its generated id
    async fn insert(&self, collection: &str, record: Value) -> ServiceResult<String>;

    /// Fetch a record; fails with `NOT_FOUND` when absent
    async fn get(&self, collection: &str, id: &str) -> ServiceResult<Value>;

    /// Replace an existing record
    async fn update(&self, collection: &str, id: &str, record: Value) -> ServiceResult<()>;

    /// Remove a record, reporting whether it existed
    async fn delete(&self, collection: &str, id: &str) -> ServiceResult<bool>;

    /// Records whose fields equal every entry of `filter`
    async fn find(&self, collection: &str, filter: &Map<String, Value>) -> ServiceResult<Vec<Value>>;

    async fn health_check(&self) -> ServiceResult<()>;
}

/// Everything a production adapter needs to connect
#[derive(Clone)]
pub struct DatabaseConnectContext {
    pub url: String,
    pub config: Arc<dyn ConfigurationProvider>,
    pub logger: Arc<dyn Logger>,
}

/// Caller-supplied constructor for the production database adapter
pub type DatabaseConnector =
    Arc<dyn Fn(DatabaseConnectContext) -> BoxFuture<'static, Result<Arc<dyn Database>, AdapterError>> + Send + Sync>;

/// In-process database for development and tests
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    closed: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of records in `collection`
    pub fn count(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, BTreeMap::len)
    }

    fn ensure_open(&self) -> AdapterResult<()> {
        if self.is_closed() {
            return Err(AdapterError::Closed("in-memory database".to_string()));
        }
        Ok(())
    }

    fn ensure_object(record: &Value) -> AdapterResult<()> {
        if !record.is_object() {
            return Err(AdapterError::InvalidInput("records must be JSON objects".to_string()));
        }
        Ok(())
    }

    fn insert_record(&self, collection: &str, record: Value) -> AdapterResult<String> {
        self.ensure_open()?;
        Self::ensure_object(&record)?;
        let id = uuid::Uuid::new_v4().to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    fn get_record(&self, collection: &str, id: &str) -> AdapterResult<Value> {
        self.ensure_open()?;
        self.collections
            .read()
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("{}/{}", collection, id)))
    }

    fn update_record(&self, collection: &str, id: &str, record: Value) -> AdapterResult<()> {
        self.ensure_open()?;
        Self::ensure_object(&record)?;
        let mut collections = self.collections.write();
        let slot = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| AdapterError::NotFound(format!("{}/{}", collection, id)))?;
        *slot = record;
        Ok(())
    }

    fn delete_record(&self, collection: &str, id: &str) -> AdapterResult<bool> {
        self.ensure_open()?;
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .map_or(false, |records| records.remove(id).is_some()))
    }

    fn find_records(&self, collection: &str, filter: &Map<String, Value>) -> AdapterResult<Vec<Value>> {
        self.ensure_open()?;
        let collections = self.collections.read();
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(records
            .values()
            .filter(|record| filter.iter().all(|(field, expected)| record.get(field) == Some(expected)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn insert(&self, collection: &str, record: Value) -> ServiceResult<String> {
        self.insert_record(collection, record).into_service_result()
    }

    async fn get(&self, collection: &str, id: &str) -> ServiceResult<Value> {
        self.get_record(collection, id).into_service_result()
    }

    async fn update(&self, collection: &str, id: &str, record: Value) -> ServiceResult<()> {
        self.update_record(collection, id, record).into_service_result()
    }

    async fn delete(&self, collection: &str, id: &str) -> ServiceResult<bool> {
        self.delete_record(collection, id).into_service_result()
    }

    async fn find(&self, collection: &str, filter: &Map<String, Value>) -> ServiceResult<Vec<Value>> {
        self.find_records(collection, filter).into_service_result()
    }

    async fn health_check(&self) -> ServiceResult<()> {
        self.ensure_open().into_service_result()
    }
}

#[async_trait]
impl Disposable for InMemoryDatabase {
    async fn dispose(&self) -> Result<(), CoreError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let dropped: usize = self.collections.read().values().map(BTreeMap::len).sum();
            self.collections.write().clear();
            tracing::debug!(records = dropped, "Closed in-memory database");
        }
        Ok(())
    }
}
