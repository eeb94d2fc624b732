//! In-memory gateway doubles for dispatcher tests
//!
//! Both mocks record every call they receive so tests can assert not only
//! on results but on which backend operations were (or were not) issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use epm_gateway::{
    BackendFailure, DatabaseConfig, DestinationConfig, Dispatcher, EntityDef, EntityKey,
    EntityRecord, GatewayConfig, LocalStoreGateway, OrderBy, OrderDirection, QueryConfig,
    QueryFilter, RemoteCatalogGateway,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn record(fields: &[(&str, JsonValue)]) -> EntityRecord {
    fields
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

fn project(row: &EntityRecord, projection: &[&str]) -> EntityRecord {
    projection
        .iter()
        .filter_map(|field| {
            row.get(*field)
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect()
}

fn matches_key(row: &EntityRecord, key: &EntityKey) -> bool {
    key.iter().all(|(field, value)| row.get(field) == Some(value))
}

fn take_failure(slot: &Mutex<Option<BackendFailure>>) -> Option<BackendFailure> {
    slot.lock().unwrap().take()
}

fn sort_key(row: &EntityRecord, field: &str) -> String {
    match row.get(field) {
        Some(JsonValue::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Remote catalog double: products keyed by ProductID
#[derive(Default)]
pub struct MockCatalog {
    products: Mutex<HashMap<String, EntityRecord>>,
    fail_next: Mutex<Option<BackendFailure>>,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn with_product(self, id: &str, fields: &[(&str, JsonValue)]) -> Self {
        self.products
            .lock()
            .unwrap()
            .insert(id.to_string(), record(fields));
        self
    }

    pub fn fail_next_with(&self, failure: BackendFailure) {
        *self.fail_next.lock().unwrap() = Some(failure);
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteCatalogGateway for MockCatalog {
    async fn query(
        &self,
        entity_set: &str,
        projection: &[&str],
    ) -> Result<Vec<EntityRecord>, BackendFailure> {
        self.calls.lock().unwrap().push(format!("query:{entity_set}"));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        let products = self.products.lock().unwrap();
        let mut ids: Vec<&String> = products.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .map(|id| project(&products[id], projection))
            .collect())
    }

    async fn read_one(
        &self,
        entity_set: &str,
        key: &str,
        projection: &[&str],
    ) -> Result<EntityRecord, BackendFailure> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("read_one:{entity_set}:{key}"));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        self.products
            .lock()
            .unwrap()
            .get(key)
            .map(|row| project(row, projection))
            .ok_or_else(|| BackendFailure::protocol(format!("no product '{key}'")))
    }
}

/// Local store double: rows grouped by entity name
#[derive(Default)]
pub struct MockStore {
    rows: Mutex<HashMap<String, Vec<EntityRecord>>>,
    fail_next: Mutex<Option<BackendFailure>>,
    calls: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn with_row(self, entity: &str, fields: &[(&str, JsonValue)]) -> Self {
        self.rows
            .lock()
            .unwrap()
            .entry(entity.to_string())
            .or_default()
            .push(record(fields));
        self
    }

    pub fn fail_next_with(&self, failure: BackendFailure) {
        *self.fail_next.lock().unwrap() = Some(failure);
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalStoreGateway for MockStore {
    async fn query(
        &self,
        entity: &EntityDef,
        filter: Option<&QueryFilter>,
        order: OrderBy,
    ) -> Result<Vec<EntityRecord>, BackendFailure> {
        self.calls.lock().unwrap().push(format!("query:{}", entity.name));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<EntityRecord> = rows
            .get(entity.name)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        filter.is_none_or(|filter| row.get(filter.field) == Some(&filter.value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by_key(|row| sort_key(row, order.field));
        if order.direction == OrderDirection::Descending {
            matched.reverse();
        }
        Ok(matched)
    }

    async fn read_one(
        &self,
        entity: &EntityDef,
        key: &EntityKey,
        projection: &[&str],
    ) -> Result<Option<EntityRecord>, BackendFailure> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("read_one:{}", entity.name));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(entity.name)
            .and_then(|rows| rows.iter().find(|row| matches_key(row, key)))
            .map(|row| project(row, projection)))
    }

    async fn insert(
        &self,
        entity: &EntityDef,
        payload: &EntityRecord,
    ) -> Result<EntityRecord, BackendFailure> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("insert:{}", entity.name));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        self.rows
            .lock()
            .unwrap()
            .entry(entity.name.to_string())
            .or_default()
            .push(payload.clone());
        Ok(payload.clone())
    }

    async fn update(
        &self,
        entity: &EntityDef,
        payload: &EntityRecord,
        key: &EntityKey,
    ) -> Result<(), BackendFailure> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update:{}", entity.name));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        if let Some(rows) = self.rows.lock().unwrap().get_mut(entity.name) {
            for row in rows.iter_mut().filter(|row| matches_key(row, key)) {
                for (field, value) in payload {
                    row.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, entity: &EntityDef, key: &EntityKey) -> Result<(), BackendFailure> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete:{}", entity.name));
        if let Some(failure) = take_failure(&self.fail_next) {
            return Err(failure);
        }

        if let Some(rows) = self.rows.lock().unwrap().get_mut(entity.name) {
            rows.retain(|row| !matches_key(row, key));
        }
        Ok(())
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        destination: DestinationConfig {
            base_url: "https://backend.example.com".to_string(),
            service_path: "/sap/opu/odata/IWBEP/GWSAMPLE_BASIC".to_string(),
            product_entity_set: "ProductSet".to_string(),
            timeout_secs: 5,
        },
        database: DatabaseConfig {
            connection_string_env: "DATABASE_URL".to_string(),
        },
        query: QueryConfig {
            order_direction: OrderDirection::Descending,
        },
    }
}

/// Wire a dispatcher over the two mocks, handing the mocks back for
/// call-log assertions
pub fn build_dispatcher(
    remote: MockCatalog,
    store: MockStore,
) -> (
    Arc<MockCatalog>,
    Arc<MockStore>,
    Dispatcher<MockCatalog, MockStore>,
) {
    let remote = Arc::new(remote);
    let store = Arc::new(store);
    let dispatcher = Dispatcher::new(Arc::clone(&remote), Arc::clone(&store), &test_config())
        .expect("route registry must build");
    (remote, store, dispatcher)
}
