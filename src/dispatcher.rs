//! Entity operation dispatcher
//!
//! Routes an incoming [`OperationRequest`] to the correct backend through
//! an explicit route registry keyed by (entity, kind, optional source
//! entity). The registry is built at startup and cross-checked against the
//! catalog's declared operations: every declared operation has exactly one
//! handler and no handler exists without a declaration.
//!
//! Scoped routes validate parent existence before touching the child
//! entity. Every gateway failure is converted to exactly one Failure result
//! at this boundary; nothing propagates past `handle`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{EntityCatalog, EntityDef, PRODUCTS, SALES_ORDERS, SALES_ORDER_LINE_ITEMS};
use crate::config::GatewayConfig;
use crate::error::{normalize, parent_not_found};
use crate::gateway::remote::RemoteCatalogGateway;
use crate::gateway::store::{LocalStoreGateway, OrderBy, OrderDirection, QueryFilter};
use crate::request::{OperationKind, OperationRequest};
use crate::response::{FailureBody, OperationResult};
use crate::validator::ParentValidator;

/// Projection applied to every product lookup
const PRODUCT_PROJECTION: &[&str] = &["ProductID", "Name", "Description", "Category"];

type RouteKey = (&'static str, OperationKind, Option<&'static str>);

/// Handler bound to one (entity, kind, source) combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Read one product from the remote catalog
    ProductRead,
    /// Read the product referenced by a sales order line item
    ProductReadForLineItem,
    /// Unscoped collection query against the local store
    StoreQuery,
    /// Key-based read against the local store
    StoreRead,
    StoreCreate,
    StoreUpdate,
    StoreDelete,
    /// Line items of one sales order
    LineItemQueryForOrder,
    /// Insert a line item under an existing sales order
    LineItemCreateForOrder,
}

fn route_label(entity: &str, kind: OperationKind, source: Option<&str>) -> String {
    match source {
        Some(source) => format!("{kind} {entity} scoped under {source}"),
        None => format!("{kind} {entity}"),
    }
}

/// Errors detected while building the route registry at startup
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate handler for route {0}")]
    DuplicateHandler(String),

    #[error("handler for route {0} is not declared in the catalog")]
    UndeclaredRoute(String),

    #[error("no handler registered for declared operation {0}")]
    MissingHandler(String),
}

/// Mapping from (entity, kind, source) to handlers, validated for
/// completeness and uniqueness against the catalog declarations
struct RouteRegistry {
    routes: HashMap<RouteKey, Route>,
}

impl RouteRegistry {
    fn handler_table() -> &'static [(RouteKey, Route)] {
        use OperationKind::*;
        &[
            ((PRODUCTS, Read, None), Route::ProductRead),
            (
                (PRODUCTS, Read, Some(SALES_ORDER_LINE_ITEMS)),
                Route::ProductReadForLineItem,
            ),
            ((SALES_ORDERS, Query, None), Route::StoreQuery),
            ((SALES_ORDERS, Read, None), Route::StoreRead),
            ((SALES_ORDERS, Create, None), Route::StoreCreate),
            ((SALES_ORDERS, Update, None), Route::StoreUpdate),
            ((SALES_ORDERS, Delete, None), Route::StoreDelete),
            ((SALES_ORDER_LINE_ITEMS, Query, None), Route::StoreQuery),
            ((SALES_ORDER_LINE_ITEMS, Read, None), Route::StoreRead),
            ((SALES_ORDER_LINE_ITEMS, Create, None), Route::StoreCreate),
            (
                (SALES_ORDER_LINE_ITEMS, Query, Some(SALES_ORDERS)),
                Route::LineItemQueryForOrder,
            ),
            (
                (SALES_ORDER_LINE_ITEMS, Create, Some(SALES_ORDERS)),
                Route::LineItemCreateForOrder,
            ),
        ]
    }

    fn build(catalog: &EntityCatalog) -> Result<Self, RegistryError> {
        let mut routes = HashMap::new();

        for ((entity, kind, source), route) in Self::handler_table() {
            let label = || route_label(entity, *kind, *source);
            let declared = catalog
                .get(entity)
                .is_some_and(|def| def.operations.contains(&(*kind, *source)));
            if !declared {
                return Err(RegistryError::UndeclaredRoute(label()));
            }
            if routes.insert((*entity, *kind, *source), *route).is_some() {
                return Err(RegistryError::DuplicateHandler(label()));
            }
        }

        for def in catalog.all() {
            for (kind, source) in def.operations {
                if !routes.contains_key(&(def.name, *kind, *source)) {
                    return Err(RegistryError::MissingHandler(route_label(
                        def.name, *kind, *source,
                    )));
                }
            }
        }

        Ok(Self { routes })
    }

    fn get(
        &self,
        entity: &'static str,
        kind: OperationKind,
        source: Option<&'static str>,
    ) -> Option<Route> {
        self.routes.get(&(entity, kind, source)).copied()
    }
}

/// Render a key value the way it appears in a key predicate
fn key_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Request-shape problems surface their message directly
fn invalid_request(message: String) -> OperationResult {
    OperationResult::failure(FailureBody::new(500, message))
}

/// Routes entity operations to the two backend gateways and wraps every
/// outcome in a normalized response. Holds no per-request state.
pub struct Dispatcher<R, S> {
    remote: Arc<R>,
    store: Arc<S>,
    validator: ParentValidator<S>,
    catalog: EntityCatalog,
    registry: RouteRegistry,
    product_entity_set: String,
    order_direction: OrderDirection,
}

impl<R, S> Dispatcher<R, S>
where
    R: RemoteCatalogGateway,
    S: LocalStoreGateway,
{
    pub fn new(remote: Arc<R>, store: Arc<S>, config: &GatewayConfig) -> Result<Self, RegistryError> {
        let catalog = EntityCatalog::standard();
        let registry = RouteRegistry::build(&catalog)?;

        Ok(Self {
            validator: ParentValidator::new(Arc::clone(&store)),
            remote,
            store,
            catalog,
            registry,
            product_entity_set: config.destination.product_entity_set.clone(),
            order_direction: config.query.order_direction,
        })
    }

    /// Dispatch one operation. Always returns exactly one result.
    pub async fn handle(&self, request: OperationRequest) -> OperationResult {
        debug!(kind = %request.kind, entity = %request.entity, "dispatching operation");

        let Some(entity) = self.catalog.get(&request.entity) else {
            return OperationResult::failure(FailureBody::new(
                404,
                format!("Unknown entity '{}'", request.entity),
            ));
        };

        let source = match request.source_entity.as_deref() {
            Some(name) => match self.catalog.get(name) {
                Some(def) => Some(def),
                None => {
                    return OperationResult::failure(FailureBody::new(
                        404,
                        format!("Unknown source entity '{name}'"),
                    ));
                }
            },
            None => None,
        };

        let Some(route) = self
            .registry
            .get(entity.name, request.kind, source.map(|def| def.name))
        else {
            return OperationResult::failure(FailureBody::new(
                501,
                format!(
                    "No handler registered for {}",
                    route_label(entity.name, request.kind, source.map(|def| def.name))
                ),
            ));
        };

        match route {
            Route::ProductRead => self.read_product(entity, &request).await,
            Route::ProductReadForLineItem => self.read_product_for_line_item(source, &request).await,
            Route::StoreQuery => self.query_collection(entity).await,
            Route::StoreRead => self.read_row(entity, &request).await,
            Route::StoreCreate => self.create_row(entity, &request).await,
            Route::StoreUpdate => self.update_row(entity, &request).await,
            Route::StoreDelete => self.delete_row(entity, &request).await,
            Route::LineItemQueryForOrder => {
                self.query_line_items_for_order(entity, source, &request).await
            }
            Route::LineItemCreateForOrder => {
                self.create_line_item_for_order(entity, source, &request).await
            }
        }
    }

    fn order_by(&self, entity: &EntityDef) -> OrderBy {
        OrderBy {
            field: entity.order_field,
            direction: self.order_direction,
        }
    }

    async fn read_product_by_id(&self, product_id: &str) -> OperationResult {
        debug!(product_id, "reading product from remote catalog");
        match self
            .remote
            .read_one(&self.product_entity_set, product_id, PRODUCT_PROJECTION)
            .await
        {
            Ok(record) => OperationResult::success_record(record),
            Err(failure) => normalize(&failure),
        }
    }

    async fn read_product(&self, entity: &EntityDef, request: &OperationRequest) -> OperationResult {
        let Some(key) = &request.key else {
            return invalid_request(format!("READ {} requires a key", entity.name));
        };
        let Some(value) = key.get(entity.key_field) else {
            return invalid_request(format!(
                "READ {} requires key field {}",
                entity.name, entity.key_field
            ));
        };

        self.read_product_by_id(&key_literal(value)).await
    }

    async fn read_product_for_line_item(
        &self,
        source: Option<&EntityDef>,
        request: &OperationRequest,
    ) -> OperationResult {
        let Some(parent) = source else {
            return invalid_request("scoped READ requires a source entity".to_string());
        };
        let Some(source_key) = &request.source_key else {
            return invalid_request(format!("scoped READ requires a {} key", parent.name));
        };

        match self
            .validator
            .resolve_parent(parent, source_key, &["ProductID"])
            .await
        {
            Ok(Some(parent_row)) => {
                let Some(product_id) = parent_row.get("ProductID") else {
                    return invalid_request(format!(
                        "parent {} row carries no ProductID",
                        parent.singular
                    ));
                };
                self.read_product_by_id(&key_literal(product_id)).await
            }
            Ok(None) => parent_not_found(parent.singular),
            Err(failure) => normalize(&failure),
        }
    }

    async fn query_collection(&self, entity: &EntityDef) -> OperationResult {
        match self.store.query(entity, None, self.order_by(entity)).await {
            Ok(records) => OperationResult::success_records(records),
            Err(failure) => normalize(&failure),
        }
    }

    async fn read_row(&self, entity: &EntityDef, request: &OperationRequest) -> OperationResult {
        let Some(key) = &request.key else {
            return invalid_request(format!("READ {} requires a key", entity.name));
        };
        if let Some(field) = entity.undeclared_field(key.field_names()) {
            return invalid_request(format!(
                "field '{field}' is not declared on entity {}",
                entity.name
            ));
        }

        match self.store.read_one(entity, key, entity.fields).await {
            Ok(Some(record)) => OperationResult::success_record(record),
            // A missing row is a normal empty result for key-based reads
            Ok(None) => OperationResult::success_empty(),
            Err(failure) => normalize(&failure),
        }
    }

    async fn create_row(&self, entity: &EntityDef, request: &OperationRequest) -> OperationResult {
        let Some(payload) = &request.payload else {
            return invalid_request(format!("CREATE {} requires a payload", entity.name));
        };
        if let Some(field) = entity.undeclared_field(payload.keys().map(String::as_str)) {
            return invalid_request(format!(
                "field '{field}' is not declared on entity {}",
                entity.name
            ));
        }

        match self.store.insert(entity, payload).await {
            Ok(record) => OperationResult::success_record(record),
            Err(failure) => normalize(&failure),
        }
    }

    async fn update_row(&self, entity: &EntityDef, request: &OperationRequest) -> OperationResult {
        let Some(key) = &request.key else {
            return invalid_request(format!("UPDATE {} requires a key", entity.name));
        };
        let Some(payload) = &request.payload else {
            return invalid_request(format!("UPDATE {} requires a payload", entity.name));
        };
        let names = payload.keys().map(String::as_str).chain(key.field_names());
        if let Some(field) = entity.undeclared_field(names) {
            return invalid_request(format!(
                "field '{field}' is not declared on entity {}",
                entity.name
            ));
        }

        match self.store.update(entity, payload, key).await {
            Ok(()) => OperationResult::success_empty(),
            Err(failure) => normalize(&failure),
        }
    }

    async fn delete_row(&self, entity: &EntityDef, request: &OperationRequest) -> OperationResult {
        let Some(key) = &request.key else {
            return invalid_request(format!("DELETE {} requires a key", entity.name));
        };

        match self.store.delete(entity, key).await {
            Ok(()) => OperationResult::success_empty(),
            Err(failure) => normalize(&failure),
        }
    }

    async fn query_line_items_for_order(
        &self,
        entity: &EntityDef,
        source: Option<&EntityDef>,
        request: &OperationRequest,
    ) -> OperationResult {
        let Some(parent) = source else {
            return invalid_request("scoped QUERY requires a source entity".to_string());
        };
        let Some(source_key) = &request.source_key else {
            return invalid_request(format!("scoped QUERY requires a {} key", parent.name));
        };
        let Some(order_id) = source_key.get(parent.key_field) else {
            return invalid_request(format!(
                "scoped QUERY requires source key field {}",
                parent.key_field
            ));
        };

        match self
            .validator
            .resolve_parent(parent, source_key, &[parent.key_field])
            .await
        {
            Ok(Some(_)) => {
                let filter = QueryFilter {
                    field: parent.key_field,
                    value: order_id.clone(),
                };
                match self
                    .store
                    .query(entity, Some(&filter), self.order_by(entity))
                    .await
                {
                    Ok(records) => OperationResult::success_records(records),
                    Err(failure) => normalize(&failure),
                }
            }
            Ok(None) => parent_not_found(parent.singular),
            Err(failure) => normalize(&failure),
        }
    }

    async fn create_line_item_for_order(
        &self,
        entity: &EntityDef,
        source: Option<&EntityDef>,
        request: &OperationRequest,
    ) -> OperationResult {
        let Some(parent) = source else {
            return invalid_request("scoped CREATE requires a source entity".to_string());
        };
        let Some(source_key) = &request.source_key else {
            return invalid_request(format!("scoped CREATE requires a {} key", parent.name));
        };
        let Some(payload) = &request.payload else {
            return invalid_request(format!("CREATE {} requires a payload", entity.name));
        };
        if let Some(field) = entity.undeclared_field(payload.keys().map(String::as_str)) {
            return invalid_request(format!(
                "field '{field}' is not declared on entity {}",
                entity.name
            ));
        }

        match self
            .validator
            .resolve_parent(parent, source_key, &[parent.key_field])
            .await
        {
            Ok(Some(_)) => {
                // TODO: cross-check the payload SalesOrderID against the parent key before insert
                match self.store.insert(entity, payload).await {
                    Ok(record) => OperationResult::success_record(record),
                    Err(failure) => normalize(&failure),
                }
            }
            Ok(None) => parent_not_found(parent.singular),
            Err(failure) => normalize(&failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_for_standard_catalog() {
        let catalog = EntityCatalog::standard();
        let registry = RouteRegistry::build(&catalog).unwrap();

        let declared: usize = catalog.all().map(|def| def.operations.len()).sum();
        assert_eq!(registry.routes.len(), declared);
    }

    #[test]
    fn test_registry_routes_scoped_and_unscoped_separately() {
        let registry = RouteRegistry::build(&EntityCatalog::standard()).unwrap();

        assert_eq!(
            registry.get(SALES_ORDER_LINE_ITEMS, OperationKind::Query, None),
            Some(Route::StoreQuery)
        );
        assert_eq!(
            registry.get(
                SALES_ORDER_LINE_ITEMS,
                OperationKind::Query,
                Some(SALES_ORDERS)
            ),
            Some(Route::LineItemQueryForOrder)
        );
        assert_eq!(registry.get(PRODUCTS, OperationKind::Query, None), None);
        assert_eq!(registry.get(PRODUCTS, OperationKind::Delete, None), None);
    }

    #[test]
    fn test_route_label() {
        assert_eq!(
            route_label(PRODUCTS, OperationKind::Read, None),
            "READ Products"
        );
        assert_eq!(
            route_label(
                SALES_ORDER_LINE_ITEMS,
                OperationKind::Query,
                Some(SALES_ORDERS)
            ),
            "QUERY SalesOrderLineItems scoped under SalesOrders"
        );
    }

    #[test]
    fn test_key_literal_strips_json_quoting() {
        assert_eq!(key_literal(&serde_json::json!("HT-1000")), "HT-1000");
        assert_eq!(key_literal(&serde_json::json!(42)), "42");
    }
}
