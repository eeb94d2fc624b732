//! EPM Gateway - Entity Data Provider over Split Backends
//!
//! A thin data-provider layer exposing Products, SalesOrders and
//! SalesOrderLineItems. Product lookups are served read-only from a remote
//! OData V2 catalog service; sales orders and their line items live in the
//! local relational store. The dispatcher routes each operation to the
//! right backend, validates parent existence for scoped operations and
//! normalizes every backend failure into one response envelope.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Caller (per request)                      │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │ OperationRequest
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Dispatcher                              │
//! │        route registry · parent validation · normalization        │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │                             │
//!                  ▼                             ▼
//! ┌───────────────────────────┐   ┌───────────────────────────────┐
//! │   RemoteCatalogGateway    │   │       LocalStoreGateway        │
//! │   (OData V2, read-only)   │   │   (Postgres, query/CRUD)       │
//! └───────────────────────────┘   └───────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use epm_gateway::{Dispatcher, GatewayConfig, ODataCatalogClient, PgLocalStore};
//!
//! let config = GatewayConfig::from_file("config/gateway.yaml")?;
//! let remote = Arc::new(ODataCatalogClient::from_config(&config.destination)?);
//! let store = Arc::new(PgLocalStore::connect(&config.database).await?);
//!
//! let dispatcher = Dispatcher::new(remote, store, &config)?;
//! let result = dispatcher.handle(request).await;
//! let envelope = result.into_envelope();
//! ```

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod request;
pub mod response;
pub mod validator;

// Re-export main types
pub use catalog::{EntityCatalog, EntityDef, PRODUCTS, SALES_ORDERS, SALES_ORDER_LINE_ITEMS};
pub use config::{DatabaseConfig, DestinationConfig, GatewayConfig, QueryConfig};
pub use dispatcher::{Dispatcher, RegistryError};
pub use error::{
    normalize, parent_not_found, BackendFailure, DATABASE_CONNECTION_ERROR,
    INTEGRITY_CONSTRAINT_ERROR, REMOTE_FAULT_MESSAGE,
};
pub use gateway::{
    LocalStoreGateway, ODataCatalogClient, OrderBy, OrderDirection, PgLocalStore, QueryFilter,
    RemoteCatalogGateway,
};
pub use request::{EntityKey, EntityRecord, OperationKind, OperationRequest};
pub use response::{FailureBody, OperationResult, ResponseEnvelope, ResultData, Severity};
pub use validator::ParentValidator;
