//! Backend gateway traits and production adapters
//!
//! The dispatcher talks to two data sources through these trait seams: a
//! remote read-only catalog service and the local relational store. Tests
//! substitute in-memory doubles for both.

pub mod remote;
pub mod store;

pub use remote::{ODataCatalogClient, RemoteCatalogGateway};
pub use store::{LocalStoreGateway, OrderBy, OrderDirection, PgLocalStore, QueryFilter};
