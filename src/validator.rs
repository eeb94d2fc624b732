//! Parent-existence validation for scoped operations
//!
//! A scoped operation must confirm its parent row exists before touching
//! the child entity. The check is a key-based read restricted to the fields
//! the caller actually needs, so deciding existence or extracting a foreign
//! key never fetches a full row.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::EntityDef;
use crate::error::BackendFailure;
use crate::gateway::store::LocalStoreGateway;
use crate::request::{EntityKey, EntityRecord};

/// Resolves a referenced parent row before a scoped operation proceeds
pub struct ParentValidator<S> {
    store: Arc<S>,
}

impl<S: LocalStoreGateway> ParentValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Key-based read restricted to `projection`.
    ///
    /// `Ok(None)` means the parent does not exist; backend failures stay
    /// failures, so callers can tell "absent" apart from "broken".
    pub async fn resolve_parent(
        &self,
        entity: &EntityDef,
        key: &EntityKey,
        projection: &[&str],
    ) -> Result<Option<EntityRecord>, BackendFailure> {
        debug!(entity = entity.name, "checking parent existence");
        self.store.read_one(entity, key, projection).await
    }
}
