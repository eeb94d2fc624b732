//! Operation request types
//!
//! An [`OperationRequest`] is constructed per incoming call, consumed by a
//! single dispatch and discarded. Entity names are opaque strings resolved
//! against the static catalog at dispatch time.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

/// Kinds of entity operations accepted by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Query => write!(f, "QUERY"),
            OperationKind::Read => write!(f, "READ"),
            OperationKind::Create => write!(f, "CREATE"),
            OperationKind::Update => write!(f, "UPDATE"),
            OperationKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// One row of an entity, possibly a projection
pub type EntityRecord = BTreeMap<String, JsonValue>;

/// Ordered field-name/value pairs uniquely identifying one row.
///
/// Field order is preserved as given by the caller. The key is immutable
/// once constructed; only read accessors are exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey {
    fields: Vec<(String, JsonValue)>,
}

impl EntityKey {
    pub fn new(fields: Vec<(String, JsonValue)>) -> Self {
        Self { fields }
    }

    /// Convenience constructor for the common single-field key
    pub fn single(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            fields: vec![(field.into(), value.into())],
        }
    }

    /// Look up a key field by name
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, JsonValue)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// An abstract entity operation: what to do, against which entity, and in
/// the context of which parent instance (if any)
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub kind: OperationKind,
    /// Target entity name, resolved against the catalog
    pub entity: String,
    /// Parent entity name for scoped (navigation) operations
    pub source_entity: Option<String>,
    /// Key of the parent instance for scoped operations
    pub source_key: Option<EntityKey>,
    /// Key of the target row (Read/Update/Delete)
    pub key: Option<EntityKey>,
    /// Field values for Create/Update
    pub payload: Option<EntityRecord>,
}

impl OperationRequest {
    pub fn query(entity: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Query,
            entity: entity.into(),
            source_entity: None,
            source_key: None,
            key: None,
            payload: None,
        }
    }

    pub fn read(entity: impl Into<String>, key: EntityKey) -> Self {
        Self {
            kind: OperationKind::Read,
            entity: entity.into(),
            source_entity: None,
            source_key: None,
            key: Some(key),
            payload: None,
        }
    }

    pub fn create(entity: impl Into<String>, payload: EntityRecord) -> Self {
        Self {
            kind: OperationKind::Create,
            entity: entity.into(),
            source_entity: None,
            source_key: None,
            key: None,
            payload: Some(payload),
        }
    }

    pub fn update(entity: impl Into<String>, key: EntityKey, payload: EntityRecord) -> Self {
        Self {
            kind: OperationKind::Update,
            entity: entity.into(),
            source_entity: None,
            source_key: None,
            key: Some(key),
            payload: Some(payload),
        }
    }

    pub fn delete(entity: impl Into<String>, key: EntityKey) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity: entity.into(),
            source_entity: None,
            source_key: None,
            key: Some(key),
            payload: None,
        }
    }

    /// Scope this operation under a parent entity instance
    pub fn scoped_under(mut self, source_entity: impl Into<String>, source_key: EntityKey) -> Self {
        self.source_entity = Some(source_entity.into());
        self.source_key = Some(source_key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_key_lookup() {
        let key = EntityKey::new(vec![
            ("SalesOrderID".to_string(), json!("0500000001")),
            ("SOLineItemID".to_string(), json!("10")),
        ]);

        assert_eq!(key.get("SalesOrderID"), Some(&json!("0500000001")));
        assert_eq!(key.get("SOLineItemID"), Some(&json!("10")));
        assert_eq!(key.get("ProductID"), None);
        assert_eq!(key.len(), 2);
    }

    #[test]
    fn test_entity_key_preserves_order() {
        let key = EntityKey::new(vec![
            ("B".to_string(), json!(2)),
            ("A".to_string(), json!(1)),
        ]);

        let names: Vec<&str> = key.field_names().collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_scoped_request() {
        let request = OperationRequest::query("SalesOrderLineItems")
            .scoped_under("SalesOrders", EntityKey::single("SalesOrderID", "0500000001"));

        assert_eq!(request.kind, OperationKind::Query);
        assert_eq!(request.entity, "SalesOrderLineItems");
        assert_eq!(request.source_entity.as_deref(), Some("SalesOrders"));
        assert!(request.source_key.is_some());
        assert!(request.key.is_none());
    }

    #[test]
    fn test_operation_kind_display() {
        assert_eq!(OperationKind::Create.to_string(), "CREATE");
        assert_eq!(OperationKind::Delete.to_string(), "DELETE");
    }
}
