//! Static entity catalog
//!
//! Declares the entities served by the gateway and resolves the opaque
//! entity names carried by incoming requests. Each declaration carries the
//! backing namespace, the declared field list and the operations the entity
//! supports, so both the route registry and the SQL layer only ever see
//! identifiers that originate here.

use crate::request::OperationKind;

pub const PRODUCTS: &str = "Products";
pub const SALES_ORDERS: &str = "SalesOrders";
pub const SALES_ORDER_LINE_ITEMS: &str = "SalesOrderLineItems";

/// Declaration of a single catalog entity
#[derive(Debug, Clone)]
pub struct EntityDef {
    /// Entity set name used in requests
    pub name: &'static str,
    /// Singular label used in caller-facing messages
    pub singular: &'static str,
    /// Namespace qualifying the backing table, e.g. "EPMSample"
    pub namespace: &'static str,
    /// Primary key field
    pub key_field: &'static str,
    /// Field applied to the order-by clause of collection queries
    pub order_field: &'static str,
    /// Declared fields, key first
    pub fields: &'static [&'static str],
    /// Supported operations with the optional parent entity a scoped
    /// variant is served under
    pub operations: &'static [(OperationKind, Option<&'static str>)],
}

impl EntityDef {
    /// Fully qualified name, e.g. "EPMSample.SalesOrders"
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }

    /// First field outside the declared schema, if any
    pub fn undeclared_field<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<&'a str> {
        names.into_iter().find(|name| !self.has_field(name))
    }
}

static ENTITIES: &[EntityDef] = &[
    EntityDef {
        name: PRODUCTS,
        singular: "Product",
        namespace: "EPMSample",
        key_field: "ProductID",
        order_field: "ProductID",
        fields: &["ProductID", "Name", "Description", "Category"],
        operations: &[
            (OperationKind::Read, None),
            (OperationKind::Read, Some(SALES_ORDER_LINE_ITEMS)),
        ],
    },
    EntityDef {
        name: SALES_ORDERS,
        singular: "SalesOrder",
        namespace: "EPMSample",
        key_field: "SalesOrderID",
        order_field: "SalesOrderID",
        fields: &[
            "SalesOrderID",
            "CustomerName",
            "CurrencyCode",
            "GrossAmount",
            "NetAmount",
            "TaxAmount",
            "LifecycleStatus",
        ],
        operations: &[
            (OperationKind::Query, None),
            (OperationKind::Read, None),
            (OperationKind::Create, None),
            (OperationKind::Update, None),
            (OperationKind::Delete, None),
        ],
    },
    EntityDef {
        name: SALES_ORDER_LINE_ITEMS,
        singular: "SalesOrderLineItem",
        namespace: "EPMSample",
        key_field: "SOLineItemID",
        order_field: "SOLineItemID",
        fields: &[
            "SOLineItemID",
            "SalesOrderID",
            "ProductID",
            "Quantity",
            "QuantityUnit",
            "GrossAmount",
        ],
        operations: &[
            (OperationKind::Query, None),
            (OperationKind::Query, Some(SALES_ORDERS)),
            (OperationKind::Read, None),
            (OperationKind::Create, None),
            (OperationKind::Create, Some(SALES_ORDERS)),
        ],
    },
];

/// Immutable lookup over the declared entities
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    entities: &'static [EntityDef],
}

impl EntityCatalog {
    /// Catalog of the three entities served by this gateway
    pub fn standard() -> Self {
        Self { entities: ENTITIES }
    }

    /// Resolve an opaque entity name
    pub fn get(&self, name: &str) -> Option<&'static EntityDef> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.iter().map(|entity| entity.name)
    }

    pub fn all(&self) -> impl Iterator<Item = &'static EntityDef> + '_ {
        self.entities.iter()
    }
}

impl Default for EntityCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
