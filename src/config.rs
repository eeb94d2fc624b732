//! Gateway configuration
//!
//! Loads destination and database settings from YAML and provides
//! strongly-typed access to them. The connection string itself never lives
//! in the file; the configuration only names the environment variable that
//! carries it.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::gateway::store::OrderDirection;

/// Root configuration structure for the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub destination: DestinationConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Remote catalog destination
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    /// Base URL of the remote service host
    pub base_url: String,
    /// Service root path, e.g. "/sap/opu/odata/IWBEP/GWSAMPLE_BASIC"
    pub service_path: String,
    /// Entity set serving product lookups
    pub product_entity_set: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub connection_string_env: String,
}

/// Collection query behavior
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryConfig {
    /// Direction applied to the order-by clause of collection queries
    #[serde(default)]
    pub order_direction: OrderDirection,
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse gateway configuration")
    }
}
