//! Quota category and operation configuration.
//!
//! A gate configuration names quota categories, each made of one or more
//! limit rules, and maps every operation to the categories it draws from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{GateError, Result};
use crate::ratelimit::{Limit, TimeUnit, TokenBucket};

/// Operation name for file reads in the default configuration.
pub const READ_FILE: &str = "read_file";
/// Operation name for address resolution in the default configuration.
pub const RESOLVE_ADDRESS: &str = "resolve_address";

/// Categories and the operations built from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Map of category name to its limits
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryConfig>,
    /// Map of operation name to the categories it must pass
    #[serde(default)]
    pub operations: BTreeMap<String, Vec<String>>,
}

/// A quota category. Several limits compose into one nested limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub limits: Vec<LimitRule>,
}

/// A token bucket rule: `requests_per_unit` events per `unit`, with `burst`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRule {
    /// Number of events allowed per unit of time; zero closes the gate
    pub requests_per_unit: u32,
    /// The time unit
    pub unit: TimeUnit,
    /// Bucket capacity
    pub burst: u32,
    /// Optional name for this limit
    #[serde(default)]
    pub name: Option<String>,
}

impl LimitRule {
    pub fn new(requests_per_unit: u32, unit: TimeUnit, burst: u32) -> Self {
        Self {
            requests_per_unit,
            unit,
            burst,
            name: None,
        }
    }

    pub fn limit(&self) -> Limit {
        Limit::per(self.requests_per_unit, self.unit.duration())
    }

    /// Build the bucket for this rule, naming it after `category` if unnamed.
    pub fn build(&self, category: &str) -> Result<TokenBucket> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{}:{}/{:?}", category, self.requests_per_unit, self.unit));
        TokenBucket::new(self.limit(), self.burst)
            .map(|bucket| bucket.with_name(name))
            .map_err(|e| GateError::InvalidConfiguration(format!("category '{}': {}", category, e)))
    }
}

impl Default for GateConfig {
    /// API, disk and network quotas with file read and address resolve operations.
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            "api".to_string(),
            CategoryConfig {
                limits: vec![
                    LimitRule::new(2, TimeUnit::Second, 2),
                    LimitRule::new(10, TimeUnit::Minute, 10),
                ],
            },
        );
        categories.insert(
            "disk".to_string(),
            CategoryConfig {
                limits: vec![LimitRule::new(1, TimeUnit::Second, 1)],
            },
        );
        categories.insert(
            "network".to_string(),
            CategoryConfig {
                limits: vec![LimitRule::new(3, TimeUnit::Second, 3)],
            },
        );

        let mut operations = BTreeMap::new();
        operations.insert(
            READ_FILE.to_string(),
            vec!["api".to_string(), "disk".to_string()],
        );
        operations.insert(
            RESOLVE_ADDRESS.to_string(),
            vec!["api".to_string(), "network".to_string()],
        );

        Self {
            categories,
            operations,
        }
    }
}

impl GateConfig {
    /// Create an empty configuration.
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
            operations: BTreeMap::new(),
        }
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse gate config: {}", e)))
    }

    /// Add a category, replacing any existing one of the same name.
    pub fn with_category(mut self, name: &str, limits: Vec<LimitRule>) -> Self {
        self.categories
            .insert(name.to_string(), CategoryConfig { limits });
        self
    }

    /// Add an operation drawing from `categories`.
    pub fn with_operation(mut self, name: &str, categories: &[&str]) -> Self {
        self.operations.insert(
            name.to_string(),
            categories.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Check that every operation references known categories.
    pub fn validate(&self) -> Result<()> {
        for (name, category) in &self.categories {
            if category.limits.is_empty() {
                return Err(GateError::InvalidConfiguration(format!(
                    "category '{}' has no limits",
                    name
                )));
            }
        }
        for (operation, categories) in &self.operations {
            if categories.is_empty() {
                return Err(GateError::InvalidConfiguration(format!(
                    "operation '{}' has no categories",
                    operation
                )));
            }
            for (index, category) in categories.iter().enumerate() {
                if categories[..index].contains(category) {
                    return Err(GateError::InvalidConfiguration(format!(
                        "operation '{}' lists category '{}' more than once",
                        operation, category
                    )));
                }
                if !self.categories.contains_key(category) {
                    return Err(GateError::InvalidConfiguration(format!(
                        "operation '{}' references unknown category '{}'",
                        operation, category
                    )));
                }
            }
        }
        info!(
            categories = self.categories.len(),
            operations = self.operations.len(),
            "Gate configuration validated"
        );
        Ok(())
    }
}
