use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ExplorerError;

/// One of the supported graph views.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    #[default]
    Policy,
    Social,
    Market,
    MarketDeep,
    Company,
    Product,
    Operation,
}

impl VariantKind {
    pub const ALL: [VariantKind; 7] = [
        VariantKind::Policy,
        VariantKind::Social,
        VariantKind::Market,
        VariantKind::MarketDeep,
        VariantKind::Company,
        VariantKind::Product,
        VariantKind::Operation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Policy => "policy",
            VariantKind::Social => "social",
            VariantKind::Market => "market",
            VariantKind::MarketDeep => "market-deep",
            VariantKind::Company => "company",
            VariantKind::Product => "product",
            VariantKind::Operation => "operation",
        }
    }

    /// Built-in allowlist and anchor prefix for this kind.
    pub fn default_config(&self) -> VariantConfig {
        let (types, anchor): (&[&str], Option<&str>) = match self {
            VariantKind::Policy => (
                &["Policy", "PolicyType", "State", "Keyword", "Entity", "Agency"],
                None,
            ),
            VariantKind::Social => (
                &["SocialPost", "Platform", "State", "Keyword", "Entity", "Game"],
                None,
            ),
            VariantKind::Market => (
                &["MarketReport", "Game", "State", "Keyword", "Entity"],
                None,
            ),
            VariantKind::MarketDeep => (
                &[
                    "MarketReport",
                    "MarketMetric",
                    "Game",
                    "State",
                    "Period",
                    "Keyword",
                    "Entity",
                ],
                None,
            ),
            VariantKind::Company => (
                &[
                    "CompanyEntity",
                    "CompanyNews",
                    "CompanyProduct",
                    "Policy",
                    "State",
                    "Keyword",
                    "Entity",
                ],
                Some("Company"),
            ),
            VariantKind::Product => (
                &["ProductEntity", "ProductRelease", "Game", "CompanyEntity", "Keyword", "Entity"],
                Some("Product"),
            ),
            VariantKind::Operation => (
                &["OperationEvent", "OperationChannel", "State", "Game", "Keyword", "Entity"],
                Some("Operation"),
            ),
        };

        VariantConfig {
            node_types: types.iter().map(|t| t.to_string()).collect(),
            anchor_prefix: anchor.map(String::from),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariantKind {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        VariantKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ExplorerError::UnknownKind(s.to_string()))
    }
}

/// Default node-type allowlist and optional anchor prefix of a graph kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub node_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_prefix: Option<String>,
}

impl VariantConfig {
    #[cfg(test)]
    pub fn allows(&self, node_type: &str) -> bool {
        self.node_types.iter().any(|t| t == node_type)
    }

    pub fn allowed_types(&self) -> HashSet<&str> {
        self.node_types.iter().map(String::as_str).collect()
    }

    pub fn is_anchor(&self, node_type: &str) -> bool {
        self.anchor_prefix
            .as_deref()
            .is_some_and(|prefix| !prefix.is_empty() && node_type.starts_with(prefix))
    }
}

/// Variant configs by kind: built-ins, optionally overridden from config.
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    configs: BTreeMap<VariantKind, VariantConfig>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self {
            configs: VariantKind::ALL
                .into_iter()
                .map(|kind| (kind, kind.default_config()))
                .collect(),
        }
    }

    /// Built-ins with any configured overrides applied on top.
    pub fn with_overrides(overrides: &BTreeMap<VariantKind, VariantConfig>) -> Self {
        let mut registry = Self::new();
        for (kind, config) in overrides {
            registry.configs.insert(*kind, config.clone());
        }
        registry
    }

    pub fn get(&self, kind: VariantKind) -> &VariantConfig {
        // Every kind is seeded in `new`
        &self.configs[&kind]
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in VariantKind::ALL {
            assert_eq!(kind.as_str().parse::<VariantKind>().unwrap(), kind);
        }
        assert_eq!("market_deep".parse::<VariantKind>().unwrap(), VariantKind::MarketDeep);
        assert_eq!("Company".parse::<VariantKind>().unwrap(), VariantKind::Company);
        assert!("lottery".parse::<VariantKind>().is_err());
    }

    #[test]
    fn test_company_anchor_prefix() {
        let config = VariantKind::Company.default_config();
        assert!(config.is_anchor("CompanyEntity"));
        assert!(config.is_anchor("CompanyNews"));
        assert!(!config.is_anchor("Policy"));
        assert!(config.allows("Policy"));
    }

    #[test]
    fn test_unanchored_kinds() {
        let config = VariantKind::Policy.default_config();
        assert!(config.anchor_prefix.is_none());
        assert!(!config.is_anchor("Policy"));
    }

    #[test]
    fn test_empty_prefix_never_anchors() {
        let config = VariantConfig {
            node_types: vec!["A".into()],
            anchor_prefix: Some(String::new()),
        };
        assert!(!config.is_anchor("A"));
    }

    #[test]
    fn test_registry_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            VariantKind::Social,
            VariantConfig {
                node_types: vec!["Tweet".into()],
                anchor_prefix: Some("Tweet".into()),
            },
        );
        let registry = VariantRegistry::with_overrides(&overrides);
        assert_eq!(registry.get(VariantKind::Social).node_types, vec!["Tweet"]);
        assert_eq!(
            registry.get(VariantKind::Policy),
            &VariantKind::Policy.default_config()
        );
    }
}
