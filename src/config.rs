use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::graph::{VariantConfig, VariantKind, VariantRegistry};
use crate::layout::{ForceParams, NBodyParams};
use crate::source::DEFAULT_LIMIT;
use crate::view::ViewSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub tasks: TasksConfig,
    pub view: ViewSettings,
    pub physics: NBodyParams,
    pub force2d: ForceParams,
    /// Per-kind overrides of the built-in node-type allowlists
    pub variants: BTreeMap<VariantKind, VariantConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: Option<String>,
    pub kind: VariantKind,
    pub limit: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            kind: VariantKind::Policy,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub endpoint: Option<String>,
    pub api_key: String,
    pub llm_assist: bool,
}

impl Config {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("kgscope");
        Ok(config_dir)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Configuration written by `kgscope init`, with placeholders to fill in.
    pub fn starter() -> Self {
        Self {
            source: SourceConfig {
                base_url: Some("http://localhost:8000/api".to_string()),
                ..SourceConfig::default()
            },
            tasks: TasksConfig {
                endpoint: Some("http://localhost:8000/api/tasks".to_string()),
                api_key: "${KGSCOPE_TASK_API_KEY}".to_string(),
                llm_assist: false,
            },
            ..Self::default()
        }
    }

    /// Load configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        config.expand_env_vars();
        Ok(config)
    }

    /// Load from `path` (or the default location), falling back to defaults
    /// when the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Write configuration as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Expand environment variables in configuration values
    fn expand_env_vars(&mut self) {
        self.tasks.api_key = expand_env_var(&self.tasks.api_key);
        if let Some(url) = self.source.base_url.as_mut() {
            *url = expand_env_var(url);
        }
        if let Some(endpoint) = self.tasks.endpoint.as_mut() {
            *endpoint = expand_env_var(endpoint);
        }
    }

    pub fn variant_registry(&self) -> VariantRegistry {
        VariantRegistry::with_overrides(&self.variants)
    }
}

/// Expand environment variable references like ${VAR_NAME}
fn expand_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_default()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Palette;
    use tempfile::tempdir;

    #[test]
    fn test_expand_env_var_braces() {
        // SAFETY: test is single-threaded
        unsafe { std::env::set_var("KGSCOPE_TEST_VAR_A", "value_a") };
        assert_eq!(expand_env_var("${KGSCOPE_TEST_VAR_A}"), "value_a");
        unsafe { std::env::remove_var("KGSCOPE_TEST_VAR_A") };
    }

    #[test]
    fn test_expand_env_var_dollar() {
        unsafe { std::env::set_var("KGSCOPE_TEST_VAR_B", "value_b") };
        assert_eq!(expand_env_var("$KGSCOPE_TEST_VAR_B"), "value_b");
        unsafe { std::env::remove_var("KGSCOPE_TEST_VAR_B") };
    }

    #[test]
    fn test_expand_env_var_literal() {
        assert_eq!(expand_env_var("literal_value"), "literal_value");
        assert_eq!(expand_env_var(""), "");
        assert_eq!(expand_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), "");
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.source.limit, 500);
        assert_eq!(config.view.double_click_ms, 300);
        assert_eq!(config.physics.iterations, 6);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [source]
            base_url = "http://graph.local"
            kind = "market-deep"
            limit = 1200

            [tasks]
            endpoint = "http://tasks.local/submit"
            llm_assist = true

            [view]
            mode = "3d"
            palette = "okabe-ito"
            size_pct = 150.0
            double_click_ms = 250

            [physics]
            repulsion_pct = 80.0
            approximate_above = 1000

            [force2d]
            gravity = 0.02

            [variants.company]
            node_types = ["CompanyEntity", "Keyword"]
            anchor_prefix = "Company"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.source.kind, VariantKind::MarketDeep);
        assert_eq!(config.source.limit, 1200);
        assert!(config.tasks.llm_assist);
        assert_eq!(config.view.mode, crate::layout::LayoutMode::ThreeD);
        assert_eq!(config.view.render.palette, Palette::OkabeIto);
        assert_eq!(config.view.render.size_pct, 150.0);
        assert_eq!(config.view.double_click_ms, 250);
        assert_eq!(config.physics.repulsion_pct, 80.0);
        assert_eq!(config.physics.iterations, 6);
        assert_eq!(config.force2d.gravity, 0.02);

        let registry = config.variant_registry();
        assert!(!registry.get(VariantKind::Company).allows("Policy"));
        assert!(registry.get(VariantKind::Policy).allows("Policy"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_starter_roundtrip_expands_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::starter().save_to(&path).unwrap();

        unsafe { std::env::set_var("KGSCOPE_TASK_API_KEY", "secret") };
        let loaded = Config::load_from(&path).unwrap();
        unsafe { std::env::remove_var("KGSCOPE_TASK_API_KEY") };

        assert_eq!(loaded.tasks.api_key, "secret");
        assert_eq!(loaded.source.base_url.as_deref(), Some("http://localhost:8000/api"));
        assert_eq!(loaded.physics, NBodyParams::default());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[source\nkind = 3").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
