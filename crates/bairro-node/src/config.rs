//! Node configuration.
//!
//! Loaded from a TOML file; every section has defaults, so an empty file
//! describes a development chain.

use std::path::{Path, PathBuf};

use bairro_governance::Deployment;
use bairro_types::{Address, UNIT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
    /// Persisted chain state (JSON)
    pub state_file: PathBuf,
    pub logging: LoggingConfig,
    /// Used by `init` to deploy a fresh chain
    pub deployment: Deployment,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "bairro-dev".to_string(),
            state_file: PathBuf::from("./bairro-state.json"),
            logging: LoggingConfig::default(),
            deployment: dev_deployment(),
        }
    }
}

/// Three self-delegated holders and a funded escrow.
fn dev_deployment() -> Deployment {
    Deployment::new(Address::from_label("deployer"), Address::from_label("provider"))
        .with_treasury_funds(100 * UNIT)
        .allocate(Address::from_label("alice"), 50 * UNIT)
        .allocate(Address::from_label("bob"), 30 * UNIT)
        .allocate(Address::from_label("carol"), 20 * UNIT)
}

fn check_path(path: &Path) -> anyhow::Result<()> {
    if path.to_string_lossy().contains("..") {
        anyhow::bail!("Invalid path: directory traversal detected");
    }
    Ok(())
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        check_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: NodeConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        check_path(path)?;
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        check_path(&self.state_file)?;
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("Unknown log format '{}' (expected pretty or json)", self.logging.format);
        }
        self.deployment.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_file: Option<PathBuf>,
    /// json | pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_file: None,
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn json(&self) -> bool {
        self.format == "json"
    }
}
