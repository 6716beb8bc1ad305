//! Optional TOML configuration
//!
//! ```toml
//! max_depth = 1024
//! default_label = "Contract"
//! registry = "contracts.json"
//!
//! [chains]
//! ethereum = "http://localhost:8545"
//! ```
//!
//! Command-line flags take precedence over values from the file.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub max_depth: Option<usize>,
    pub default_label: Option<String>,
    /// Chain name to JSON-RPC endpoint
    pub chains: BTreeMap<String, String>,
    pub registry: Option<PathBuf>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid TOML in {}: {}", path.display(), e))
    }

    /// Load `path` if given, otherwise use defaults
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Endpoints with `rpc_url` taking the place of the configured one for `chain`
    pub fn endpoints(&self, chain: &str, rpc_url: Option<&str>) -> BTreeMap<String, String> {
        let mut endpoints = self.chains.clone();
        if let Some(url) = rpc_url {
            endpoints.insert(chain.to_string(), url.to_string());
        }
        endpoints
    }
}
