use anyhow::{Context, Result};
use clap::Args;
use confique::Config;
use ezballot_core::Identity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Utility function to expand $HOME in a PathBuf
pub fn expand_home_in_path(path: &Path) -> Result<PathBuf> {
    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in path"))?;

    if path_str.contains("$HOME") {
        let expanded = path_str.replace("$HOME", home_dir.to_str().unwrap_or("."));
        Ok(PathBuf::from(expanded))
    } else {
        Ok(path.to_path_buf())
    }
}

#[derive(Config, Clone, Default, Serialize, Deserialize)]
#[config(layer_attr(derive(Args, Serialize, Clone)))]
pub struct NodeConfig {
    #[config(nested, layer_attr(command(flatten)))]
    pub ledger: LedgerSection,

    #[config(nested, layer_attr(command(flatten)))]
    pub relay: RelaySection,

    #[config(nested, layer_attr(command(flatten)))]
    pub storage: StorageSection,
}

#[derive(Clone, Config, Deserialize, Serialize, Default)]
#[config(layer_attr(derive(Args, Clone, Serialize,)))]
pub struct LedgerSection {
    /// Chain id bound into the ledger id and every signed intent
    #[config(default = "ezballot-local", layer_attr(arg(long)))]
    pub chain_id: String,

    /// Admin identity (hex public key), fixed at genesis
    #[config(env = "EZBALLOT_ADMIN", layer_attr(arg(long)))]
    pub admin: Option<String>,

    /// Trusted relay gateway identity (hex public key), fixed at genesis
    #[config(env = "EZBALLOT_TRUSTED_FORWARDER", layer_attr(arg(long)))]
    pub trusted_forwarder: Option<String>,
}

#[derive(Clone, Config, Deserialize, Serialize, Default)]
#[config(layer_attr(derive(Args, Clone, Serialize,)))]
pub struct RelaySection {
    /// Secret key the relay gateway signs submissions with
    #[config(default = "$HOME/.ezballot/relayer.key", layer_attr(arg(long)))]
    pub key_path: PathBuf,
}

#[derive(Clone, Config, Deserialize, Serialize, Default)]
#[config(layer_attr(derive(Args, Clone, Serialize,)))]
pub struct StorageSection {
    /// Ledger snapshot file
    #[config(default = "$HOME/.ezballot/state.cbor", layer_attr(arg(long)))]
    pub state_path: PathBuf,
}

impl NodeConfig {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve all potential $HOME placeholders in configuration paths
    pub fn with_resolved_paths(mut self) -> Result<Self> {
        self.relay.key_path = expand_home_in_path(&self.relay.key_path)?;
        self.storage.state_path = expand_home_in_path(&self.storage.state_path)?;
        Ok(self)
    }

    pub fn admin(&self) -> Result<Option<Identity>> {
        parse_identity(self.ledger.admin.as_deref()).context("ledger.admin")
    }

    pub fn trusted_forwarder(&self) -> Result<Option<Identity>> {
        parse_identity(self.ledger.trusted_forwarder.as_deref())
            .context("ledger.trusted_forwarder")
    }
}

fn parse_identity(value: Option<&str>) -> Result<Option<Identity>> {
    Ok(value.map(Identity::from_hex).transpose()?)
}
