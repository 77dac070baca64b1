//! Operator configuration (`setto-admin.toml`).
//!
//! Every section and field is optional. Command-line flags and `SETTO_ADMIN_*`
//! environment variables override file values in the binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AdminError, Result};
use crate::network::{NetworkKey, NetworkTable};
use crate::project::ProjectLayout;
use crate::rpc::ConfirmPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "setto-admin.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    /// Per-network overrides, keyed `mainnet` / `devnet`.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkOverride>,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub staging: StagingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Anchor project root
    #[serde(default = "default_project_root")]
    pub root: PathBuf,

    /// Program name as used in Anchor.toml and build outputs
    #[serde(default = "default_program_name")]
    pub program_name: String,

    /// Source file holding `declare_id!`, relative to the root
    #[serde(default = "default_lib_path")]
    pub lib_path: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_project_root(),
            program_name: default_program_name(),
            lib_path: default_lib_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkOverride {
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Explorer base URL for links printed after a command
    #[serde(default)]
    pub explorer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Signature status polls before giving up
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,

    /// Delay between polls in milliseconds
    #[serde(default = "default_confirm_interval")]
    pub confirm_interval_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            confirm_attempts: default_confirm_attempts(),
            confirm_interval_ms: default_confirm_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Path or name of the solana CLI
    #[serde(default = "default_solana_cli")]
    pub solana_cli: String,

    /// Balance (SOL) below which deploy asks for confirmation
    #[serde(default = "default_deploy_min_sol")]
    pub deploy_min_balance_sol: f64,

    /// Balance (SOL) below which upgrade asks for confirmation
    #[serde(default = "default_upgrade_min_sol")]
    pub upgrade_min_balance_sol: f64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            solana_cli: default_solana_cli(),
            deploy_min_balance_sol: default_deploy_min_sol(),
            upgrade_min_balance_sol: default_upgrade_min_sol(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory for staged key files. Defaults to the system temp dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

// Defaults
fn default_project_root() -> PathBuf { PathBuf::from(".") }
fn default_program_name() -> String { "setto_payment".to_string() }
fn default_lib_path() -> PathBuf { PathBuf::from("src/lib.rs") }
fn default_http_timeout() -> u64 { 30 }
fn default_confirm_attempts() -> u32 { 30 }
fn default_confirm_interval() -> u64 { 1000 }
fn default_solana_cli() -> String { "solana".to_string() }
fn default_deploy_min_sol() -> f64 { 3.0 }
fn default_upgrade_min_sol() -> f64 { 2.2 }

impl AdminConfig {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| AdminError::Config(format!("{}: {e}", path.display())))
    }

    /// Built-in networks with RPC and explorer overrides applied. Unknown keys are
    /// rejected.
    pub fn network_table(&self) -> Result<NetworkTable> {
        let mut table = NetworkTable::default();
        for (name, over) in &self.networks {
            let key: NetworkKey = name
                .parse()
                .map_err(|_| AdminError::Config(format!("unknown network [networks.{name}]")))?;
            if let Some(url) = &over.rpc_url {
                table = table.with_rpc_url(key, url.clone());
            }
            if let Some(explorer) = &over.explorer {
                table = table.with_explorer(key, explorer.clone());
            }
        }
        Ok(table)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.submission.http_timeout_secs)
    }

    pub fn confirm_policy(&self) -> ConfirmPolicy {
        ConfirmPolicy {
            attempts: self.submission.confirm_attempts,
            interval: Duration::from_millis(self.submission.confirm_interval_ms),
        }
    }

    pub fn project_layout(&self) -> ProjectLayout {
        ProjectLayout::new(
            self.project.root.clone(),
            self.project.program_name.clone(),
            self.project.lib_path.clone(),
        )
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
