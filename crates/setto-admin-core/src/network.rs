//! Target networks and explorer links.

use std::fmt;
use std::str::FromStr;

use crate::error::AdminError;

pub const EXPLORER_URL: &str = "https://solscan.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkKey {
    Mainnet,
    Devnet,
}

impl NetworkKey {
    pub const ALL: [NetworkKey; 2] = [NetworkKey::Mainnet, NetworkKey::Devnet];

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkKey::Mainnet => "mainnet",
            NetworkKey::Devnet => "devnet",
        }
    }

    pub fn is_mainnet(self) -> bool {
        self == NetworkKey::Mainnet
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkKey {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(NetworkKey::Mainnet),
            "devnet" => Ok(NetworkKey::Devnet),
            other => Err(AdminError::InvalidInput(format!(
                "unknown network '{other}' (expected mainnet or devnet)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub key: NetworkKey,
    pub name: &'static str,
    /// Cluster name used in explorer query strings.
    pub cluster: &'static str,
    pub rpc_url: String,
    pub explorer: String,
}

impl NetworkProfile {
    fn builtin(key: NetworkKey) -> Self {
        let (name, cluster, rpc_url) = match key {
            NetworkKey::Mainnet => {
                ("Solana Mainnet", "mainnet-beta", "https://api.mainnet-beta.solana.com")
            }
            NetworkKey::Devnet => ("Solana Devnet", "devnet", "https://api.devnet.solana.com"),
        };
        Self {
            key,
            name,
            cluster,
            rpc_url: rpc_url.to_string(),
            explorer: EXPLORER_URL.to_string(),
        }
    }

    fn cluster_suffix(&self) -> String {
        if self.key.is_mainnet() {
            String::new()
        } else {
            format!("?cluster={}", self.cluster)
        }
    }

    pub fn tx_link(&self, signature: &str) -> String {
        format!("{}/tx/{}{}", self.explorer, signature, self.cluster_suffix())
    }

    pub fn account_link(&self, address: &impl fmt::Display) -> String {
        format!("{}/account/{}{}", self.explorer, address, self.cluster_suffix())
    }
}

/// The fixed set of networks. Overrides are applied while building; the table is
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTable {
    profiles: Vec<NetworkProfile>,
}

impl Default for NetworkTable {
    fn default() -> Self {
        Self {
            profiles: NetworkKey::ALL.into_iter().map(NetworkProfile::builtin).collect(),
        }
    }
}

impl NetworkTable {
    pub fn with_rpc_url(mut self, key: NetworkKey, rpc_url: impl Into<String>) -> Self {
        if let Some(profile) = self.profiles.iter_mut().find(|p| p.key == key) {
            profile.rpc_url = rpc_url.into();
        }
        self
    }

    /// Explorer base URL for one network. A trailing `/` is dropped.
    pub fn with_explorer(mut self, key: NetworkKey, explorer: impl Into<String>) -> Self {
        if let Some(profile) = self.profiles.iter_mut().find(|p| p.key == key) {
            profile.explorer = explorer.into().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn get(&self, key: NetworkKey) -> &NetworkProfile {
        // Every key is inserted by `default`.
        self.profiles
            .iter()
            .find(|p| p.key == key)
            .unwrap_or(&self.profiles[0])
    }

    pub fn profiles(&self) -> &[NetworkProfile] {
        &self.profiles
    }
}
