//! Anchor project files touched by deploy and upgrade.
//!
//! | Path (relative to root) | Use |
//! |-------------------------|-----|
//! | `Anchor.toml` | `[programs.<network>] <program> = "<id>"` |
//! | `target/deploy/<program>.so` | build artifact passed to the CLI |
//! | `target/idl/<program>.json` | IDL whose `address` tracks the program id |
//! | `src/lib.rs` (configurable) | `declare_id!("<id>")` |
//! | `deployments/solana-<network>.json` | [`DeploymentRecord`] |

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use tracing::{debug, info};

use crate::error::{AdminError, Result};
use crate::network::NetworkKey;

/// Written after a successful deploy. Holds public identities only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Display name of the network.
    pub network: String,
    pub program_id: String,
    pub deployer: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    program_name: String,
    lib_path: PathBuf,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| AdminError::Project(format!("failed to read {}: {e}", path.display())))
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .map_err(|e| AdminError::Project(format!("failed to write {}: {e}", path.display())))
}

impl ProjectLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        program_name: impl Into<String>,
        lib_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            program_name: program_name.into(),
            lib_path: lib_path.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn anchor_toml(&self) -> PathBuf {
        self.root.join("Anchor.toml")
    }

    pub fn artifact(&self) -> PathBuf {
        self.root.join("target/deploy").join(format!("{}.so", self.program_name))
    }

    pub fn idl(&self) -> PathBuf {
        self.root.join("target/idl").join(format!("{}.json", self.program_name))
    }

    pub fn lib_rs(&self) -> PathBuf {
        self.root.join(&self.lib_path)
    }

    pub fn deployment_record_path(&self, network: NetworkKey) -> PathBuf {
        self.root.join("deployments").join(format!("solana-{network}.json"))
    }

    /// The build artifact, or `ArtifactMissing`.
    pub fn require_artifact(&self) -> Result<PathBuf> {
        let path = self.artifact();
        if path.is_file() {
            Ok(path)
        } else {
            Err(AdminError::ArtifactMissing(path))
        }
    }

    /// Program id registered for `network` in `Anchor.toml`, if any.
    pub fn program_id(&self, network: NetworkKey) -> Result<Option<Pubkey>> {
        let path = self.anchor_toml();
        if !path.exists() {
            return Ok(None);
        }
        let doc: toml::Table = toml::from_str(&read(&path)?)
            .map_err(|e| AdminError::Project(format!("invalid {}: {e}", path.display())))?;

        let Some(raw) = doc
            .get("programs")
            .and_then(|p| p.get(network.as_str()))
            .and_then(|n| n.get(&self.program_name))
            .and_then(toml::Value::as_str)
        else {
            return Ok(None);
        };

        raw.parse::<Pubkey>().map(Some).map_err(|_| {
            AdminError::Project(format!(
                "invalid program id '{raw}' for [programs.{network}] in {}",
                path.display()
            ))
        })
    }

    /// Rewrite the `declare_id!` literal in the program source.
    pub fn set_declared_id(&self, program_id: &Pubkey) -> Result<()> {
        let path = self.lib_rs();
        let source = read(&path)?;
        let updated = replace_declare_id(&source, program_id).ok_or_else(|| {
            AdminError::Project(format!("no declare_id! found in {}", path.display()))
        })?;
        write(&path, &updated)?;
        info!(path = %path.display(), %program_id, "updated declare_id!");
        Ok(())
    }

    /// Replace (or add) the `[programs.<network>]` section of `Anchor.toml`.
    pub fn set_anchor_program_id(&self, network: NetworkKey, program_id: &Pubkey) -> Result<()> {
        let path = self.anchor_toml();
        let contents = read(&path)?;
        let updated = replace_programs_section(&contents, network, &self.program_name, program_id);
        write(&path, &updated)?;
        info!(path = %path.display(), %network, %program_id, "updated Anchor.toml");
        Ok(())
    }

    /// Point the IDL's `address` at `program_id`. Returns whether the file changed; a
    /// missing IDL is skipped.
    pub fn set_idl_address(&self, program_id: &Pubkey) -> Result<bool> {
        let path = self.idl();
        if !path.exists() {
            debug!(path = %path.display(), "IDL not found, skipping");
            return Ok(false);
        }

        let mut idl: serde_json::Value = serde_json::from_str(&read(&path)?)
            .map_err(|e| AdminError::Project(format!("invalid IDL {}: {e}", path.display())))?;
        let address = program_id.to_string();
        if idl.get("address").and_then(serde_json::Value::as_str) == Some(address.as_str()) {
            return Ok(false);
        }

        let obj = idl.as_object_mut().ok_or_else(|| {
            AdminError::Project(format!("IDL {} is not an object", path.display()))
        })?;
        obj.insert("address".into(), serde_json::Value::String(address));

        let pretty = serde_json::to_string_pretty(&idl)
            .map_err(|e| AdminError::Project(format!("failed to encode IDL: {e}")))?;
        write(&path, &pretty)?;
        info!(path = %path.display(), %program_id, "updated IDL address");
        Ok(true)
    }

    pub fn write_deployment_record(
        &self,
        network: NetworkKey,
        record: &DeploymentRecord,
    ) -> Result<PathBuf> {
        let path = self.deployment_record_path(network);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| AdminError::Project(format!("failed to encode deployment record: {e}")))?;
        write(&path, &json)?;
        Ok(path)
    }
}

fn replace_declare_id(source: &str, program_id: &Pubkey) -> Option<String> {
    let re = Regex::new(r#"declare_id!\s*\(\s*"[^"]+"\s*\)"#).ok()?;
    if !re.is_match(source) {
        return None;
    }
    let replacement = format!("declare_id!(\"{program_id}\")");
    Some(re.replace(source, regex::NoExpand(&replacement)).into_owned())
}

/// Text-level edit so comments and ordering elsewhere in the file survive.
fn replace_programs_section(
    contents: &str,
    network: NetworkKey,
    program_name: &str,
    program_id: &Pubkey,
) -> String {
    let section = format!("[programs.{network}]\n{program_name} = \"{program_id}\"\n\n");
    let pattern = format!(r"(?m)^\[programs\.{}\]\s*\n[^\[]*", regex::escape(network.as_str()));

    if let Ok(re) = Regex::new(&pattern) {
        if re.is_match(contents) {
            return re.replace(contents, regex::NoExpand(&section)).into_owned();
        }
    }

    match contents.find("[registry]") {
        Some(idx) => format!("{}{}{}", &contents[..idx], section, &contents[idx..]),
        None => {
            let mut out = contents.to_string();
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&section);
            out
        }
    }
}
