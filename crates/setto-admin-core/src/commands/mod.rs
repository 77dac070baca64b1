//! Operator workflows.
//!
//! Every privileged command follows the same sequence:
//!
//! ```text
//! fetch config ── absent ──> NotInitialized
//!      │
//!   present
//!      │
//! collect inputs ── precondition fails ──> AlreadyRegistered / NotRegistered /
//!      │                                    AlreadyInState
//!      │             (pause flag already set ──> Outcome::Unchanged)
//!      │
//! read credential ── gate denies ──> AuthorizationDenied
//!      │
//! confirm ── declined ──> UserAborted
//!      │
//! submit ──> Outcome::Submitted
//! ```
//!
//! Preconditions are checked before any credential is requested. State is fetched fresh
//! on every invocation and nothing is retried.

mod config_update;
mod deploy;
mod initialize;
mod membership;
mod pause;
mod status;

use std::fmt;
use std::path::PathBuf;

use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;
use tracing::info;

use crate::auth::{authorize, Role};
use crate::config::DeployConfig;
use crate::error::{AdminError, Result};
use crate::instruction::{AdminOperation, MembershipChange};
use crate::keypair::Keypair;
use crate::network::NetworkProfile;
use crate::pda::{AddressDeriver, Seeds};
use crate::process::ProcessRunner;
use crate::project::ProjectLayout;
use crate::prompt::Prompter;
use crate::registry::{Lookup, Registry};
use crate::rpc::{AccountFetcher, SubmitRequest, Submitter};
use crate::state::{ConfigRecord, RecordKind};

pub use status::{ProgramState, StatusReport};

/// One operator workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Initialize,
    /// Add or remove a server signer / relayer, gated by `role`.
    Membership {
        kind: RecordKind,
        change: MembershipChange,
        role: Role,
        member: Option<Pubkey>,
    },
    SetEmergencyAdmin { new_value: Option<Pubkey> },
    SetFeeRecipient { new_value: Option<Pubkey> },
    TransferAuthority { new_value: Option<Pubkey> },
    Pause,
    Unpause,
    Deploy,
    Upgrade,
}

/// Collaborators and settings for one invocation.
pub struct Context<'a> {
    pub network: NetworkProfile,
    /// `None` until resolved; only `deploy` can run without it.
    pub program_id: Option<Pubkey>,
    pub seeds: Seeds,
    pub fetcher: &'a dyn AccountFetcher,
    pub submitter: &'a dyn Submitter,
    pub prompter: &'a dyn Prompter,
    pub runner: &'a dyn ProcessRunner,
    pub project: ProjectLayout,
    pub deploy: DeployConfig,
    pub staging_dir: PathBuf,
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Submitted {
        operation: AdminOperation,
        signature: String,
        explorer_link: String,
    },
    Deployed {
        program_id: Pubkey,
        upgraded: bool,
        program_link: String,
        config_link: Option<String>,
        record: Option<PathBuf>,
    },
    Status(Box<StatusReport>),
    /// The requested state was already in effect; nothing was submitted.
    Unchanged(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Submitted { operation, signature, explorer_link } => {
                writeln!(f, "{operation} confirmed")?;
                writeln!(f, "Signature: {signature}")?;
                write!(f, "Explorer:  {explorer_link}")
            }
            Outcome::Deployed { program_id, upgraded, program_link, config_link, record } => {
                let verb = if *upgraded { "upgraded" } else { "deployed" };
                writeln!(f, "Program {program_id} {verb}")?;
                write!(f, "Program: {program_link}")?;
                if let Some(link) = config_link {
                    write!(f, "\nConfig:  {link}")?;
                }
                if let Some(path) = record {
                    write!(f, "\nDeployment saved to {}", path.display())?;
                }
                Ok(())
            }
            Outcome::Status(report) => write!(f, "{report}"),
            Outcome::Unchanged(notice) => write!(f, "{notice}"),
        }
    }
}

pub async fn run(ctx: &Context<'_>, command: Command) -> Result<Outcome> {
    info!(?command, network = %ctx.network.key, "running command");
    match command {
        Command::Status => status::run(ctx).await,
        Command::Initialize => initialize::run(ctx).await,
        Command::Membership { kind, change, role, member } => {
            let op = AdminOperation::for_membership(kind, change, role)?;
            membership::run(ctx, op, member).await
        }
        Command::SetEmergencyAdmin { new_value } => {
            config_update::run(ctx, AdminOperation::SetEmergencyAdmin, new_value).await
        }
        Command::SetFeeRecipient { new_value } => {
            config_update::run(ctx, AdminOperation::SetFeeRecipient, new_value).await
        }
        Command::TransferAuthority { new_value } => {
            config_update::run(ctx, AdminOperation::TransferAuthority, new_value).await
        }
        Command::Pause => pause::run(ctx, true).await,
        Command::Unpause => pause::run(ctx, false).await,
        Command::Deploy => deploy::deploy(ctx).await,
        Command::Upgrade => deploy::upgrade(ctx).await,
    }
}

impl<'a> Context<'a> {
    pub fn program_id(&self) -> Result<Pubkey> {
        self.program_id.ok_or_else(|| {
            AdminError::InvalidInput(format!(
                "no program id for {}; pass --program-id or add it to Anchor.toml",
                self.network.key
            ))
        })
    }

    pub fn deriver(&self) -> Result<AddressDeriver> {
        Ok(AddressDeriver::new(self.program_id()?, self.seeds))
    }

    pub fn registry(&self) -> Result<Registry<'a>> {
        Ok(Registry::new(self.fetcher, self.deriver()?))
    }

    /// Fetch and decode the config, or fail with `NotInitialized`.
    async fn require_config(&self, registry: &Registry<'_>) -> Result<ConfigRecord> {
        match registry.config().await? {
            Lookup::Present { record, .. } => Ok(record),
            Lookup::Absent { address } => Err(AdminError::NotInitialized { config: address }),
        }
    }

    /// Read the credential for `role` and gate it against `config`.
    fn gated_credential(&self, role: Role, config: &ConfigRecord) -> Result<Keypair> {
        let keypair = self.prompter.keypair(&role.to_string())?;
        authorize(role, &keypair.pubkey(), config).into_result()?;
        info!(%role, signer = %keypair.pubkey(), "credential authorized");
        Ok(keypair)
    }

    async fn submit(
        &self,
        operation: AdminOperation,
        instruction: Instruction,
        signer: &Keypair,
    ) -> Result<Outcome> {
        let signature = self
            .submitter
            .submit(SubmitRequest {
                operation,
                instruction,
                signers: vec![signer],
            })
            .await?;
        info!(%operation, %signature, "confirmed");
        Ok(Outcome::Submitted {
            operation,
            explorer_link: self.network.tx_link(&signature),
            signature,
        })
    }

    fn account_link(&self, address: &Pubkey) -> String {
        self.network.account_link(address)
    }
}

fn require_nonzero(label: &str, key: &Pubkey) -> Result<()> {
    if *key == Pubkey::default() {
        return Err(AdminError::InvalidInput(format!("{label} cannot be the zero address")));
    }
    Ok(())
}

/// `value` from the command line, else asked for.
fn resolve_pubkey(
    ctx: &Context<'_>,
    value: Option<Pubkey>,
    message: &str,
    default: Option<Pubkey>,
) -> Result<Pubkey> {
    match value {
        Some(v) => Ok(v),
        None => ctx.prompter.pubkey(message, default),
    }
}

fn summary(title: &str, rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 2;
    let mut out = format!("{}\n{title}\n{}", "=".repeat(60), "=".repeat(60));
    for (label, value) in rows {
        out.push_str(&format!("\n{:<width$}{value}", format!("{label}:")));
    }
    out.push('\n');
    out.push_str(&"=".repeat(60));
    out
}
