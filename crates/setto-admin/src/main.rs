//! setto-admin: deploy, inspect, and administer the Setto payment program.
//!
//! Every command reads fresh chain state, checks its preconditions, asks for the
//! one credential it needs, and confirms before submitting. Diagnostics go to
//! stderr through `tracing`; operator-facing output goes to stdout.

mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use setto_admin_core::commands::{self, Command, Context, Outcome};
use setto_admin_core::config::DEFAULT_CONFIG_FILE;
use setto_admin_core::instruction::MembershipChange;
use setto_admin_core::process::TokioProcessRunner;
use setto_admin_core::prompt::Prompter;
use setto_admin_core::rpc::RpcClient;
use setto_admin_core::state::RecordKind;
use setto_admin_core::{AdminConfig, AdminError, NetworkKey, Role, Seeds};
use solana_program::pubkey::Pubkey;
use tracing::{error, info};

use terminal::TerminalPrompter;

#[derive(Parser, Debug)]
#[command(name = "setto-admin")]
#[command(about = "Deploy and administer the Setto payment program")]
struct Cli {
    /// Target network (mainnet or devnet); asked for when omitted
    #[arg(short, long, global = true, env = "SETTO_ADMIN_NETWORK")]
    network: Option<String>,

    /// Program id (defaults to the Anchor.toml entry for the network)
    #[arg(long, global = true, env = "SETTO_ADMIN_PROGRAM_ID", value_parser = parse_pubkey)]
    program_id: Option<Pubkey>,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "SETTO_ADMIN_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// RPC endpoint (overrides config file)
    #[arg(long, global = true, env = "SETTO_ADMIN_RPC_URL")]
    rpc_url: Option<String>,

    /// Anchor project root (overrides config file)
    #[arg(long, global = true, env = "SETTO_ADMIN_PROJECT_ROOT")]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Cmd {
    /// Show program, config, and registered roles
    Status,
    /// Create the config with the first server signer and relayer
    Initialize,
    AddServerSigner {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    RemoveServerSigner {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    AddRelayer {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    RemoveRelayer {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    /// Add a server signer with the emergency admin key
    EmergencyAddServerSigner {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    /// Remove a server signer with the emergency admin key
    EmergencyRemoveServerSigner {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    /// Add a relayer with the emergency admin key
    EmergencyAddRelayer {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    /// Remove a relayer with the emergency admin key
    EmergencyRemoveRelayer {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    SetEmergencyAdmin {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    SetFeeRecipient {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    /// Hand the authority role to another key. Irreversible.
    TransferAuthority {
        #[arg(value_parser = parse_pubkey)]
        address: Option<Pubkey>,
    },
    /// Halt payments
    Pause,
    Unpause,
    /// First deployment of target/deploy/<program>.so
    Deploy,
    /// Replace the code of a deployed program
    Upgrade,
}

fn parse_pubkey(s: &str) -> Result<Pubkey, String> {
    s.trim().parse().map_err(|_| format!("'{s}' is not a valid base58 public key"))
}

fn membership(
    kind: RecordKind,
    change: MembershipChange,
    role: Role,
    member: Option<Pubkey>,
) -> Command {
    Command::Membership { kind, change, role, member }
}

impl From<Cmd> for Command {
    fn from(cmd: Cmd) -> Self {
        use MembershipChange::{Add, Remove};
        use RecordKind::{Relayer, ServerSigner};
        use Role::{Authority, EmergencyAdmin};

        match cmd {
            Cmd::Status => Command::Status,
            Cmd::Initialize => Command::Initialize,
            Cmd::AddServerSigner { address } => membership(ServerSigner, Add, Authority, address),
            Cmd::RemoveServerSigner { address } => {
                membership(ServerSigner, Remove, Authority, address)
            }
            Cmd::AddRelayer { address } => membership(Relayer, Add, Authority, address),
            Cmd::RemoveRelayer { address } => membership(Relayer, Remove, Authority, address),
            Cmd::EmergencyAddServerSigner { address } => {
                membership(ServerSigner, Add, EmergencyAdmin, address)
            }
            Cmd::EmergencyRemoveServerSigner { address } => {
                membership(ServerSigner, Remove, EmergencyAdmin, address)
            }
            Cmd::EmergencyAddRelayer { address } => {
                membership(Relayer, Add, EmergencyAdmin, address)
            }
            Cmd::EmergencyRemoveRelayer { address } => {
                membership(Relayer, Remove, EmergencyAdmin, address)
            }
            Cmd::SetEmergencyAdmin { address } => Command::SetEmergencyAdmin { new_value: address },
            Cmd::SetFeeRecipient { address } => Command::SetFeeRecipient { new_value: address },
            Cmd::TransferAuthority { address } => Command::TransferAuthority { new_value: address },
            Cmd::Pause => Command::Pause,
            Cmd::Unpause => Command::Unpause,
            Cmd::Deploy => Command::Deploy,
            Cmd::Upgrade => Command::Upgrade,
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<Outcome> {
    let mut config = AdminConfig::load(&cli.config)?;
    if let Some(root) = cli.project_root {
        config.project.root = root;
    }

    let prompter = TerminalPrompter;
    let table = config.network_table()?;
    let key = match cli.network {
        Some(name) => name.parse::<NetworkKey>()?,
        None => prompter.select_network(&table)?,
    };
    let mut network = table.get(key).clone();
    if let Some(url) = cli.rpc_url {
        network.rpc_url = url;
    }

    let project = config.project_layout();
    let program_id = match cli.program_id {
        Some(id) => Some(id),
        None => project.program_id(key)?,
    };

    let client =
        RpcClient::new(network.rpc_url.clone(), config.http_timeout(), config.confirm_policy())
            .context("failed to create RPC client")?;
    info!(network = %key, rpc = %client.url(), program_id = ?program_id, "target resolved");

    let runner = TokioProcessRunner;
    let ctx = Context {
        network,
        program_id,
        seeds: Seeds::default(),
        fetcher: &client,
        submitter: &client,
        prompter: &prompter,
        runner: &runner,
        project,
        deploy: config.deploy.clone(),
        staging_dir: config.staging_dir(),
    };

    Ok(commands::run(&ctx, cli.command.into()).await?)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("setto_admin=info,setto_admin_core=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(outcome) => {
            println!("\n{outcome}");
            ExitCode::SUCCESS
        }
        Err(e) if e.downcast_ref::<AdminError>().is_some_and(AdminError::is_silent) => {
            println!("Cancelled.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_emergency_variants_use_emergency_admin() {
        let cli = Cli::try_parse_from(["setto-admin", "emergency-remove-relayer"]).unwrap();
        assert_eq!(
            Command::from(cli.command),
            Command::Membership {
                kind: RecordKind::Relayer,
                change: MembershipChange::Remove,
                role: Role::EmergencyAdmin,
                member: None,
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let id = "5iZ49Z39KrQ8MLDq8gUWtAMmSJ5mTcUSvPvjau8NvNVB";
        let cli = Cli::try_parse_from([
            "setto-admin",
            "add-server-signer",
            id,
            "--network",
            "devnet",
            "--program-id",
            id,
        ])
        .unwrap();
        assert_eq!(cli.network.as_deref(), Some("devnet"));
        assert_eq!(cli.program_id, Some(id.parse().unwrap()));
        assert!(matches!(cli.command, Cmd::AddServerSigner { address: Some(_) }));
    }

    #[test]
    fn test_invalid_pubkey_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["setto-admin", "set-fee-recipient", "not-a-key"]).is_err());
    }
}
