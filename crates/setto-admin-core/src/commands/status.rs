use std::fmt;

use solana_program::pubkey::Pubkey;

use super::{Context, Outcome};
use crate::error::{AdminError, Result};
use crate::registry::{Lookup, RoleListing};
use crate::state::{ConfigRecord, ProgramAccount, ProgramDataHeader, BPF_LOADER_UPGRADEABLE_ID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramState {
    /// Owned by the upgradeable loader.
    Upgradeable {
        programdata: Pubkey,
        header: ProgramDataHeader,
    },
    /// Executable but not managed by the upgradeable loader.
    Other { owner: Pubkey },
}

/// Read-only snapshot of the program and its registry.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub network_name: String,
    pub program_id: Pubkey,
    pub program: ProgramState,
    pub config_address: Pubkey,
    pub config: ConfigRecord,
    pub roles: RoleListing,
    pub program_link: String,
    pub config_link: String,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(60);
        writeln!(f, "{}", self.network_name)?;
        writeln!(f, "{rule}\nProgram\n{rule}")?;
        writeln!(f, "Address:           {}", self.program_id)?;
        match &self.program {
            ProgramState::Upgradeable { programdata, header } => {
                writeln!(f, "Program data:      {programdata} (slot {})", header.slot)?;
                match &header.upgrade_authority {
                    Some(a) => writeln!(f, "Upgrade authority: {a}")?,
                    None => writeln!(f, "Upgrade authority: none (immutable)")?,
                }
            }
            ProgramState::Other { owner } => writeln!(f, "Loader:            {owner}")?,
        }
        writeln!(f, "{rule}\nConfig\n{rule}")?;
        writeln!(f, "Address:           {}", self.config_address)?;
        writeln!(f, "Authority:         {}", self.config.authority)?;
        writeln!(f, "Emergency admin:   {}", self.config.emergency_admin)?;
        writeln!(f, "Fee recipient:     {}", self.config.fee_recipient)?;
        writeln!(f, "Paused:            {}", if self.config.paused { "YES" } else { "no" })?;
        writeln!(f, "{rule}\nRoles\n{rule}")?;
        write!(f, "{}", self.roles)?;
        writeln!(f, "\n{rule}\nExplorer\n{rule}")?;
        writeln!(f, "Program: {}", self.program_link)?;
        write!(f, "Config:  {}", self.config_link)
    }
}

/// Inspect the loader state of the program account.
pub(super) async fn program_state(ctx: &Context<'_>, program_id: &Pubkey) -> Result<ProgramState> {
    let account = ctx
        .fetcher
        .get_account(program_id)
        .await?
        .filter(|a| a.executable)
        .ok_or(AdminError::ProgramNotDeployed(*program_id))?;

    if account.owner != BPF_LOADER_UPGRADEABLE_ID {
        return Ok(ProgramState::Other { owner: account.owner });
    }

    let programdata = ProgramAccount::try_from_slice(&account.data)?.programdata_address;
    let header = match ctx.fetcher.get_account(&programdata).await? {
        Some(data) => ProgramDataHeader::try_from_slice(&data.data)?,
        None => return Err(AdminError::ProgramNotDeployed(*program_id)),
    };
    Ok(ProgramState::Upgradeable { programdata, header })
}

pub(super) async fn run(ctx: &Context<'_>) -> Result<Outcome> {
    let registry = ctx.registry()?;
    let program_id = *registry.deriver().program_id();

    let program = program_state(ctx, &program_id).await?;

    let (config_address, config) = match registry.config().await? {
        Lookup::Present { address, record } => (address, record),
        Lookup::Absent { address } => return Err(AdminError::NotInitialized { config: address }),
    };

    let roles = registry.list_role_records().await?;

    Ok(Outcome::Status(Box::new(StatusReport {
        network_name: ctx.network.name.to_string(),
        program_id,
        program,
        config_address,
        config,
        roles,
        program_link: ctx.account_link(&program_id),
        config_link: ctx.account_link(&config_address),
    })))
}
