//! Registry lookups: derived address + fetch + decode.
//!
//! A role record's presence at its derived address is the only source of truth for
//! registration. Absence is a normal [`Lookup::Absent`], never an error.

use std::fmt;

use solana_program::pubkey::Pubkey;
use tracing::debug;

use crate::error::Result;
use crate::pda::AddressDeriver;
use crate::rpc::AccountFetcher;
use crate::state::{
    decode_role_record, ConfigRecord, RecordKind, RelayerRecord, RoleRecord, ServerSignerRecord,
    ROLE_RECORD_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Present { address: Pubkey, record: T },
    Absent { address: Pubkey },
}

impl<T> Lookup<T> {
    pub fn address(&self) -> &Pubkey {
        match self {
            Lookup::Present { address, .. } | Lookup::Absent { address } => address,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Lookup::Present { .. })
    }

    pub fn record(&self) -> Option<&T> {
        match self {
            Lookup::Present { record, .. } => Some(record),
            Lookup::Absent { .. } => None,
        }
    }
}

/// Result of a bulk scan over the program's role-sized accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleListing {
    pub server_signers: Vec<(Pubkey, ServerSignerRecord)>,
    pub relayers: Vec<(Pubkey, RelayerRecord)>,
    /// Role-sized accounts that did not decode as a known record kind.
    pub skipped: usize,
}

fn activity(is_active: bool) -> &'static str {
    if is_active {
        "active"
    } else {
        "inactive"
    }
}

impl fmt::Display for RoleListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server signers ({})", self.server_signers.len())?;
        for (_, record) in &self.server_signers {
            writeln!(f, "  {} {}", record.signer, activity(record.is_active))?;
        }
        writeln!(f, "Relayers ({})", self.relayers.len())?;
        for (_, record) in &self.relayers {
            writeln!(f, "  {} {}", record.relayer, activity(record.is_active))?;
        }
        if self.skipped > 0 {
            write!(f, "Skipped {} unrecognized account(s)", self.skipped)?;
        }
        Ok(())
    }
}

pub struct Registry<'a> {
    fetcher: &'a dyn AccountFetcher,
    deriver: AddressDeriver,
}

impl<'a> Registry<'a> {
    pub fn new(fetcher: &'a dyn AccountFetcher, deriver: AddressDeriver) -> Self {
        Self { fetcher, deriver }
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    async fn lookup<T>(
        &self,
        address: Pubkey,
        decode: impl FnOnce(&[u8]) -> std::result::Result<T, crate::state::DecodeError>,
    ) -> Result<Lookup<T>> {
        match self.fetcher.get_account(&address).await? {
            Some(account) => Ok(Lookup::Present {
                address,
                record: decode(&account.data)?,
            }),
            None => Ok(Lookup::Absent { address }),
        }
    }

    pub async fn config(&self) -> Result<Lookup<ConfigRecord>> {
        let address = self.deriver.config()?.address;
        self.lookup(address, ConfigRecord::try_from_slice).await
    }

    pub async fn server_signer(&self, signer: &Pubkey) -> Result<Lookup<ServerSignerRecord>> {
        let address = self.deriver.server_signer(signer)?.address;
        self.lookup(address, ServerSignerRecord::try_from_slice).await
    }

    pub async fn relayer(&self, relayer: &Pubkey) -> Result<Lookup<RelayerRecord>> {
        let address = self.deriver.relayer(relayer)?.address;
        self.lookup(address, RelayerRecord::try_from_slice).await
    }

    /// Presence check for either role kind.
    pub async fn is_registered(&self, kind: RecordKind, identity: &Pubkey) -> Result<bool> {
        Ok(match kind {
            RecordKind::ServerSigner => self.server_signer(identity).await?.is_present(),
            RecordKind::Relayer => self.relayer(identity).await?.is_present(),
        })
    }

    /// Every server signer and relayer record owned by the program.
    ///
    /// Both kinds share one byte length, so each account is classified by its tag.
    /// Unknown tags and malformed buffers are counted in `skipped`.
    pub async fn list_role_records(&self) -> Result<RoleListing> {
        let accounts = self
            .fetcher
            .get_program_accounts_by_size(self.deriver.program_id(), ROLE_RECORD_SIZE)
            .await?;

        let mut listing = RoleListing::default();
        for (address, account) in accounts {
            match decode_role_record(&account.data) {
                Ok(RoleRecord::ServerSigner(record)) => {
                    listing.server_signers.push((address, record))
                }
                Ok(RoleRecord::Relayer(record)) => listing.relayers.push((address, record)),
                Err(e) => {
                    debug!(%address, error = %e, "skipping role-sized account");
                    listing.skipped += 1;
                }
            }
        }
        Ok(listing)
    }
}
