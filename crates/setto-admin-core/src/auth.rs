//! Pre-flight authorization.
//!
//! The on-chain program enforces every role itself. This gate runs the same comparison
//! off-chain so a wrong credential is rejected before a transaction is built, signed or
//! paid for. It is a pure function of the supplied identity and freshly fetched state;
//! nothing is cached between commands.

use std::fmt;

use solana_program::pubkey::Pubkey;

use crate::error::AdminError;
use crate::state::{ConfigRecord, ProgramDataHeader};

/// Which recorded identity a command requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// `ConfigRecord::authority`
    Authority,
    /// `ConfigRecord::emergency_admin`
    EmergencyAdmin,
    /// The upgradeable loader's recorded upgrade authority.
    UpgradeAuthority,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Authority => "authority",
            Role::EmergencyAdmin => "emergency admin",
            Role::UpgradeAuthority => "upgrade authority",
        })
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    /// `expected` is `None` only for an immutable program (no upgrade authority).
    Denied {
        role: Role,
        expected: Option<Pubkey>,
        supplied: Pubkey,
    },
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }

    pub fn into_result(self) -> Result<(), AdminError> {
        match self {
            Authorization::Allowed => Ok(()),
            Authorization::Denied { role, expected, supplied } => {
                Err(AdminError::AuthorizationDenied {
                    role,
                    expected: expected
                        .map(|key| key.to_string())
                        .unwrap_or_else(|| "none (program is immutable)".to_string()),
                    supplied,
                })
            }
        }
    }
}

fn compare(role: Role, expected: Option<&Pubkey>, supplied: &Pubkey) -> Authorization {
    match expected {
        Some(expected) if expected == supplied => Authorization::Allowed,
        _ => Authorization::Denied {
            role,
            expected: expected.copied(),
            supplied: *supplied,
        },
    }
}

/// Compare `supplied` with the field of `config` designated by `role`.
///
/// `Role::UpgradeAuthority` is not recorded in the config and always denies here; use
/// [`authorize_upgrade`].
pub fn authorize(role: Role, supplied: &Pubkey, config: &ConfigRecord) -> Authorization {
    let expected = match role {
        Role::Authority => Some(&config.authority),
        Role::EmergencyAdmin => Some(&config.emergency_admin),
        Role::UpgradeAuthority => None,
    };
    compare(role, expected, supplied)
}

/// Compare `supplied` with the loader's upgrade authority. An immutable program denies
/// every credential.
pub fn authorize_upgrade(supplied: &Pubkey, program_data: &ProgramDataHeader) -> Authorization {
    compare(Role::UpgradeAuthority, program_data.upgrade_authority.as_ref(), supplied)
}
