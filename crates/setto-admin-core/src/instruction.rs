//! Administrative instructions of the payment program.
//!
//! Instruction data is the 8-byte Anchor instruction discriminator,
//! `sha256("global:<name>")[..8]`; none of the administrative instructions take
//! arguments. Account lists mirror the program's account structs in order.
//!
//! | Operation | Signer role | Account list |
//! |-----------|-------------|--------------|
//! | initialize | payer (becomes authority) | authority, config, emergency_admin, server_signer, server_signer PDA, fee_recipient, relayer, relayer PDA, system |
//! | pause / unpause | emergency admin | emergency_admin, config |
//! | set_emergency_admin / set_fee_recipient / transfer_authority | authority | authority, config, new value |
//! | add_* / emergency_add_* | authority / emergency admin | signer, config, member, member PDA, system |
//! | remove_* / emergency_remove_* | authority / emergency admin | signer, config, member, member PDA |

use std::fmt;

use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;

use crate::auth::Role;
use crate::error::{AdminError, Result};
use crate::pda::AddressDeriver;
use crate::state::RecordKind;

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminOperation {
    Initialize,
    Pause,
    Unpause,
    SetEmergencyAdmin,
    SetFeeRecipient,
    TransferAuthority,
    AddServerSigner,
    RemoveServerSigner,
    AddRelayer,
    RemoveRelayer,
    EmergencyAddServerSigner,
    EmergencyRemoveServerSigner,
    EmergencyAddRelayer,
    EmergencyRemoveRelayer,
}

impl AdminOperation {
    pub const ALL: [AdminOperation; 14] = [
        AdminOperation::Initialize,
        AdminOperation::Pause,
        AdminOperation::Unpause,
        AdminOperation::SetEmergencyAdmin,
        AdminOperation::SetFeeRecipient,
        AdminOperation::TransferAuthority,
        AdminOperation::AddServerSigner,
        AdminOperation::RemoveServerSigner,
        AdminOperation::AddRelayer,
        AdminOperation::RemoveRelayer,
        AdminOperation::EmergencyAddServerSigner,
        AdminOperation::EmergencyRemoveServerSigner,
        AdminOperation::EmergencyAddRelayer,
        AdminOperation::EmergencyRemoveRelayer,
    ];

    /// Instruction name as declared by the program.
    pub fn name(self) -> &'static str {
        match self {
            AdminOperation::Initialize => "initialize",
            AdminOperation::Pause => "pause",
            AdminOperation::Unpause => "unpause",
            AdminOperation::SetEmergencyAdmin => "set_emergency_admin",
            AdminOperation::SetFeeRecipient => "set_fee_recipient",
            AdminOperation::TransferAuthority => "transfer_authority",
            AdminOperation::AddServerSigner => "add_server_signer",
            AdminOperation::RemoveServerSigner => "remove_server_signer",
            AdminOperation::AddRelayer => "add_relayer",
            AdminOperation::RemoveRelayer => "remove_relayer",
            AdminOperation::EmergencyAddServerSigner => "emergency_add_server_signer",
            AdminOperation::EmergencyRemoveServerSigner => "emergency_remove_server_signer",
            AdminOperation::EmergencyAddRelayer => "emergency_add_relayer",
            AdminOperation::EmergencyRemoveRelayer => "emergency_remove_relayer",
        }
    }

    pub fn discriminator(self) -> [u8; 8] {
        match self {
            AdminOperation::Initialize => [175, 175, 109, 31, 13, 152, 155, 237],
            AdminOperation::Pause => [211, 22, 221, 251, 74, 121, 193, 47],
            AdminOperation::Unpause => [169, 144, 4, 38, 10, 141, 188, 255],
            AdminOperation::SetEmergencyAdmin => [139, 41, 250, 43, 244, 68, 0, 109],
            AdminOperation::SetFeeRecipient => [227, 18, 215, 42, 237, 246, 151, 66],
            AdminOperation::TransferAuthority => [48, 169, 76, 72, 229, 180, 55, 161],
            AdminOperation::AddServerSigner => [89, 99, 65, 48, 88, 187, 74, 62],
            AdminOperation::RemoveServerSigner => [247, 117, 176, 165, 167, 33, 116, 4],
            AdminOperation::AddRelayer => [184, 240, 94, 199, 19, 71, 21, 192],
            AdminOperation::RemoveRelayer => [154, 149, 161, 231, 69, 74, 136, 237],
            AdminOperation::EmergencyAddServerSigner => [51, 138, 122, 53, 246, 47, 169, 88],
            AdminOperation::EmergencyRemoveServerSigner => [96, 116, 74, 244, 76, 63, 15, 173],
            AdminOperation::EmergencyAddRelayer => [141, 86, 244, 137, 168, 100, 249, 192],
            AdminOperation::EmergencyRemoveRelayer => [241, 93, 253, 240, 194, 246, 172, 93],
        }
    }

    /// Role whose recorded identity must sign. `None` for initialize, whose payer
    /// becomes the authority.
    pub fn required_role(self) -> Option<Role> {
        match self {
            AdminOperation::Initialize => None,
            AdminOperation::Pause
            | AdminOperation::Unpause
            | AdminOperation::EmergencyAddServerSigner
            | AdminOperation::EmergencyRemoveServerSigner
            | AdminOperation::EmergencyAddRelayer
            | AdminOperation::EmergencyRemoveRelayer => Some(Role::EmergencyAdmin),
            AdminOperation::SetEmergencyAdmin
            | AdminOperation::SetFeeRecipient
            | AdminOperation::TransferAuthority
            | AdminOperation::AddServerSigner
            | AdminOperation::RemoveServerSigner
            | AdminOperation::AddRelayer
            | AdminOperation::RemoveRelayer => Some(Role::Authority),
        }
    }

    /// For role-membership operations: the record kind and whether it adds.
    pub fn membership(self) -> Option<(RecordKind, MembershipChange)> {
        use MembershipChange::{Add, Remove};
        match self {
            AdminOperation::AddServerSigner | AdminOperation::EmergencyAddServerSigner => {
                Some((RecordKind::ServerSigner, Add))
            }
            AdminOperation::RemoveServerSigner | AdminOperation::EmergencyRemoveServerSigner => {
                Some((RecordKind::ServerSigner, Remove))
            }
            AdminOperation::AddRelayer | AdminOperation::EmergencyAddRelayer => {
                Some((RecordKind::Relayer, Add))
            }
            AdminOperation::RemoveRelayer | AdminOperation::EmergencyRemoveRelayer => {
                Some((RecordKind::Relayer, Remove))
            }
            _ => None,
        }
    }

    /// The membership operation for `kind`/`change` under `role`.
    pub fn for_membership(kind: RecordKind, change: MembershipChange, role: Role) -> Result<Self> {
        use MembershipChange::{Add, Remove};
        let op = match (role, kind, change) {
            (Role::Authority, RecordKind::ServerSigner, Add) => AdminOperation::AddServerSigner,
            (Role::Authority, RecordKind::ServerSigner, Remove) => {
                AdminOperation::RemoveServerSigner
            }
            (Role::Authority, RecordKind::Relayer, Add) => AdminOperation::AddRelayer,
            (Role::Authority, RecordKind::Relayer, Remove) => AdminOperation::RemoveRelayer,
            (Role::EmergencyAdmin, RecordKind::ServerSigner, Add) => {
                AdminOperation::EmergencyAddServerSigner
            }
            (Role::EmergencyAdmin, RecordKind::ServerSigner, Remove) => {
                AdminOperation::EmergencyRemoveServerSigner
            }
            (Role::EmergencyAdmin, RecordKind::Relayer, Add) => AdminOperation::EmergencyAddRelayer,
            (Role::EmergencyAdmin, RecordKind::Relayer, Remove) => {
                AdminOperation::EmergencyRemoveRelayer
            }
            (Role::UpgradeAuthority, ..) => {
                return Err(AdminError::InvalidInput(
                    "role membership is not managed by the upgrade authority".into(),
                ))
            }
        };
        Ok(op)
    }
}

impl fmt::Display for AdminOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipChange {
    Add,
    Remove,
}

/// Identities stored by `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeParams {
    pub authority: Pubkey,
    pub emergency_admin: Pubkey,
    pub server_signer: Pubkey,
    pub fee_recipient: Pubkey,
    pub relayer: Pubkey,
}

fn ensure_nonzero(label: &str, key: &Pubkey) -> Result<()> {
    if *key == Pubkey::default() {
        return Err(AdminError::InvalidInput(format!("{label} cannot be the zero address")));
    }
    Ok(())
}

fn build(deriver: &AddressDeriver, op: AdminOperation, accounts: Vec<AccountMeta>) -> Instruction {
    Instruction {
        program_id: *deriver.program_id(),
        accounts,
        data: op.discriminator().to_vec(),
    }
}

pub fn initialize(deriver: &AddressDeriver, params: &InitializeParams) -> Result<Instruction> {
    ensure_nonzero("emergency admin", &params.emergency_admin)?;
    ensure_nonzero("server signer", &params.server_signer)?;
    ensure_nonzero("fee recipient", &params.fee_recipient)?;
    ensure_nonzero("relayer", &params.relayer)?;

    let config = deriver.config()?;
    let server_signer_pda = deriver.server_signer(&params.server_signer)?;
    let relayer_pda = deriver.relayer(&params.relayer)?;

    Ok(build(
        deriver,
        AdminOperation::Initialize,
        vec![
            AccountMeta::new(params.authority, true),
            AccountMeta::new(config.address, false),
            AccountMeta::new_readonly(params.emergency_admin, false),
            AccountMeta::new_readonly(params.server_signer, false),
            AccountMeta::new(server_signer_pda.address, false),
            AccountMeta::new_readonly(params.fee_recipient, false),
            AccountMeta::new_readonly(params.relayer, false),
            AccountMeta::new(relayer_pda.address, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
    ))
}

pub fn set_paused(
    deriver: &AddressDeriver,
    paused: bool,
    emergency_admin: &Pubkey,
) -> Result<Instruction> {
    let op = if paused { AdminOperation::Pause } else { AdminOperation::Unpause };
    let config = deriver.config()?;
    Ok(build(
        deriver,
        op,
        vec![
            AccountMeta::new_readonly(*emergency_admin, true),
            AccountMeta::new(config.address, false),
        ],
    ))
}

/// `set_emergency_admin`, `set_fee_recipient` or `transfer_authority`.
pub fn update_config(
    deriver: &AddressDeriver,
    op: AdminOperation,
    authority: &Pubkey,
    new_value: &Pubkey,
) -> Result<Instruction> {
    match op {
        AdminOperation::SetEmergencyAdmin
        | AdminOperation::SetFeeRecipient
        | AdminOperation::TransferAuthority => {}
        other => {
            return Err(AdminError::InvalidInput(format!("{other} is not a config update")))
        }
    }
    ensure_nonzero("new value", new_value)?;

    let config = deriver.config()?;
    Ok(build(
        deriver,
        op,
        vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(config.address, false),
            AccountMeta::new_readonly(*new_value, false),
        ],
    ))
}

/// Any of the eight add/remove server signer/relayer operations.
pub fn change_membership(
    deriver: &AddressDeriver,
    op: AdminOperation,
    signer: &Pubkey,
    member: &Pubkey,
) -> Result<Instruction> {
    let (kind, change) = op
        .membership()
        .ok_or_else(|| AdminError::InvalidInput(format!("{op} is not a membership change")))?;
    ensure_nonzero(kind.label(), member)?;

    let config = deriver.config()?;
    let record = match kind {
        RecordKind::ServerSigner => deriver.server_signer(member)?,
        RecordKind::Relayer => deriver.relayer(member)?,
    };

    // Signer pays for the record on add and receives its rent on remove.
    let mut accounts = vec![
        AccountMeta::new(*signer, true),
        AccountMeta::new_readonly(config.address, false),
        AccountMeta::new_readonly(*member, false),
        AccountMeta::new(record.address, false),
    ];
    if change == MembershipChange::Add {
        accounts.push(AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false));
    }

    Ok(build(deriver, op, accounts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pda::Seeds;
    use sha2::{Digest, Sha256};

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(Pubkey::new_from_array([0x11; 32]), Seeds::default())
    }

    #[test]
    fn test_discriminators_match_instruction_names() {
        for op in AdminOperation::ALL {
            let hash = Sha256::digest(format!("global:{}", op.name()).as_bytes());
            assert_eq!(&hash[..8], &op.discriminator(), "{op}");
        }
    }

    #[test]
    fn test_role_assignment() {
        assert_eq!(AdminOperation::Pause.required_role(), Some(Role::EmergencyAdmin));
        assert_eq!(AdminOperation::EmergencyAddRelayer.required_role(), Some(Role::EmergencyAdmin));
        assert_eq!(AdminOperation::AddRelayer.required_role(), Some(Role::Authority));
        assert_eq!(AdminOperation::TransferAuthority.required_role(), Some(Role::Authority));
        assert_eq!(AdminOperation::Initialize.required_role(), None);
    }

    #[test]
    fn test_membership_lookup_is_inverse() {
        for op in AdminOperation::ALL {
            if let Some((kind, change)) = op.membership() {
                let role = op.required_role().unwrap();
                assert_eq!(AdminOperation::for_membership(kind, change, role).unwrap(), op);
            }
        }
    }

    #[test]
    fn test_initialize_account_order() {
        let d = deriver();
        let params = InitializeParams {
            authority: Pubkey::new_from_array([1; 32]),
            emergency_admin: Pubkey::new_from_array([2; 32]),
            server_signer: Pubkey::new_from_array([3; 32]),
            fee_recipient: Pubkey::new_from_array([4; 32]),
            relayer: Pubkey::new_from_array([5; 32]),
        };
        let ix = initialize(&d, &params).unwrap();

        assert_eq!(ix.data, AdminOperation::Initialize.discriminator().to_vec());
        let keys: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                params.authority,
                d.config().unwrap().address,
                params.emergency_admin,
                params.server_signer,
                d.server_signer(&params.server_signer).unwrap().address,
                params.fee_recipient,
                params.relayer,
                d.relayer(&params.relayer).unwrap().address,
                SYSTEM_PROGRAM_ID,
            ]
        );
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(ix.accounts[1].is_writable);
        assert!(!ix.accounts[2].is_writable);
    }

    #[test]
    fn test_initialize_rejects_zero_address() {
        let params = InitializeParams {
            authority: Pubkey::new_from_array([1; 32]),
            emergency_admin: Pubkey::new_from_array([2; 32]),
            server_signer: Pubkey::default(),
            fee_recipient: Pubkey::new_from_array([4; 32]),
            relayer: Pubkey::new_from_array([5; 32]),
        };
        assert!(matches!(initialize(&deriver(), &params), Err(AdminError::InvalidInput(_))));
    }

    #[test]
    fn test_membership_accounts() {
        let d = deriver();
        let signer = Pubkey::new_from_array([1; 32]);
        let member = Pubkey::new_from_array([9; 32]);

        let add = change_membership(&d, AdminOperation::AddRelayer, &signer, &member).unwrap();
        assert_eq!(add.accounts.len(), 5);
        assert_eq!(add.accounts[3].pubkey, d.relayer(&member).unwrap().address);
        assert_eq!(add.accounts[4].pubkey, SYSTEM_PROGRAM_ID);

        let remove =
            change_membership(&d, AdminOperation::EmergencyRemoveServerSigner, &signer, &member)
                .unwrap();
        assert_eq!(remove.accounts.len(), 4);
        assert_eq!(remove.accounts[3].pubkey, d.server_signer(&member).unwrap().address);
        assert!(remove.accounts[0].is_signer && remove.accounts[0].is_writable);

        assert!(change_membership(&d, AdminOperation::Pause, &signer, &member).is_err());
    }

    #[test]
    fn test_pause_and_config_updates() {
        let d = deriver();
        let admin = Pubkey::new_from_array([2; 32]);

        let pause = set_paused(&d, true, &admin).unwrap();
        assert_eq!(pause.data, AdminOperation::Pause.discriminator().to_vec());
        let unpause = set_paused(&d, false, &admin).unwrap();
        assert_eq!(unpause.data, AdminOperation::Unpause.discriminator().to_vec());
        assert!(!pause.accounts[0].is_writable && pause.accounts[0].is_signer);

        let new = Pubkey::new_from_array([3; 32]);
        let ix = update_config(&d, AdminOperation::SetFeeRecipient, &admin, &new).unwrap();
        assert_eq!(ix.accounts[2].pubkey, new);
        assert!(update_config(&d, AdminOperation::AddRelayer, &admin, &new).is_err());
    }
}
