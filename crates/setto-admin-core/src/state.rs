//! Fixed-layout decoding of the program's account records.
//!
//! ## Layouts
//!
//! | Record | Bytes | Fields (offset) |
//! |--------|-------|-----------------|
//! | Config | 106 | tag (0), authority (8), emergency_admin (40), fee_recipient (72), paused (104), bump (105) |
//! | ServerSigner | 42 | tag (0), signer (8), is_active (40), bump (41) |
//! | Relayer | 42 | tag (0), relayer (8), is_active (40), bump (41) |
//!
//! The tag is the 8-byte account discriminator, `sha256("account:<Name>")[..8]`.
//! ServerSigner and Relayer share a byte length, so bulk listings classify by tag
//! before decoding. The config singleton is identified by its address instead.
//!
//! The upgradeable BPF loader's `Program` and `ProgramData` headers are decoded here
//! as well; `upgrade` gates on the recorded upgrade authority.

use solana_program::pubkey::Pubkey;
use thiserror::Error;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Size of the account discriminator prefix.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Config account size:
/// - discriminator: 8 bytes
/// - authority (Pubkey): 32 bytes
/// - emergency_admin (Pubkey): 32 bytes
/// - fee_recipient (Pubkey): 32 bytes
/// - paused (bool): 1 byte
/// - bump (u8): 1 byte
///
/// Total: 106 bytes
pub const CONFIG_SIZE: usize = DISCRIMINATOR_LEN + 32 + 32 + 32 + 1 + 1;

/// Role account size (ServerSigner and Relayer):
/// - discriminator: 8 bytes
/// - identity (Pubkey): 32 bytes
/// - is_active (bool): 1 byte
/// - bump (u8): 1 byte
///
/// Total: 42 bytes
pub const ROLE_RECORD_SIZE: usize = DISCRIMINATOR_LEN + 32 + 1 + 1;

/// `sha256("account:Config")[..8]`
pub const CONFIG_DISCRIMINATOR: [u8; 8] = [155, 12, 170, 224, 30, 250, 204, 130];

/// `sha256("account:ServerSigner")[..8]`
pub const SERVER_SIGNER_DISCRIMINATOR: [u8; 8] = [45, 255, 4, 21, 31, 92, 155, 235];

/// `sha256("account:Relayer")[..8]`
pub const RELAYER_DISCRIMINATOR: [u8; 8] = [168, 116, 52, 174, 161, 196, 71, 218];

mod offsets {
    pub const AUTHORITY: usize = 8;
    pub const EMERGENCY_ADMIN: usize = 40;
    pub const FEE_RECIPIENT: usize = 72;
    pub const PAUSED: usize = 104;
    pub const CONFIG_BUMP: usize = 105;

    pub const IDENTITY: usize = 8;
    pub const IS_ACTIVE: usize = 40;
    pub const ROLE_BUMP: usize = 41;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed {kind} account: expected at least {expected} bytes, got {actual}")]
    MalformedAccount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown record kind {discriminator:?}")]
    UnknownRecordKind { discriminator: [u8; 8] },
}

fn ensure_len(data: &[u8], kind: &'static str, expected: usize) -> Result<(), DecodeError> {
    if data.len() < expected {
        return Err(DecodeError::MalformedAccount {
            kind,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// The first `N` bytes of `data` as a fixed-size buffer.
fn fixed_mut<'a, const N: usize>(
    data: &'a mut [u8],
    kind: &'static str,
) -> Result<&'a mut [u8; N], DecodeError> {
    let actual = data.len();
    data.get_mut(..N)
        .and_then(|head| <&mut [u8; N]>::try_from(head).ok())
        .ok_or(DecodeError::MalformedAccount { kind, expected: N, actual })
}

fn read_pubkey(data: &[u8], offset: usize) -> Pubkey {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&data[offset..offset + 32]);
    Pubkey::new_from_array(bytes)
}

fn read_discriminator(data: &[u8]) -> [u8; 8] {
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&data[..DISCRIMINATOR_LEN]);
    tag
}

// =============================================================================
// CONFIG
// =============================================================================

/// Program configuration singleton.
///
/// PDA seeds: `["config"]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRecord {
    /// Gates add/remove signer and relayer, set-emergency-admin, set-fee-recipient,
    /// transfer-authority.
    pub authority: Pubkey,
    /// Gates pause/unpause and the emergency add/remove commands.
    pub emergency_admin: Pubkey,
    pub fee_recipient: Pubkey,
    pub paused: bool,
    pub bump: u8,
}

impl ConfigRecord {
    pub const KIND: &'static str = "config";

    /// Decode from raw account data. The tag is not checked; the config is identified
    /// by its derived address.
    pub fn try_from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(data, Self::KIND, CONFIG_SIZE)?;

        Ok(Self {
            authority: read_pubkey(data, offsets::AUTHORITY),
            emergency_admin: read_pubkey(data, offsets::EMERGENCY_ADMIN),
            fee_recipient: read_pubkey(data, offsets::FEE_RECIPIENT),
            paused: data[offsets::PAUSED] != 0,
            bump: data[offsets::CONFIG_BUMP],
        })
    }

    /// Write the five fields (and the tag) at their fixed offsets.
    pub fn serialize(&self, data: &mut [u8]) -> Result<(), DecodeError> {
        self.encode(fixed_mut(data, Self::KIND)?);
        Ok(())
    }

    fn encode(&self, data: &mut [u8; CONFIG_SIZE]) {
        data[..DISCRIMINATOR_LEN].copy_from_slice(&CONFIG_DISCRIMINATOR);
        data[offsets::AUTHORITY..offsets::AUTHORITY + 32].copy_from_slice(self.authority.as_ref());
        data[offsets::EMERGENCY_ADMIN..offsets::EMERGENCY_ADMIN + 32]
            .copy_from_slice(self.emergency_admin.as_ref());
        data[offsets::FEE_RECIPIENT..offsets::FEE_RECIPIENT + 32]
            .copy_from_slice(self.fee_recipient.as_ref());
        data[offsets::PAUSED] = self.paused as u8;
        data[offsets::CONFIG_BUMP] = self.bump;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = [0u8; CONFIG_SIZE];
        self.encode(&mut data);
        data.to_vec()
    }
}

// =============================================================================
// ROLE RECORDS
// =============================================================================

/// Registered server signer. PDA seeds: `["server_signer", signer]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSignerRecord {
    pub signer: Pubkey,
    pub is_active: bool,
    pub bump: u8,
}

/// Registered relayer. PDA seeds: `["relayer", relayer]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayerRecord {
    pub relayer: Pubkey,
    pub is_active: bool,
    pub bump: u8,
}

/// The two record kinds stored at [`ROLE_RECORD_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ServerSigner,
    Relayer,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::ServerSigner, RecordKind::Relayer];

    pub fn discriminator(self) -> [u8; 8] {
        match self {
            RecordKind::ServerSigner => SERVER_SIGNER_DISCRIMINATOR,
            RecordKind::Relayer => RELAYER_DISCRIMINATOR,
        }
    }

    /// Match a tag against the known kinds. `None` is the explicit unknown arm.
    pub fn from_discriminator(tag: &[u8; 8]) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| &kind.discriminator() == tag)
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordKind::ServerSigner => "server signer",
            RecordKind::Relayer => "relayer",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared body of both role layouts.
fn decode_role(data: &[u8], kind: &'static str) -> Result<(Pubkey, bool, u8), DecodeError> {
    ensure_len(data, kind, ROLE_RECORD_SIZE)?;
    Ok((
        read_pubkey(data, offsets::IDENTITY),
        data[offsets::IS_ACTIVE] != 0,
        data[offsets::ROLE_BUMP],
    ))
}

fn encode_role(
    data: &mut [u8; ROLE_RECORD_SIZE],
    tag: [u8; 8],
    identity: &Pubkey,
    is_active: bool,
    bump: u8,
) {
    data[..DISCRIMINATOR_LEN].copy_from_slice(&tag);
    data[offsets::IDENTITY..offsets::IDENTITY + 32].copy_from_slice(identity.as_ref());
    data[offsets::IS_ACTIVE] = is_active as u8;
    data[offsets::ROLE_BUMP] = bump;
}

impl ServerSignerRecord {
    pub const KIND: &'static str = "server signer";

    pub fn try_from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        let (signer, is_active, bump) = decode_role(data, Self::KIND)?;
        Ok(Self { signer, is_active, bump })
    }

    pub fn serialize(&self, data: &mut [u8]) -> Result<(), DecodeError> {
        self.encode(fixed_mut(data, Self::KIND)?);
        Ok(())
    }

    fn encode(&self, data: &mut [u8; ROLE_RECORD_SIZE]) {
        encode_role(data, SERVER_SIGNER_DISCRIMINATOR, &self.signer, self.is_active, self.bump);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = [0u8; ROLE_RECORD_SIZE];
        self.encode(&mut data);
        data.to_vec()
    }
}

impl RelayerRecord {
    pub const KIND: &'static str = "relayer";

    pub fn try_from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        let (relayer, is_active, bump) = decode_role(data, Self::KIND)?;
        Ok(Self { relayer, is_active, bump })
    }

    pub fn serialize(&self, data: &mut [u8]) -> Result<(), DecodeError> {
        self.encode(fixed_mut(data, Self::KIND)?);
        Ok(())
    }

    fn encode(&self, data: &mut [u8; ROLE_RECORD_SIZE]) {
        encode_role(data, RELAYER_DISCRIMINATOR, &self.relayer, self.is_active, self.bump);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = [0u8; ROLE_RECORD_SIZE];
        self.encode(&mut data);
        data.to_vec()
    }
}

/// A classified role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRecord {
    ServerSigner(ServerSignerRecord),
    Relayer(RelayerRecord),
}

impl RoleRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            RoleRecord::ServerSigner(_) => RecordKind::ServerSigner,
            RoleRecord::Relayer(_) => RecordKind::Relayer,
        }
    }

    pub fn identity(&self) -> &Pubkey {
        match self {
            RoleRecord::ServerSigner(r) => &r.signer,
            RoleRecord::Relayer(r) => &r.relayer,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            RoleRecord::ServerSigner(r) => r.is_active,
            RoleRecord::Relayer(r) => r.is_active,
        }
    }
}

/// Read the tag of a role-sized buffer without decoding the body.
pub fn classify(data: &[u8]) -> Result<RecordKind, DecodeError> {
    ensure_len(data, "role", DISCRIMINATOR_LEN)?;
    let tag = read_discriminator(data);
    RecordKind::from_discriminator(&tag)
        .ok_or(DecodeError::UnknownRecordKind { discriminator: tag })
}

/// Classify by tag, then decode with the matching layout.
pub fn decode_role_record(data: &[u8]) -> Result<RoleRecord, DecodeError> {
    match classify(data)? {
        RecordKind::ServerSigner => {
            ServerSignerRecord::try_from_slice(data).map(RoleRecord::ServerSigner)
        }
        RecordKind::Relayer => RelayerRecord::try_from_slice(data).map(RoleRecord::Relayer),
    }
}

// =============================================================================
// UPGRADEABLE LOADER
// =============================================================================

/// `BPFLoaderUpgradeab1e11111111111111111111111`
pub const BPF_LOADER_UPGRADEABLE_ID: Pubkey = Pubkey::new_from_array([
    2, 168, 246, 145, 78, 136, 161, 176, 226, 16, 21, 62, 247, 99, 174, 43, 0, 194, 185, 61, 22,
    193, 36, 210, 192, 83, 122, 16, 4, 128, 0, 0,
]);

const LOADER_TAG_PROGRAM: u32 = 2;
const LOADER_TAG_PROGRAM_DATA: u32 = 3;

/// Program account: u32 tag + programdata address.
pub const LOADER_PROGRAM_SIZE: usize = 4 + 32;

/// ProgramData header: u32 tag + u64 slot + Option<Pubkey>.
pub const LOADER_PROGRAM_DATA_HEADER_SIZE: usize = 4 + 8 + 1 + 32;

fn read_loader_tag(data: &[u8], kind: &'static str) -> Result<u32, DecodeError> {
    ensure_len(data, kind, 4)?;
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&data[..4]);
    Ok(u32::from_le_bytes(tag))
}

/// Executable program account owned by the upgradeable loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAccount {
    pub programdata_address: Pubkey,
}

impl ProgramAccount {
    pub const KIND: &'static str = "loader program";

    pub fn try_from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(data, Self::KIND, LOADER_PROGRAM_SIZE)?;
        if read_loader_tag(data, Self::KIND)? != LOADER_TAG_PROGRAM {
            return Err(DecodeError::UnknownRecordKind { discriminator: read_discriminator(data) });
        }
        Ok(Self { programdata_address: read_pubkey(data, 4) })
    }
}

/// Header of the account holding the program's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramDataHeader {
    pub slot: u64,
    /// `None` once the program has been made immutable.
    pub upgrade_authority: Option<Pubkey>,
}

impl ProgramDataHeader {
    pub const KIND: &'static str = "loader program data";

    pub fn try_from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        // Minimum is the `None` form; `Some` needs the full header.
        ensure_len(data, Self::KIND, 4 + 8 + 1)?;
        if read_loader_tag(data, Self::KIND)? != LOADER_TAG_PROGRAM_DATA {
            return Err(DecodeError::UnknownRecordKind { discriminator: read_discriminator(data) });
        }

        let mut slot = [0u8; 8];
        slot.copy_from_slice(&data[4..12]);

        let upgrade_authority = match data[12] {
            0 => None,
            _ => {
                ensure_len(data, Self::KIND, LOADER_PROGRAM_DATA_HEADER_SIZE)?;
                Some(read_pubkey(data, 13))
            }
        };

        Ok(Self { slot: u64::from_le_bytes(slot), upgrade_authority })
    }
}
