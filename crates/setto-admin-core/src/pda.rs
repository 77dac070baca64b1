//! Program derived address (PDA) derivation.
//!
//! Reproduces the runtime's `create_program_address` / `find_program_address` scheme
//! off-chain, bit for bit:
//!
//! ```text
//! address = sha256(seed_0 || .. || seed_n || [bump] || program_id || "ProgramDerivedAddress")
//! ```
//!
//! The first bump, counting down from 255, whose hash is NOT a valid ed25519 point is
//! the canonical bump. Any deviation here silently yields addresses that do not exist
//! on-chain, so the tests pin known-answer vectors.

use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use solana_program::pubkey::Pubkey;
use thiserror::Error;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Maximum number of seeds, including the bump seed.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Domain separator appended after the program id.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seed prefix for the config singleton PDA.
pub const CONFIG_SEED: &[u8] = b"config";

/// Seed prefix for server signer PDAs.
pub const SERVER_SIGNER_SEED: &[u8] = b"server_signer";

/// Seed prefix for relayer PDAs.
pub const RELAYER_SEED: &[u8] = b"relayer";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("too many seeds or seed longer than {MAX_SEED_LEN} bytes")]
    MaxSeedLengthExceeded,

    /// Hash landed on the ed25519 curve for this bump.
    #[error("seeds derive an on-curve address")]
    InvalidSeeds,

    /// No bump in 0..=255 produced an off-curve address.
    #[error("unable to find a viable program address bump seed")]
    NoViableBump,
}

// =============================================================================
// DERIVATION
// =============================================================================

/// Whether 32 bytes decompress to a point on the ed25519 curve.
///
/// Uses the same decompression as the runtime's `bytes_are_curve_point`.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

/// Derive an address from seeds that already include the bump.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<Pubkey, DerivationError> {
    if seeds.len() > MAX_SEEDS {
        return Err(DerivationError::MaxSeedLengthExceeded);
    }
    if seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(DerivationError::MaxSeedLengthExceeded);
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);
    let hash: [u8; 32] = hasher.finalize().into();

    // SECURITY: an on-curve address would have a private key; PDAs must not.
    if is_on_curve(&hash) {
        return Err(DerivationError::InvalidSeeds);
    }

    Ok(Pubkey::new_from_array(hash))
}

/// Find the canonical (highest valid) bump and its address.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), DerivationError> {
    // One slot is reserved for the bump itself.
    if seeds.len() >= MAX_SEEDS {
        return Err(DerivationError::MaxSeedLengthExceeded);
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);

        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(DerivationError::InvalidSeeds) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(DerivationError::NoViableBump)
}

// =============================================================================
// WELL-KNOWN ADDRESSES
// =============================================================================

/// A derived address together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub program_id: Pubkey,
    pub seeds: Vec<Vec<u8>>,
    pub address: Pubkey,
    pub bump: u8,
}

/// Seed prefixes for the program's PDAs.
///
/// Injected into [`AddressDeriver`] rather than read from globals so tests can
/// substitute their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seeds {
    pub config: &'static [u8],
    pub server_signer: &'static [u8],
    pub relayer: &'static [u8],
}

impl Default for Seeds {
    fn default() -> Self {
        Self {
            config: CONFIG_SEED,
            server_signer: SERVER_SIGNER_SEED,
            relayer: RELAYER_SEED,
        }
    }
}

/// Derives the program's well-known addresses.
///
/// Seeds:
/// - config: `["config"]`
/// - server signer: `["server_signer", signer]`
/// - relayer: `["relayer", relayer]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Pubkey,
    seeds: Seeds,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey, seeds: Seeds) -> Self {
        Self { program_id, seeds }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn derive(&self, seeds: &[&[u8]]) -> Result<DerivedAddress, DerivationError> {
        let (address, bump) = find_program_address(seeds, &self.program_id)?;
        Ok(DerivedAddress {
            program_id: self.program_id,
            seeds: seeds.iter().map(|s| s.to_vec()).collect(),
            address,
            bump,
        })
    }

    pub fn config(&self) -> Result<DerivedAddress, DerivationError> {
        self.derive(&[self.seeds.config])
    }

    pub fn server_signer(&self, signer: &Pubkey) -> Result<DerivedAddress, DerivationError> {
        self.derive(&[self.seeds.server_signer, signer.as_ref()])
    }

    pub fn relayer(&self, relayer: &Pubkey) -> Result<DerivedAddress, DerivationError> {
        self.derive(&[self.seeds.relayer, relayer.as_ref()])
    }
}
