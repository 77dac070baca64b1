//! Locally held ed25519 credentials.
//!
//! SECURITY: secret bytes live only inside `SigningKey` (zeroized on drop) or inside
//! `Zeroizing` buffers. `Debug` prints the public key only.

use std::fmt::{self, Write as _};

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use solana_program::pubkey::Pubkey;
use zeroize::Zeroizing;

use crate::error::AdminError;

/// Secret (32) followed by public (32).
pub const KEYPAIR_LEN: usize = 64;

pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self { signing: SigningKey::generate(&mut OsRng) }
    }

    /// Parse a base58-encoded 64-byte keypair. The public half must match the secret.
    pub fn from_base58(encoded: &str) -> Result<Self, AdminError> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|_| AdminError::InvalidKeypair("not valid base58".into()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Parse the CLI keypair file format: a JSON array of 64 byte values.
    pub fn from_cli_json(json: &str) -> Result<Self, AdminError> {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(json)
                .map_err(|_| AdminError::InvalidKeypair("not a JSON byte array".into()))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AdminError> {
        let array: &[u8; KEYPAIR_LEN] = bytes.try_into().map_err(|_| {
            AdminError::InvalidKeypair(format!(
                "expected {KEYPAIR_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        let signing = SigningKey::from_keypair_bytes(array).map_err(|_| {
            AdminError::InvalidKeypair("public key does not match secret key".into())
        })?;
        Ok(Self { signing })
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    pub fn to_base58(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing.to_keypair_bytes());
        Zeroizing::new(bs58::encode(bytes.as_ref()).into_string())
    }

    /// `[b0,b1,...,b63]`, the format `solana --keypair` reads.
    pub fn to_cli_json(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing.to_keypair_bytes());
        let mut out = Zeroizing::new(String::with_capacity(KEYPAIR_LEN * 4 + 2));
        out.push('[');
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            // Writing to a String cannot fail.
            let _ = write!(out, "{b}");
        }
        out.push(']');
        out
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    #[test]
    fn test_base58_round_trip() {
        let keypair = Keypair::generate();
        let parsed = Keypair::from_base58(&keypair.to_base58()).unwrap();
        assert_eq!(parsed.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_cli_json_round_trip() {
        let keypair = Keypair::generate();
        let json = keypair.to_cli_json();
        assert!(json.starts_with('[') && json.ends_with(']'));
        assert_eq!(json.split(',').count(), KEYPAIR_LEN);
        assert_eq!(Keypair::from_cli_json(&json).unwrap().pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let short = bs58::encode([1u8; 32]).into_string();
        let err = Keypair::from_base58(&short).unwrap_err();
        assert!(err.to_string().contains("expected 64 bytes, got 32"));
    }

    #[test]
    fn test_rejects_mismatched_public_half() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let mut bytes = a.signing.to_keypair_bytes();
        bytes[32..].copy_from_slice(b.pubkey().as_ref());
        assert!(Keypair::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_rejects_non_base58() {
        assert!(Keypair::from_base58("0OIl").is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let keypair = Keypair::generate();
        let sig = Signature::from_bytes(&keypair.sign(b"message"));
        let vk = VerifyingKey::from_bytes(&keypair.pubkey().to_bytes()).unwrap();
        assert!(vk.verify(b"message", &sig).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let keypair = Keypair::generate();
        let debug = format!("{keypair:?}");
        assert!(debug.contains(&keypair.pubkey().to_string()));
        assert!(!debug.contains(keypair.to_base58().as_str()));
    }
}
