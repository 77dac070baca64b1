//! Legacy transaction compilation and signing.
//!
//! ## Wire format
//!
//! ```text
//! transaction = [signature count (compact-u16)] [64-byte signatures] message
//! message     = header(3) [key count (compact-u16)] [32-byte keys] blockhash(32)
//!               [instruction count (compact-u16)] instructions
//! instruction = program index(u8) [account count (compact-u16)] [u8 indices]
//!               [data len (compact-u16)] data
//! ```
//!
//! Keys are ordered fee payer first, then writable signers, read-only signers, writable
//! non-signers, read-only non-signers. Repeated keys merge their signer and writable
//! flags.

use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;

use crate::error::{AdminError, Result};
use crate::keypair::Keypair;

/// Account indices are a single byte.
const MAX_ACCOUNT_KEYS: usize = 256;

/// Append `len` as a compact-u16 (7 bits per byte, high bit = continuation).
pub fn encode_compact_u16(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let mut rem = u16::try_from(len)
        .map_err(|_| AdminError::InvalidInput(format!("length {len} exceeds compact-u16")))?;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone, Copy)]
struct KeyFlags {
    key: Pubkey,
    signer: bool,
    writable: bool,
}

impl Message {
    pub fn compile(
        payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: [u8; 32],
    ) -> Result<Self> {
        let mut entries: Vec<KeyFlags> =
            vec![KeyFlags { key: *payer, signer: true, writable: true }];

        let mut upsert = |key: Pubkey, signer: bool, writable: bool| {
            match entries.iter_mut().find(|e| e.key == key) {
                Some(entry) => {
                    entry.signer |= signer;
                    entry.writable |= writable;
                }
                None => entries.push(KeyFlags { key, signer, writable }),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        // Stable partition keeps first-seen order within each class; payer stays first.
        let (payer_entry, rest) = entries.split_at(1);
        let class = |e: &KeyFlags| match (e.signer, e.writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        let mut ordered: Vec<KeyFlags> = payer_entry.to_vec();
        for c in 0..4 {
            ordered.extend(rest.iter().filter(|e| class(e) == c).copied());
        }

        if ordered.len() > MAX_ACCOUNT_KEYS {
            return Err(AdminError::InvalidInput(format!(
                "transaction references {} accounts, limit is {MAX_ACCOUNT_KEYS}",
                ordered.len()
            )));
        }

        let count = |signer: bool, writable: bool| {
            ordered.iter().filter(|e| e.signer == signer && e.writable == writable).count() as u8
        };
        let header = MessageHeader {
            num_required_signatures: ordered.iter().filter(|e| e.signer).count() as u8,
            num_readonly_signed_accounts: count(true, false),
            num_readonly_unsigned_accounts: count(false, false),
        };

        let account_keys: Vec<Pubkey> = ordered.iter().map(|e| e.key).collect();
        let index_of = |key: &Pubkey| -> Result<u8> {
            account_keys
                .iter()
                .position(|k| k == key)
                .and_then(|i| u8::try_from(i).ok())
                .ok_or_else(|| {
                    AdminError::InvalidInput(format!("account {key} missing from message"))
                })
        };

        let compiled = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<Result<_>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    pub fn signer_keys(&self) -> &[Pubkey] {
        &self.account_keys[..self.header.num_required_signatures as usize]
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];
        encode_compact_u16(&mut out, self.account_keys.len())?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_ref());
        }
        out.extend_from_slice(&self.recent_blockhash);
        encode_compact_u16(&mut out, self.instructions.len())?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_compact_u16(&mut out, ix.accounts.len())?;
            out.extend_from_slice(&ix.accounts);
            encode_compact_u16(&mut out, ix.data.len())?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Message,
}

impl Transaction {
    /// Sign with exactly the keys the message requires. Extra keypairs are ignored;
    /// a missing one is an error.
    pub fn sign(message: Message, keypairs: &[&Keypair]) -> Result<Self> {
        let bytes = message.serialize()?;
        let signatures = message
            .signer_keys()
            .iter()
            .map(|required| {
                keypairs
                    .iter()
                    .find(|kp| kp.pubkey() == *required)
                    .map(|kp| kp.sign(&bytes))
                    .ok_or_else(|| {
                        AdminError::InvalidInput(format!("missing signature for {required}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { signatures, message })
    }

    /// The transaction id: base58 of the fee payer's signature.
    pub fn signature(&self) -> String {
        self.signatures
            .first()
            .map(|sig| bs58::encode(sig).into_string())
            .unwrap_or_default()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        encode_compact_u16(&mut out, self.signatures.len())?;
        for sig in &self.signatures {
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&self.message.serialize()?);
        Ok(out)
    }
}
