//! Error taxonomy shared by every operator workflow.
//!
//! Every variant is terminal for the invocation that produced it. Nothing in this crate
//! retries; the operator re-runs the command, which re-derives and re-fetches all state.

use std::path::PathBuf;

use solana_program::pubkey::Pubkey;
use thiserror::Error;

use crate::auth::Role;
use crate::pda::DerivationError;
use crate::state::DecodeError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AdminError>;

#[derive(Debug, Error)]
pub enum AdminError {
    /// Account bytes are shorter than the record layout requires.
    #[error("malformed {kind} account: expected at least {expected} bytes, got {actual}")]
    MalformedAccount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Leading discriminator matches none of the known record kinds.
    #[error("unknown record kind (discriminator {discriminator})")]
    UnknownRecordKind { discriminator: String },

    /// The config singleton does not exist at its derived address.
    #[error("config not initialized at {config}; deploy and run `initialize` first")]
    NotInitialized { config: Pubkey },

    #[error("config already initialized at {config}")]
    AlreadyInitialized { config: Pubkey },

    /// Supplied credential is not the identity recorded for the required role.
    #[error("provided key is not the {role}: expected {expected}, got {supplied}")]
    AuthorizationDenied {
        role: Role,
        expected: String,
        supplied: Pubkey,
    },

    /// Operator declined a confirmation step. Zero-effect exit.
    #[error("cancelled")]
    UserAborted,

    /// The transaction processor rejected or errored; message is passed through verbatim.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// Submission was sent but never observed as confirmed.
    #[error("transaction {signature} was sent but not confirmed; outcome unknown, re-check with `status`")]
    ConfirmationUnknown { signature: String },

    /// Build output required by deploy/upgrade is missing.
    #[error("program artifact not found at {}; build the program first", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("program {0} is not deployed")]
    ProgramNotDeployed(Pubkey),

    #[error("{kind} already registered: {identity}")]
    AlreadyRegistered { kind: &'static str, identity: Pubkey },

    #[error("{kind} not registered: {identity}")]
    NotRegistered { kind: &'static str, identity: Pubkey },

    /// Requested state change is already in effect (e.g. pausing a paused program).
    #[error("{0}")]
    AlreadyInState(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("external process failed: {0}")]
    ExternalProcess(String),

    #[error("project error: {0}")]
    Project(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DecodeError> for AdminError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::MalformedAccount { kind, expected, actual } => {
                AdminError::MalformedAccount { kind, expected, actual }
            }
            DecodeError::UnknownRecordKind { discriminator } => AdminError::UnknownRecordKind {
                discriminator: hex::encode(discriminator),
            },
        }
    }
}

impl From<reqwest::Error> for AdminError {
    fn from(e: reqwest::Error) -> Self {
        AdminError::Rpc(e.to_string())
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(e: serde_json::Error) -> Self {
        AdminError::Rpc(format!("malformed response: {e}"))
    }
}

impl AdminError {
    /// Whether the command should exit with status zero.
    pub fn is_silent(&self) -> bool {
        matches!(self, AdminError::UserAborted)
    }
}
