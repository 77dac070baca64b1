//! Operator control plane for the Setto payment program.
//!
//! Deploys and upgrades the program, inspects its on-chain registry, and submits the
//! privileged admin instructions (initialize, role membership, config updates, pause).
//!
//! # Accounts
//!
//! | Account        | Seeds                              | Size | Gated by          |
//! |----------------|------------------------------------|------|-------------------|
//! | Config         | `["config"]`                       | 106  | -                 |
//! | Server signer  | `["server_signer", signer]`        | 42   | authority         |
//! | Relayer        | `["relayer", relayer]`             | 42   | authority         |
//!
//! The emergency admin recorded in Config may pause, unpause, and run the
//! `emergency_*` membership variants. Program upgrades are gated by the upgrade
//! authority the loader records, not by Config.
//!
//! # Layers
//!
//! - [`pda`], [`state`]: address derivation and fixed-offset record decoding. Pure.
//! - [`registry`]: typed lookups over an [`rpc::AccountFetcher`].
//! - [`auth`]: compares a supplied credential to the recorded role holder.
//! - [`staging`]: short-lived 0600 key files for the `solana` CLI.
//! - [`commands`]: the workflows, each a sequence of fetch, validate, gate,
//!   confirm, submit.
//!
//! Network access, prompts, and child processes are traits so every workflow runs
//! against in-memory doubles in tests.

pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod instruction;
pub mod keypair;
pub mod network;
pub mod pda;
pub mod process;
pub mod project;
pub mod prompt;
pub mod registry;
pub mod rpc;
pub mod staging;
pub mod state;
pub mod transaction;

pub use auth::{authorize, authorize_upgrade, Authorization, Role};
pub use commands::{Command, Context, Outcome};
pub use config::AdminConfig;
pub use error::{AdminError, Result};
pub use keypair::Keypair;
pub use network::{NetworkKey, NetworkProfile, NetworkTable};
pub use pda::{AddressDeriver, DerivedAddress, Seeds};
pub use registry::{Lookup, Registry, RoleListing};
pub use state::{ConfigRecord, RecordKind, RelayerRecord, ServerSignerRecord};
