//! Operator interaction.
//!
//! Commands ask for values through [`Prompter`] and receive them already validated.
//! The terminal implementation lives in the binary; tests script answers.

use solana_program::pubkey::Pubkey;

use crate::error::{AdminError, Result};
use crate::keypair::Keypair;
use crate::network::{NetworkKey, NetworkTable};

pub trait Prompter: Send + Sync {
    fn select_network(&self, table: &NetworkTable) -> Result<NetworkKey>;

    /// A public key. An empty answer takes `default` when one is given.
    fn pubkey(&self, message: &str, default: Option<Pubkey>) -> Result<Pubkey>;

    /// A secret key, read without echo.
    fn keypair(&self, label: &str) -> Result<Keypair>;

    /// A secret key, or `None` when the operator leaves it empty.
    fn optional_keypair(&self, label: &str) -> Result<Option<Keypair>>;

    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Whether the operator typed exactly `expected`.
    fn typed_confirmation(&self, message: &str, expected: &str) -> Result<bool>;

    /// Print operator-facing text on stdout. Never routed through logging.
    fn show(&self, text: &str);

    /// `confirm`, with a refusal mapped to [`AdminError::UserAborted`].
    fn confirm_or_abort(&self, message: &str) -> Result<()> {
        if self.confirm(message, false)? {
            Ok(())
        } else {
            Err(AdminError::UserAborted)
        }
    }
}
