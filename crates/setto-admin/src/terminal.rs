//! Interactive prompts on the controlling terminal.
//!
//! Secret keys are read with echo disabled and held in zeroizing buffers until
//! parsed. Invalid public keys are asked for again; invalid secret keys fail the
//! command.

use std::io::{self, BufRead, Write};

use setto_admin_core::network::{NetworkKey, NetworkTable};
use setto_admin_core::prompt::Prompter;
use setto_admin_core::{AdminError, Keypair, Result};
use solana_program::pubkey::Pubkey;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        // EOF on stdin
        return Err(AdminError::UserAborted);
    }
    Ok(line.trim().to_string())
}

#[cfg(unix)]
mod echo {
    /// Restores the saved terminal mode on drop.
    pub struct EchoGuard {
        original: libc::termios,
    }

    impl EchoGuard {
        /// `None` when stdin is not a terminal.
        pub fn disable() -> Option<Self> {
            let fd = libc::STDIN_FILENO;
            // SAFETY: fd is a valid descriptor; termios is plain data filled by tcgetattr.
            unsafe {
                if libc::isatty(fd) == 0 {
                    return None;
                }
                let mut term: libc::termios = std::mem::zeroed();
                if libc::tcgetattr(fd, &mut term) != 0 {
                    return None;
                }
                let original = term;
                term.c_lflag &= !libc::ECHO;
                term.c_lflag |= libc::ECHONL;
                if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
                    return None;
                }
                Some(Self { original })
            }
        }
    }

    impl Drop for EchoGuard {
        fn drop(&mut self) {
            // SAFETY: restores the attributes captured in `disable`.
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
            }
        }
    }
}

fn read_hidden(prompt: &str) -> Result<Zeroizing<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    #[cfg(unix)]
    let _guard = echo::EchoGuard::disable();

    let mut line = Zeroizing::new(String::new());
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(AdminError::UserAborted);
    }
    Ok(Zeroizing::new(line.trim().to_string()))
}

/// Base58 (wallet export) or a JSON byte array (CLI keypair file contents).
pub fn parse_keypair(input: &str) -> Result<Keypair> {
    let input = input.trim();
    if input.starts_with('[') {
        Keypair::from_cli_json(input)
    } else {
        Keypair::from_base58(input)
    }
}

/// `y`/`yes`/`n`/`no`, any case. Empty takes `default`.
pub fn parse_yes_no(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// A 1-based menu index or a network name.
pub fn parse_network_choice(input: &str, table: &NetworkTable) -> Option<NetworkKey> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| table.profiles().get(i)).map(|p| p.key);
    }
    input.parse().ok()
}

impl Prompter for TerminalPrompter {
    fn select_network(&self, table: &NetworkTable) -> Result<NetworkKey> {
        println!("Select network:");
        for (i, profile) in table.profiles().iter().enumerate() {
            println!("  {}. {} ({})", i + 1, profile.name, profile.rpc_url);
        }
        loop {
            let answer = read_line("Network: ")?;
            match parse_network_choice(&answer, table) {
                Some(key) => return Ok(key),
                None => println!("Enter a number from the list or a network name."),
            }
        }
    }

    fn pubkey(&self, message: &str, default: Option<Pubkey>) -> Result<Pubkey> {
        let prompt = match default {
            Some(d) => format!("{message} [{d}]: "),
            None => format!("{message}: "),
        };
        loop {
            let answer = read_line(&prompt)?;
            if answer.is_empty() {
                if let Some(d) = default {
                    return Ok(d);
                }
                println!("A value is required.");
                continue;
            }
            match answer.parse::<Pubkey>() {
                Ok(key) => return Ok(key),
                Err(_) => println!("'{answer}' is not a valid base58 public key."),
            }
        }
    }

    fn keypair(&self, label: &str) -> Result<Keypair> {
        let input = read_hidden(&format!("Enter {label} private key (base58 or JSON array): "))?;
        if input.is_empty() {
            return Err(AdminError::InvalidKeypair(format!("no {label} key entered")));
        }
        let keypair = parse_keypair(&input)?;
        println!("  {label}: {}", keypair.pubkey());
        Ok(keypair)
    }

    fn optional_keypair(&self, label: &str) -> Result<Option<Keypair>> {
        let input = read_hidden(&format!("Enter {label} private key: "))?;
        if input.is_empty() {
            return Ok(None);
        }
        let keypair = parse_keypair(&input)?;
        println!("  {label}: {}", keypair.pubkey());
        Ok(Some(keypair))
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = read_line(&format!("{message} ({hint}) "))?;
            match parse_yes_no(&answer, default) {
                Some(yes) => return Ok(yes),
                None => println!("Please answer y or n."),
            }
        }
    }

    fn typed_confirmation(&self, message: &str, expected: &str) -> Result<bool> {
        Ok(read_line(&format!("{message}: "))? == expected)
    }

    fn show(&self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keypair_formats() {
        let keypair = Keypair::generate();
        let from_b58 = parse_keypair(&keypair.to_base58()).unwrap();
        let from_json = parse_keypair(&format!("  {}\n", keypair.to_cli_json().as_str())).unwrap();
        assert_eq!(from_b58.pubkey(), keypair.pubkey());
        assert_eq!(from_json.pubkey(), keypair.pubkey());
        assert!(parse_keypair("garbage!").is_err());
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("", false), Some(false));
        assert_eq!(parse_yes_no("", true), Some(true));
        assert_eq!(parse_yes_no(" YES ", false), Some(true));
        assert_eq!(parse_yes_no("n", true), Some(false));
        assert_eq!(parse_yes_no("maybe", true), None);
    }

    #[test]
    fn test_parse_network_choice() {
        let table = NetworkTable::default();
        assert_eq!(parse_network_choice("1", &table), Some(NetworkKey::Mainnet));
        assert_eq!(parse_network_choice("2", &table), Some(NetworkKey::Devnet));
        assert_eq!(parse_network_choice("devnet", &table), Some(NetworkKey::Devnet));
        assert_eq!(parse_network_choice("0", &table), None);
        assert_eq!(parse_network_choice("3", &table), None);
    }
}
