//! Short-lived key files for out-of-process signing.
//!
//! The `solana` CLI only reads keypairs from files. A staged file holds one keypair in
//! the CLI's JSON format, is created owner-only (0600) in the same call that creates it,
//! and is removed when its [`StagedCredential`] guard drops: on success, on error, on
//! panic, and when the surrounding future is cancelled.
//!
//! SECURITY: the path is the only thing handed to the child process. Secret bytes never
//! appear in argv or in log output.

use std::fs::OpenOptions;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::Result;
use crate::keypair::Keypair;

/// Owner read/write only.
pub const STAGED_FILE_MODE: u32 = 0o600;

/// A staged key file. Dropping the guard deletes the file.
#[derive(Debug)]
pub struct StagedCredential {
    path: PathBuf,
    removed: bool,
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "key".to_string()
    } else {
        cleaned
    }
}

fn staged_file_name(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let suffix: [u8; 8] = rand::random();
    format!(".{}-{}-{}.json", sanitize_label(label), nanos, hex::encode(suffix))
}

impl StagedCredential {
    /// Write `keypair` to a fresh file in `dir`. Fails if the name already exists.
    pub fn create(dir: &Path, label: &str, keypair: &Keypair) -> Result<Self> {
        let path = dir.join(staged_file_name(label));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(STAGED_FILE_MODE);
        }
        let mut file = options.open(&path)?;

        // Guard exists before the first byte is written.
        let guard = Self { path, removed: false };

        let json = keypair.to_cli_json();
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        debug!(path = %guard.path.display(), pubkey = %keypair.pubkey(), "staged credential");
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete now. Failures are logged, never returned.
    pub fn remove(mut self) {
        self.remove_inner();
    }

    fn remove_inner(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed staged credential"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove staged credential; delete it manually"
            ),
        }
    }
}

impl Drop for StagedCredential {
    fn drop(&mut self) {
        self.remove_inner();
    }
}

/// Stage one keypair, run `body` with its path, then delete the file.
///
/// The body's result is returned unchanged; a removal failure only logs.
pub async fn with_staged_credential<T, F, Fut>(
    dir: &Path,
    label: &str,
    keypair: &Keypair,
    body: F,
) -> Result<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let staged = StagedCredential::create(dir, label, keypair)?;
    let result = body(staged.path().to_path_buf()).await;
    staged.remove();
    result
}

/// Stage several keypairs (deployer plus program key). Paths are passed to `body` in
/// input order. If any file fails to stage, those already written are removed.
pub async fn with_staged_credentials<T, F, Fut>(
    dir: &Path,
    credentials: &[(&str, &Keypair)],
    body: F,
) -> Result<T>
where
    F: FnOnce(Vec<PathBuf>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut staged = Vec::with_capacity(credentials.len());
    for (label, keypair) in credentials {
        staged.push(StagedCredential::create(dir, label, keypair)?);
    }

    let paths = staged.iter().map(|s| s.path().to_path_buf()).collect();
    let result = body(paths).await;
    for guard in staged {
        guard.remove();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdminError;

    #[test]
    fn test_file_name_shape() {
        let name = staged_file_name("deployer");
        assert!(name.starts_with(".deployer-"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.matches('-').count(), 2);
        assert_ne!(staged_file_name("deployer"), staged_file_name("deployer"));
    }

    #[test]
    fn test_label_is_sanitized() {
        assert_eq!(sanitize_label("../etc/passwd"), "---etc-passwd");
        assert_eq!(sanitize_label(""), "key");
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = Keypair::generate();
        let staged = StagedCredential::create(dir.path(), "program", &keypair).unwrap();
        let path = staged.path().to_path_buf();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Keypair::from_cli_json(&contents).unwrap().pubkey(), keypair.pubkey());

        drop(staged);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let staged =
            StagedCredential::create(dir.path(), "deployer", &Keypair::generate()).unwrap();
        let mode = std::fs::metadata(staged.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, STAGED_FILE_MODE);
    }

    #[test]
    fn test_guard_removes_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = Keypair::generate();
        let mut seen = None;

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let staged = StagedCredential::create(dir.path(), "deployer", &keypair).unwrap();
            seen = Some(staged.path().to_path_buf());
            panic!("child process handling blew up");
        }));

        assert!(outcome.is_err());
        assert!(!seen.unwrap().exists());
    }

    #[tokio::test]
    async fn test_body_error_is_returned_and_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = Keypair::generate();

        let result: Result<()> =
            with_staged_credential(dir.path(), "upgrade-authority", &keypair, |path| {
                let existed = path.is_file();
                async move {
                    assert!(existed);
                    Err(AdminError::ExternalProcess("solana exited with 1".into()))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(AdminError::ExternalProcess(ref msg)) if msg == "solana exited with 1"
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_body_error_kept_when_file_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = Keypair::generate();

        // The body deletes the file itself, so the guard's removal finds nothing.
        let result: Result<()> =
            with_staged_credential(dir.path(), "deployer", &keypair, |path| async move {
                std::fs::remove_file(&path).unwrap();
                Err(AdminError::ExternalProcess("killed".into()))
            })
            .await;

        assert!(matches!(result, Err(AdminError::ExternalProcess(ref msg)) if msg == "killed"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_create_fails_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(StagedCredential::create(&missing, "deployer", &Keypair::generate()).is_err());
    }
}
