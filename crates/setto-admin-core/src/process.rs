//! External program invocation.
//!
//! Arguments are passed as an array to the program directly. No shell is involved, so
//! no argument is ever re-parsed or expanded.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::{AdminError, Result};

/// A fully specified invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Argument list as displayed in logs and errors.
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion. A non-zero exit is an error.
    async fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Runs the child with inherited stdout/stderr so the operator sees its progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        info!(
            program = %invocation.program,
            args = %invocation.display_args(),
            cwd = %invocation.cwd.display(),
            "running external command"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let status = cmd.status().await.map_err(|e| {
            AdminError::ExternalProcess(format!("failed to start {}: {e}", invocation.program))
        })?;

        if !status.success() {
            return Err(AdminError::ExternalProcess(format!(
                "{} {} exited with {status}",
                invocation.program,
                invocation.display_args()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        TokioProcessRunner
            .run(&Invocation::new("true", dir.path()))
            .await
            .unwrap();

        let err = TokioProcessRunner
            .run(&Invocation::new("false", dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::ExternalProcess(_)));
    }

    /// Arguments reach the child verbatim, shell metacharacters included.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_are_not_shell_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("out");
        let invocation = Invocation::new("sh", dir.path())
            .arg("-c")
            .arg("printf '%s' \"$1\" > \"$2\"")
            .arg("sh")
            .arg("$(touch pwned); `x` *")
            .arg(&marker);

        TokioProcessRunner.run(&invocation).await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "$(touch pwned); `x` *");
        assert!(!dir.path().join("pwned").exists());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokioProcessRunner
            .run(&Invocation::new("definitely-not-a-real-binary-6d2f", dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
