//! In-memory collaborators for workflow tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use setto_admin_core::commands::Context;
use setto_admin_core::config::DeployConfig;
use setto_admin_core::instruction::AdminOperation;
use setto_admin_core::process::{Invocation, ProcessRunner};
use setto_admin_core::project::ProjectLayout;
use setto_admin_core::prompt::Prompter;
use setto_admin_core::rpc::{
    AccountData, AccountFetcher, SubmitRequest, Submitter, LAMPORTS_PER_SOL,
};
use setto_admin_core::state::{
    ConfigRecord, RelayerRecord, ServerSignerRecord, BPF_LOADER_UPGRADEABLE_ID,
};
use setto_admin_core::{
    AddressDeriver, AdminError, Keypair, NetworkKey, NetworkTable, Result, Seeds,
};
use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;
use tempfile::TempDir;

pub const PROGRAM_NAME: &str = "setto_payment";
pub const LIB_PATH: &str = "programs/setto-payment/src/lib.rs";

pub fn key(byte: u8) -> Pubkey {
    Pubkey::new_from_array([byte; 32])
}

/// Same secret, separate value; `Keypair` is deliberately not `Clone`.
pub fn copy_keypair(keypair: &Keypair) -> Keypair {
    Keypair::from_base58(&keypair.to_base58()).unwrap()
}

// =============================================================================
// FETCHER
// =============================================================================

#[derive(Default)]
pub struct MockFetcher {
    accounts: HashMap<Pubkey, AccountData>,
    balances: HashMap<Pubkey, u64>,
}

impl MockFetcher {
    pub fn insert(&mut self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.insert(
            address,
            AccountData { owner, lamports: 1_000_000, executable: false, data },
        );
    }

    pub fn set_balance(&mut self, address: Pubkey, lamports: u64) {
        self.balances.insert(address, lamports);
    }

    /// Deploys `program_id` under the upgradeable loader with `authority` as its
    /// upgrade authority.
    pub fn deploy_program(&mut self, program_id: Pubkey, authority: Option<Pubkey>) {
        let programdata = Pubkey::new_from_array([0xdd; 32]);

        let mut program = 2u32.to_le_bytes().to_vec();
        program.extend_from_slice(programdata.as_ref());
        self.accounts.insert(
            program_id,
            AccountData {
                owner: BPF_LOADER_UPGRADEABLE_ID,
                lamports: 1_000_000,
                executable: true,
                data: program,
            },
        );

        let mut header = 3u32.to_le_bytes().to_vec();
        header.extend_from_slice(&77u64.to_le_bytes());
        match authority {
            Some(a) => {
                header.push(1);
                header.extend_from_slice(a.as_ref());
            }
            None => header.push(0),
        }
        header.extend_from_slice(&[0u8; 16]);
        self.insert(programdata, BPF_LOADER_UPGRADEABLE_ID, header);
    }
}

#[async_trait]
impl AccountFetcher for MockFetcher {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountData>> {
        Ok(self.accounts.get(address).cloned())
    }

    async fn get_program_accounts_by_size(
        &self,
        program_id: &Pubkey,
        data_size: usize,
    ) -> Result<Vec<(Pubkey, AccountData)>> {
        let mut found: Vec<_> = self
            .accounts
            .iter()
            .filter(|(_, a)| a.owner == *program_id && a.data.len() == data_size)
            .map(|(k, a)| (*k, a.clone()))
            .collect();
        found.sort_by_key(|(k, _)| *k);
        Ok(found)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self.balances.get(address).copied().unwrap_or(10 * LAMPORTS_PER_SOL))
    }
}

// =============================================================================
// SUBMITTER
// =============================================================================

#[derive(Debug, Clone)]
pub struct Submission {
    pub operation: AdminOperation,
    pub instruction: Instruction,
    pub signers: Vec<Pubkey>,
}

#[derive(Default)]
pub struct MockSubmitter {
    pub calls: AtomicU32,
    pub captured: Mutex<Vec<Submission>>,
    pub fail_with: Mutex<Option<String>>,
}

impl MockSubmitter {
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Submission {
        self.captured.lock().unwrap().last().cloned().expect("nothing submitted")
    }
}

#[async_trait]
impl Submitter for MockSubmitter {
    async fn submit(&self, request: SubmitRequest<'_>) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.captured.lock().unwrap().push(Submission {
            operation: request.operation,
            instruction: request.instruction.clone(),
            signers: request.signers.iter().map(|k| k.pubkey()).collect(),
        });
        if let Some(msg) = self.fail_with.lock().unwrap().clone() {
            return Err(AdminError::SubmissionFailed(msg));
        }
        Ok(format!("sig{n}"))
    }
}

// =============================================================================
// PROCESS RUNNER
// =============================================================================

/// A key file as seen by the child while it ran.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub pubkey: Pubkey,
    pub mode: u32,
}

#[derive(Default)]
pub struct MockRunner {
    pub invocations: Mutex<Vec<Invocation>>,
    pub staged: Mutex<Vec<StagedFile>>,
    pub fail: bool,
}

impl MockRunner {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn staged_files(&self) -> Vec<StagedFile> {
        self.staged.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

fn file_mode(path: &PathBuf) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        0o600
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        self.invocations.lock().unwrap().push(invocation.clone());

        // Every argument that names an existing file is a staged key file.
        for arg in &invocation.args {
            let path = PathBuf::from(arg);
            if path.extension().is_some_and(|e| e == "json") && path.is_file() {
                let contents = std::fs::read_to_string(&path).unwrap();
                let pubkey = Keypair::from_cli_json(&contents).unwrap().pubkey();
                self.staged.lock().unwrap().push(StagedFile {
                    mode: file_mode(&path),
                    path,
                    pubkey,
                });
            }
        }

        if self.fail {
            return Err(AdminError::ExternalProcess("solana program deploy exited with 1".into()));
        }
        Ok(())
    }
}

// =============================================================================
// PROMPTER
// =============================================================================

pub enum Answer {
    Network(NetworkKey),
    Pubkey(Option<Pubkey>),
    Keypair(Keypair),
    NoKeypair,
    Confirm(bool),
    Typed(String),
}

/// Replays answers in order and records every question and shown line.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    pub asked: Mutex<Vec<String>>,
    pub shown: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn push(&self, answer: Answer) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    pub fn shown(&self) -> String {
        self.shown.lock().unwrap().join("\n")
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    fn next(&self, question: &str) -> Answer {
        self.asked.lock().unwrap().push(question.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {question}"))
    }
}

impl Prompter for ScriptedPrompter {
    fn select_network(&self, _table: &NetworkTable) -> Result<NetworkKey> {
        match self.next("network") {
            Answer::Network(key) => Ok(key),
            _ => panic!("expected a network answer"),
        }
    }

    fn pubkey(&self, message: &str, default: Option<Pubkey>) -> Result<Pubkey> {
        match self.next(message) {
            Answer::Pubkey(Some(key)) => Ok(key),
            Answer::Pubkey(None) => default
                .ok_or_else(|| AdminError::InvalidInput(format!("{message}: no value"))),
            _ => panic!("expected a pubkey answer for {message}"),
        }
    }

    fn keypair(&self, label: &str) -> Result<Keypair> {
        match self.next(&format!("keypair:{label}")) {
            Answer::Keypair(k) => Ok(k),
            _ => panic!("expected a keypair answer for {label}"),
        }
    }

    fn optional_keypair(&self, label: &str) -> Result<Option<Keypair>> {
        match self.next(&format!("keypair:{label}")) {
            Answer::Keypair(k) => Ok(Some(k)),
            Answer::NoKeypair => Ok(None),
            _ => panic!("expected an optional keypair answer for {label}"),
        }
    }

    fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
        match self.next(message) {
            Answer::Confirm(yes) => Ok(yes),
            _ => panic!("expected a confirmation for {message}"),
        }
    }

    fn typed_confirmation(&self, message: &str, expected: &str) -> Result<bool> {
        match self.next(message) {
            Answer::Typed(text) => Ok(text == expected),
            _ => panic!("expected typed text for {message}"),
        }
    }

    fn show(&self, text: &str) {
        self.shown.lock().unwrap().push(text.to_string());
    }
}

// =============================================================================
// HARNESS
// =============================================================================

pub struct Harness {
    pub program_id: Pubkey,
    pub network: NetworkKey,
    pub fetcher: MockFetcher,
    pub submitter: MockSubmitter,
    pub prompter: ScriptedPrompter,
    pub runner: MockRunner,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runner(MockRunner::default())
    }

    pub fn with_runner(runner: MockRunner) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("staging")).unwrap();
        Self {
            program_id: key(0x5e),
            network: NetworkKey::Devnet,
            fetcher: MockFetcher::default(),
            submitter: MockSubmitter::default(),
            prompter: ScriptedPrompter::default(),
            runner,
            dir,
        }
    }

    pub fn deriver(&self) -> AddressDeriver {
        AddressDeriver::new(self.program_id, Seeds::default())
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    pub fn context(&self) -> Context<'_> {
        Context {
            network: NetworkTable::default().get(self.network).clone(),
            program_id: Some(self.program_id),
            seeds: Seeds::default(),
            fetcher: &self.fetcher,
            submitter: &self.submitter,
            prompter: &self.prompter,
            runner: &self.runner,
            project: ProjectLayout::new(self.dir.path(), PROGRAM_NAME, LIB_PATH),
            deploy: DeployConfig::default(),
            staging_dir: self.staging_dir(),
        }
    }

    pub fn set_config(&mut self, config: &ConfigRecord) {
        let address = self.deriver().config().unwrap().address;
        self.fetcher.insert(address, self.program_id, config.to_bytes());
    }

    pub fn add_server_signer(&mut self, signer: Pubkey) {
        let derived = self.deriver().server_signer(&signer).unwrap();
        let record = ServerSignerRecord { signer, is_active: true, bump: derived.bump };
        self.fetcher.insert(derived.address, self.program_id, record.to_bytes());
    }

    pub fn add_relayer(&mut self, relayer: Pubkey) {
        let derived = self.deriver().relayer(&relayer).unwrap();
        let record = RelayerRecord { relayer, is_active: true, bump: derived.bump };
        self.fetcher.insert(derived.address, self.program_id, record.to_bytes());
    }

    /// A minimal Anchor project with a build artifact.
    pub fn write_project(&self, with_artifact: bool) {
        let root = self.dir.path();
        let lib = root.join(LIB_PATH);
        std::fs::create_dir_all(lib.parent().unwrap()).unwrap();
        std::fs::write(
            &lib,
            "use anchor_lang::prelude::*;\n\ndeclare_id!(\"11111111111111111111111111111111\");\n",
        )
        .unwrap();
        std::fs::write(
            root.join("Anchor.toml"),
            concat!(
                "[programs.devnet]\n",
                "setto_payment = \"11111111111111111111111111111111\"\n\n",
                "[registry]\n",
                "url = \"https://api.apr.dev\"\n",
            ),
        )
        .unwrap();
        std::fs::create_dir_all(root.join("target/idl")).unwrap();
        std::fs::write(
            root.join("target/idl/setto_payment.json"),
            "{\n  \"address\": \"11111111111111111111111111111111\",\n  \"metadata\": {}\n}\n",
        )
        .unwrap();
        if with_artifact {
            std::fs::create_dir_all(root.join("target/deploy")).unwrap();
            std::fs::write(root.join("target/deploy/setto_payment.so"), b"\x7fELF").unwrap();
        }
    }

    /// Files left in the staging directory.
    pub fn staged_leftovers(&self) -> usize {
        std::fs::read_dir(self.staging_dir()).unwrap().count()
    }
}

pub fn config(authority: Pubkey, emergency_admin: Pubkey) -> ConfigRecord {
    ConfigRecord {
        authority,
        emergency_admin,
        fee_recipient: key(0xfe),
        paused: false,
        bump: 255,
    }
}
