//! Chain access: the collaborator traits and their JSON-RPC implementation.
//!
//! Commands depend on [`AccountFetcher`] and [`Submitter`] only, so tests substitute
//! in-memory fakes. [`RpcClient`] speaks the cluster's HTTP JSON-RPC API.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::error::{AdminError, Result};
use crate::instruction::AdminOperation;
use crate::keypair::Keypair;
use crate::transaction::{Message, Transaction};

/// 1 SOL in lamports.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Raw account as stored on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    pub owner: Pubkey,
    pub lamports: u64,
    pub executable: bool,
    pub data: Vec<u8>,
}

/// Read access to chain state.
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    /// `Ok(None)` when no account exists at `address`.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountData>>;

    /// All accounts owned by `program_id` whose data length is exactly `data_size`.
    async fn get_program_accounts_by_size(
        &self,
        program_id: &Pubkey,
        data_size: usize,
    ) -> Result<Vec<(Pubkey, AccountData)>>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;
}

/// A privileged request ready to be signed and sent.
pub struct SubmitRequest<'a> {
    pub operation: AdminOperation,
    pub instruction: Instruction,
    /// The first signer pays the fee.
    pub signers: Vec<&'a Keypair>,
}

impl SubmitRequest<'_> {
    pub fn program_id(&self) -> &Pubkey {
        &self.instruction.program_id
    }
}

/// Submits a request and waits for confirmation. Returns the transaction signature.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, request: SubmitRequest<'_>) -> Result<String>;
}

// =============================================================================
// JSON-RPC CLIENT
// =============================================================================

/// Bounded confirmation polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

pub struct RpcClient {
    client: Client,
    url: String,
    confirm: ConfirmPolicy,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    /// `[base64, "base64"]`
    data: (String, String),
    executable: bool,
    lamports: u64,
    owner: String,
}

#[derive(Debug, Deserialize)]
struct KeyedUiAccount {
    pubkey: String,
    account: UiAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

fn parse_pubkey(s: &str) -> Result<Pubkey> {
    s.parse::<Pubkey>()
        .map_err(|_| AdminError::Rpc(format!("malformed address in response: {s}")))
}

impl TryFrom<UiAccount> for AccountData {
    type Error = AdminError;

    fn try_from(ui: UiAccount) -> Result<Self> {
        let (encoded, encoding) = ui.data;
        if encoding != "base64" {
            return Err(AdminError::Rpc(format!("unexpected account encoding {encoding}")));
        }
        let data = BASE64
            .decode(encoded)
            .map_err(|e| AdminError::Rpc(format!("malformed account data: {e}")))?;
        Ok(Self {
            owner: parse_pubkey(&ui.owner)?,
            lamports: ui.lamports,
            executable: ui.executable,
            data,
        })
    }
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration, confirm: ConfirmPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::Rpc(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            confirm,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        debug!(method, url = %self.url, "rpc request");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: RpcResponse<T> = response.json().await?;

        if let Some(err) = parsed.error {
            return Err(rpc_error(method, err));
        }
        parsed
            .result
            .ok_or_else(|| AdminError::Rpc(format!("{method}: response has no result")))
    }

    pub async fn latest_blockhash(&self) -> Result<[u8; 32]> {
        let res: WithContext<LatestBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": "confirmed" }]))
            .await?;
        let bytes = bs58::decode(&res.value.blockhash)
            .into_vec()
            .map_err(|_| AdminError::Rpc("malformed blockhash".into()))?;
        bytes
            .try_into()
            .map_err(|_| AdminError::Rpc("blockhash is not 32 bytes".into()))
    }

    /// Sends a signed transaction. Preflight rejections surface as `SubmissionFailed`.
    pub async fn send_transaction(&self, tx: &Transaction) -> Result<String> {
        let wire = BASE64.encode(tx.serialize()?);
        let result: Result<String> = self
            .call(
                "sendTransaction",
                json!([wire, { "encoding": "base64", "preflightCommitment": "confirmed" }]),
            )
            .await;
        match result {
            Err(AdminError::Rpc(msg)) if msg.starts_with("sendTransaction") => {
                Err(AdminError::SubmissionFailed(msg))
            }
            other => other,
        }
    }

    /// Polls until confirmed or finalized. Runs out as `ConfirmationUnknown`.
    pub async fn confirm(&self, signature: &str) -> Result<()> {
        for attempt in 1..=self.confirm.attempts {
            let res: WithContext<Vec<Option<SignatureStatus>>> = self
                .call("getSignatureStatuses", json!([[signature]]))
                .await?;

            if let Some(Some(status)) = res.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(AdminError::SubmissionFailed(format!(
                        "transaction {signature} failed: {err}"
                    )));
                }
                if matches!(
                    status.confirmation_status.as_deref(),
                    Some("confirmed" | "finalized")
                ) {
                    debug!(signature, attempt, "transaction confirmed");
                    return Ok(());
                }
            }
            tokio::time::sleep(self.confirm.interval).await;
        }

        warn!(signature, attempts = self.confirm.attempts, "confirmation polling exhausted");
        Err(AdminError::ConfirmationUnknown {
            signature: signature.to_string(),
        })
    }
}

fn rpc_error(method: &str, err: RpcErrorBody) -> AdminError {
    let logs = err
        .data
        .as_ref()
        .and_then(|d| d.get("logs"))
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n  ")
        })
        .filter(|s| !s.is_empty());

    match logs {
        Some(logs) => {
            AdminError::Rpc(format!("{method}: {} ({})\n  {logs}", err.message, err.code))
        }
        None => AdminError::Rpc(format!("{method}: {} ({})", err.message, err.code)),
    }
}

#[async_trait]
impl AccountFetcher for RpcClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountData>> {
        let res: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64", "commitment": "confirmed" }]),
            )
            .await?;
        res.value.map(AccountData::try_from).transpose()
    }

    async fn get_program_accounts_by_size(
        &self,
        program_id: &Pubkey,
        data_size: usize,
    ) -> Result<Vec<(Pubkey, AccountData)>> {
        let res: Vec<KeyedUiAccount> = self
            .call(
                "getProgramAccounts",
                json!([
                    program_id.to_string(),
                    {
                        "encoding": "base64",
                        "commitment": "confirmed",
                        "filters": [{ "dataSize": data_size }],
                    }
                ]),
            )
            .await?;

        res.into_iter()
            .map(|keyed| Ok((parse_pubkey(&keyed.pubkey)?, AccountData::try_from(keyed.account)?)))
            .collect()
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        let res: WithContext<u64> = self
            .call("getBalance", json!([address.to_string(), { "commitment": "confirmed" }]))
            .await?;
        Ok(res.value)
    }
}

#[async_trait]
impl Submitter for RpcClient {
    async fn submit(&self, request: SubmitRequest<'_>) -> Result<String> {
        let payer = request
            .signers
            .first()
            .ok_or_else(|| AdminError::InvalidInput("request has no signer".into()))?;

        let blockhash = self.latest_blockhash().await?;
        let message = Message::compile(&payer.pubkey(), &[request.instruction], blockhash)?;
        let tx = Transaction::sign(message, &request.signers)?;

        let signature = self.send_transaction(&tx).await?;
        info!(operation = %request.operation, %signature, "transaction sent");

        self.confirm(&signature).await?;
        Ok(signature)
    }
}
