use crate::domain::command::deposit_command;
use crate::foundation::{BridgeError, TaskId};
use async_trait::async_trait;
use ethers::types::{H256, U256};
use log::{debug, trace};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::time::Duration;

pub type Result<T> = std::result::Result<T, BridgeError>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One ready-to-settle proof bundle as returned by the rollup.
/// Numeric fields tolerate JSON numbers as well as decimal or
/// 0x-prefixed hex strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBundle {
    pub task_id: TaskId,
    pub merkle_root: H256,
    #[serde(default)]
    pub withdraw_array: Vec<H256>,
    #[serde(deserialize_with = "de_hex_bytes")]
    pub tx_data: Vec<u8>,
    #[serde(deserialize_with = "de_u256_vec")]
    pub proof_arr: Vec<U256>,
    #[serde(deserialize_with = "de_u256_vec")]
    pub verify_instance_arr: Vec<U256>,
    #[serde(deserialize_with = "de_u256_vec")]
    pub aux_arr: Vec<U256>,
    #[serde(deserialize_with = "de_u64_vec")]
    pub inst_arr: Vec<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexNum {
    Number(u64),
    Text(String),
}

fn flex_to_u64(value: FlexNum) -> std::result::Result<u64, String> {
    match value {
        FlexNum::Number(n) => Ok(n),
        FlexNum::Text(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).map_err(|err| format!("bad hex u64 {:?}: {}", s, err))
            } else {
                s.parse::<u64>().map_err(|err| format!("bad u64 {:?}: {}", s, err))
            }
        }
    }
}

fn flex_to_u256(value: FlexNum) -> std::result::Result<U256, String> {
    match value {
        FlexNum::Number(n) => Ok(U256::from(n)),
        FlexNum::Text(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                U256::from_str_radix(hex, 16).map_err(|err| format!("bad hex u256 {:?}: {}", s, err))
            } else {
                U256::from_dec_str(s).map_err(|err| format!("bad u256 {:?}: {}", s, err))
            }
        }
    }
}

fn de_u64_vec<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error> {
    let raw = Vec::<FlexNum>::deserialize(deserializer)?;
    raw.into_iter().map(|v| flex_to_u64(v).map_err(serde::de::Error::custom)).collect()
}

fn de_u256_vec<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<U256>, D::Error> {
    let raw = Vec::<FlexNum>::deserialize(deserializer)?;
    raw.into_iter().map(|v| flex_to_u256(v).map_err(serde::de::Error::custom)).collect()
}

fn de_hex_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    let stripped = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    hex::decode(stripped).map_err(serde::de::Error::custom)
}

/// Rollup application RPC as used by the bridge: nonce oracle,
/// command submission, deposit verification and the settle queue.
#[async_trait]
pub trait RollupClient: Send + Sync {
    async fn get_nonce(&self) -> Result<u64>;

    /// Submit a raw command buffer signed by the admin identity.
    async fn send_transaction(&self, cmd: &[u64]) -> Result<Value>;

    /// Credit `amount` units of `token_index` to `(pid_1, pid_2)`.
    async fn deposit(&self, nonce: u64, pid_1: u64, pid_2: u64, token_index: u64, amount: u64) -> Result<()>;

    /// Ground-truth oracle: has the deposit identified by this exact
    /// tuple been credited?
    async fn check_deposit(&self, nonce: u64, pid_1: u64, pid_2: u64, token_index: u64, amount: u64) -> Result<bool>;

    /// Bundles ready for settlement, in the order the rollup emitted
    /// them.
    async fn ready_bundles(&self) -> Result<Vec<TaskBundle>>;
}

/// JSON-RPC 2.0 client over HTTP against the rollup application.
pub struct HttpRollupClient {
    client: reqwest::Client,
    base_url: String,
    admin_key: String,
    deposit_opcode: u64,
}

impl HttpRollupClient {
    pub fn new(base_url: &str, admin_key: &str, deposit_opcode: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| BridgeError::ConfigError(format!("rollup http client: {}", err)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_key: admin_key.to_string(),
            deposit_opcode,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        trace!("rollup rpc call method={}", method);
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|err| BridgeError::rollup(method, err))?;
        let body: Value = response.json().await.map_err(|err| BridgeError::rollup(method, err))?;
        if let Some(err) = body.get("error").filter(|err| !err.is_null()) {
            return Err(BridgeError::rollup(method, err));
        }
        body.get("result").cloned().ok_or_else(|| BridgeError::rollup(method, "no result in response"))
    }
}

#[async_trait]
impl RollupClient for HttpRollupClient {
    async fn get_nonce(&self) -> Result<u64> {
        let result = self.call("getNonce", json!({ "prikey": self.admin_key })).await?;
        let flex: FlexNum = serde_json::from_value(result).map_err(|err| BridgeError::rollup("getNonce", err))?;
        flex_to_u64(flex).map_err(|err| BridgeError::rollup("getNonce", err))
    }

    async fn send_transaction(&self, cmd: &[u64]) -> Result<Value> {
        // Command words travel as decimal strings; u64 values overflow
        // the JSON number range some rollup runtimes accept.
        let words: Vec<String> = cmd.iter().map(|word| word.to_string()).collect();
        debug!("rollup sendTransaction words={}", words.len());
        self.call("sendTransaction", json!({ "cmd": words, "prikey": self.admin_key })).await
    }

    async fn deposit(&self, nonce: u64, pid_1: u64, pid_2: u64, token_index: u64, amount: u64) -> Result<()> {
        let cmd = deposit_command(nonce, self.deposit_opcode, pid_1, pid_2, token_index, amount);
        self.send_transaction(&cmd).await?;
        Ok(())
    }

    async fn check_deposit(&self, nonce: u64, pid_1: u64, pid_2: u64, token_index: u64, amount: u64) -> Result<bool> {
        let result = self
            .call(
                "checkDeposit",
                json!({
                    "nonce": nonce.to_string(),
                    "pid_1": pid_1.to_string(),
                    "pid_2": pid_2.to_string(),
                    "tokenIndex": token_index.to_string(),
                    "amount": amount.to_string(),
                }),
            )
            .await?;
        Ok(result.get("data").map_or(false, |data| !data.is_null()))
    }

    async fn ready_bundles(&self) -> Result<Vec<TaskBundle>> {
        let result = self.call("getTaskBundles", json!({})).await?;
        serde_json::from_value(result).map_err(|err| BridgeError::rollup("getTaskBundles", err))
    }
}
