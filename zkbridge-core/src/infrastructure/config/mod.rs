use crate::foundation::BridgeError;
use ethers::types::H160;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const RPC_PROVIDER_ENV: &str = "ZKBRIDGE_RPC_PROVIDER";
pub const SERVER_ADMIN_KEY_ENV: &str = "ZKBRIDGE_SERVER_ADMIN_KEY";
pub const SETTLEMENT_CONTRACT_ENV: &str = "ZKBRIDGE_SETTLEMENT_CONTRACT_ADDRESS";
pub const DATA_DIR_ENV: &str = "ZKBRIDGE_DATA_DIR";
pub const ROLLUP_RPC_URL_ENV: &str = "ZKBRIDGE_ROLLUP_RPC_URL";
pub const SETTLER_PRIVATE_KEY_ENV: &str = "ZKBRIDGE_SETTLER_PRIVATE_KEY";
pub const CHAIN_ID_ENV: &str = "ZKBRIDGE_CHAIN_ID";
pub const DEPOSIT_OPCODE_ENV: &str = "ZKBRIDGE_DEPOSIT_OPCODE";
pub const WITHDRAW_OPCODE_ENV: &str = "ZKBRIDGE_WITHDRAW_OPCODE";
pub const START_BLOCK_ENV: &str = "ZKBRIDGE_START_BLOCK";
pub const TOKEN_PRECISION_ENV: &str = "ZKBRIDGE_TOKEN_PRECISION";

pub const DEFAULT_ROLLUP_RPC_URL: &str = "http://localhost:3000";

/// Which daemon the orchestrator runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceMode {
    Deposit,
    Settlement,
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Deposit => write!(f, "deposit"),
            ServiceMode::Settlement => write!(f, "settlement"),
        }
    }
}

impl FromStr for ServiceMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(ServiceMode::Deposit),
            "settlement" => Ok(ServiceMode::Settlement),
            other => Err(BridgeError::ConfigError(format!("unknown service mode: {}", other))),
        }
    }
}

/// Validated configuration record shared by both daemons.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// L1 JSON-RPC endpoint.
    pub rpc_provider: String,
    /// Admin identity key submitted with every rollup command.
    pub server_admin_key: String,
    pub settlement_contract: H160,
    /// Directory holding the per-contract tracking stores.
    pub data_dir: PathBuf,
    pub rollup_rpc_url: String,
    /// L1 key used by the settlement submitter; required in
    /// settlement mode only.
    pub settler_private_key: Option<String>,
    pub chain_id: Option<u64>,
    pub deposit_opcode: u64,
    pub withdraw_opcode: u64,
    pub start_block: Option<u64>,
    /// Token decimals already applied on L1; the deposit divisor is
    /// `10^(18 - token_precision)`.
    pub token_precision: u32,
}

fn require_env(name: &str) -> Result<String, BridgeError> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(BridgeError::ConfigError(format!("{} is set but empty", name)))
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(BridgeError::ConfigError(format!("{} is not set", name))),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T, BridgeError>
where
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|err| BridgeError::ConfigError(format!("{}={} is invalid: {}", name, raw, err)))
}

impl BridgeConfig {
    /// Load the record from the environment. A `.env` file in the
    /// working directory is honored if present.
    pub fn from_env() -> Result<Self, BridgeError> {
        dotenvy::dotenv().ok();

        let contract_raw = require_env(SETTLEMENT_CONTRACT_ENV)?;
        let settlement_contract = H160::from_str(&contract_raw)
            .map_err(|err| BridgeError::ConfigError(format!("{}={} is not an address: {}", SETTLEMENT_CONTRACT_ENV, contract_raw, err)))?;

        let deposit_opcode_raw = require_env(DEPOSIT_OPCODE_ENV)?;
        let withdraw_opcode_raw = require_env(WITHDRAW_OPCODE_ENV)?;

        let chain_id = match optional_env(CHAIN_ID_ENV) {
            Some(raw) => Some(parse_env::<u64>(CHAIN_ID_ENV, &raw)?),
            None => None,
        };
        let start_block = match optional_env(START_BLOCK_ENV) {
            Some(raw) => Some(parse_env::<u64>(START_BLOCK_ENV, &raw)?),
            None => None,
        };
        let token_precision = match optional_env(TOKEN_PRECISION_ENV) {
            Some(raw) => parse_env::<u32>(TOKEN_PRECISION_ENV, &raw)?,
            None => 0,
        };

        Ok(Self {
            rpc_provider: require_env(RPC_PROVIDER_ENV)?,
            server_admin_key: require_env(SERVER_ADMIN_KEY_ENV)?,
            settlement_contract,
            data_dir: PathBuf::from(optional_env(DATA_DIR_ENV).unwrap_or_else(|| ".zkbridge".to_string())),
            rollup_rpc_url: optional_env(ROLLUP_RPC_URL_ENV).unwrap_or_else(|| DEFAULT_ROLLUP_RPC_URL.to_string()),
            settler_private_key: optional_env(SETTLER_PRIVATE_KEY_ENV),
            chain_id,
            deposit_opcode: parse_env::<u64>(DEPOSIT_OPCODE_ENV, &deposit_opcode_raw)?,
            withdraw_opcode: parse_env::<u64>(WITHDRAW_OPCODE_ENV, &withdraw_opcode_raw)?,
            start_block,
            token_precision,
        })
    }

    pub fn validate(&self, mode: ServiceMode) -> Result<(), BridgeError> {
        if self.token_precision > 18 {
            return Err(BridgeError::ConfigError(format!("token precision {} exceeds 18", self.token_precision)));
        }
        if self.settlement_contract == H160::zero() {
            return Err(BridgeError::ConfigError("settlement contract address is the zero address".to_string()));
        }
        if mode == ServiceMode::Settlement && self.settler_private_key.is_none() {
            return Err(BridgeError::ConfigError(format!("settlement mode requires {}", SETTLER_PRIVATE_KEY_ENV)));
        }
        Ok(())
    }

    /// `<data_dir>/<0xaddress>_deposit`, one tracking store per
    /// settlement contract.
    pub fn deposit_store_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{:#x}_deposit", self.settlement_contract))
    }

    pub fn settlement_store_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{:#x}_settlement", self.settlement_contract))
    }
}
