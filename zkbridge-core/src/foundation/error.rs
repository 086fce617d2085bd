use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ConfigError,
    StorageError,
    SerializationError,
    EncodingError,
    ProviderError,
    RollupRpcError,
    ReceiptRevert,
    ReceiptMissing,
    InstanceTooShort,
    MalformedEvent,
    AmountOverflow,
    InvalidStateTransition,
    FatalInvariant,
    RetryExhausted,
    Message,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("L1 provider error during {operation}: {details}")]
    ProviderError { operation: String, details: String },

    #[error("rollup RPC error during {operation}: {details}")]
    RollupRpcError { operation: String, details: String },

    #[error("settlement transaction reverted: {tx_hash}")]
    ReceiptRevert { tx_hash: String },

    #[error("settlement transaction receipt missing: {tx_hash}")]
    ReceiptMissing { tx_hash: String },

    #[error("proof instance array too short: {len} limbs, need {need}")]
    InstanceTooShort { len: usize, need: usize },

    #[error("malformed event in tx {tx_hash}: {details}")]
    MalformedEvent { tx_hash: String, details: String },

    #[error("amount {amount_wei} does not fit a u64 after scaling by 10^{scale}")]
    AmountOverflow { amount_wei: String, scale: u32 },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("fatal invariant violation: {0}")]
    FatalInvariant(String),

    #[error("{operation} failed after {attempts} attempts: {details}")]
    RetryExhausted { operation: String, attempts: usize, details: String },

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::ConfigError(_) => ErrorCode::ConfigError,
            BridgeError::StorageError { .. } => ErrorCode::StorageError,
            BridgeError::SerializationError { .. } => ErrorCode::SerializationError,
            BridgeError::EncodingError(_) => ErrorCode::EncodingError,
            BridgeError::ProviderError { .. } => ErrorCode::ProviderError,
            BridgeError::RollupRpcError { .. } => ErrorCode::RollupRpcError,
            BridgeError::ReceiptRevert { .. } => ErrorCode::ReceiptRevert,
            BridgeError::ReceiptMissing { .. } => ErrorCode::ReceiptMissing,
            BridgeError::InstanceTooShort { .. } => ErrorCode::InstanceTooShort,
            BridgeError::MalformedEvent { .. } => ErrorCode::MalformedEvent,
            BridgeError::AmountOverflow { .. } => ErrorCode::AmountOverflow,
            BridgeError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            BridgeError::FatalInvariant(_) => ErrorCode::FatalInvariant,
            BridgeError::RetryExhausted { .. } => ErrorCode::RetryExhausted,
            BridgeError::Message(_) => ErrorCode::Message,
        }
    }

    /// Errors that must abort the process rather than be retried:
    /// broken state-machine invariants and undecodable tracking-store
    /// records. Everything else is either skipped or revisited on the
    /// next round.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::FatalInvariant(_) | BridgeError::SerializationError { .. })
    }

    pub fn provider(operation: impl Into<String>, details: impl ToString) -> Self {
        BridgeError::ProviderError { operation: operation.into(), details: details.to_string() }
    }

    pub fn rollup(operation: impl Into<String>, details: impl ToString) -> Self {
        BridgeError::RollupRpcError { operation: operation.into(), details: details.to_string() }
    }

    pub fn storage(operation: impl Into<String>, details: impl ToString) -> Self {
        BridgeError::StorageError { operation: operation.into(), details: details.to_string() }
    }
}

impl From<hex::FromHexError> for BridgeError {
    fn from(err: hex::FromHexError) -> Self {
        BridgeError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<io::Error> for BridgeError {
    fn from(err: io::Error) -> Self {
        BridgeError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<rocksdb::Error> for BridgeError {
    fn from(err: rocksdb::Error) -> Self {
        BridgeError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for BridgeError {
    fn from(err: bincode::Error) -> Self {
        BridgeError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

// NOTE: Remote-call errors (reqwest, ethers) are mapped at the call
// site via `provider()` / `rollup()` to preserve the operation name.
