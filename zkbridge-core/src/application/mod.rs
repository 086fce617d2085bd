pub mod deposit;
pub mod nonce;
pub mod scanner;
pub mod settlement;

pub use deposit::DepositProcessor;
pub use nonce::NonceSource;
pub use scanner::{L1Scanner, ScannerConfig};
pub use settlement::SettlementPoller;
