pub mod deposit;
pub mod settlement;

pub use deposit::run_deposit_service;
pub use settlement::run_settlement_service;
