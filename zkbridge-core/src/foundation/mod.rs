pub mod error;
pub mod types;
pub mod util;

pub use error::{BridgeError, ErrorCode, Result};
pub use types::TaskId;
