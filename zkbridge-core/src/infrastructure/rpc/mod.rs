pub mod retry;

pub use retry::{retry, RETRY_ATTEMPTS, RETRY_DELAY};
