use crate::foundation::BridgeError;
use crate::infrastructure::l2::RollupClient;
use crate::infrastructure::rpc::{retry, RETRY_ATTEMPTS, RETRY_DELAY};
use std::sync::Arc;

/// Monotonic nonce oracle for the admin identity. Nonces are
/// advisory: the rollup validates them on submit, and a stale one
/// simply fails the submission, which the deposit retry path absorbs.
pub struct NonceSource {
    l2: Arc<dyn RollupClient>,
}

impl NonceSource {
    pub fn new(l2: Arc<dyn RollupClient>) -> Self {
        Self { l2 }
    }

    pub async fn next_nonce(&self) -> Result<u64, BridgeError> {
        retry("getNonce", RETRY_ATTEMPTS, RETRY_DELAY, || self.l2.get_nonce()).await
    }
}
