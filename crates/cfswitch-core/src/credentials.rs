// ── Inbound credential seam ──

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::CoreError;

/// Source of the bearer token that callers of the HTTP API must present.
///
/// `ensure_token` is idempotent: it returns the same token on every call
/// until the provider rotates it, creating one on first use if needed.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn ensure_token(&self) -> Result<SecretString, CoreError>;
}
