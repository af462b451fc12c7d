// ── Inbound API token providers ──
//
// The HTTP API expects `Authorization: Bearer <token>`. In a deployment
// the token lives in the OS keyring and is created on first start; for
// local development a throwaway token is generated per process.

use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::info;

use cfswitch_core::{CoreError, TokenProvider};

use crate::ConfigError;

/// Keyring service name used for the inbound token.
pub const KEYRING_SERVICE: &str = "cf-switch";
/// Keyring user name used for the inbound token.
pub const KEYRING_USER: &str = "api-token";

/// 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

// ── Keyring ─────────────────────────────────────────────────────────

/// Token stored in the OS keyring, generated and stored if absent.
pub struct KeyringTokenProvider {
    entry: keyring::Entry,
    cached: Mutex<Option<SecretString>>,
}

impl KeyringTokenProvider {
    /// Provider for the default `cf-switch` / `api-token` entry.
    pub fn new() -> Result<Self, ConfigError> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        Ok(Self::with_entry(entry))
    }

    pub fn with_entry(entry: keyring::Entry) -> Self {
        Self {
            entry,
            cached: Mutex::new(None),
        }
    }

    fn load_or_create(&self) -> Result<SecretString, ConfigError> {
        match self.entry.get_password() {
            Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token)),
            Ok(_) | Err(keyring::Error::NoEntry) => {
                let token = generate_token();
                self.entry.set_password(&token)?;
                info!(
                    service = KEYRING_SERVICE,
                    user = KEYRING_USER,
                    "generated API token and stored it in the keyring"
                );
                Ok(SecretString::from(token))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TokenProvider for KeyringTokenProvider {
    async fn ensure_token(&self) -> Result<SecretString, CoreError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| CoreError::Internal("token cache poisoned".into()))?;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self
            .load_or_create()
            .map_err(|e| CoreError::Credentials {
                message: e.to_string(),
            })?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

// ── Local ───────────────────────────────────────────────────────────

/// In-memory token for local runs. Fixed for the life of the process.
pub struct LocalTokenProvider {
    token: SecretString,
}

impl LocalTokenProvider {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self::with_token(SecretString::from(generate_token()))
    }

    pub fn with_token(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for LocalTokenProvider {
    async fn ensure_token(&self) -> Result<SecretString, CoreError> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn mock_entry() -> keyring::Entry {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).unwrap()
    }

    #[test]
    fn generated_tokens_are_64_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn keyring_token_is_created_once() {
        let provider = KeyringTokenProvider::with_entry(mock_entry());

        let first = provider.ensure_token().await.unwrap();
        let second = provider.ensure_token().await.unwrap();

        assert_eq!(first.expose_secret().len(), 64);
        assert_eq!(first.expose_secret(), second.expose_secret());
        assert_eq!(provider.entry.get_password().unwrap(), first.expose_secret());
    }

    #[tokio::test]
    async fn keyring_token_is_reused_when_present() {
        let entry = mock_entry();
        entry.set_password("existing-token").unwrap();
        let provider = KeyringTokenProvider::with_entry(entry);

        let token = provider.ensure_token().await.unwrap();
        assert_eq!(token.expose_secret(), "existing-token");
    }

    #[tokio::test]
    async fn local_token_is_stable() {
        let provider = LocalTokenProvider::generate();
        let a = provider.ensure_token().await.unwrap();
        let b = provider.ensure_token().await.unwrap();
        assert_eq!(a.expose_secret(), b.expose_secret());
    }
}
