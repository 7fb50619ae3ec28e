//! Bearer token persisted in device storage.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use super::{KeyValueStore, StorageError};

const TOKEN_KEY: &str = "auth_token";

/// Reads and writes the bearer token.
///
/// The token is only ever handed out as a [`SecretString`], so it does not
/// show up in `Debug` output or logs.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &TOKEN_KEY)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Wrap a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the stored token, if any. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load(&self) -> Result<Option<SecretString>, StorageError> {
        let token = self.store.get(TOKEN_KEY).await?;
        Ok(token
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from))
    }

    /// Store a token, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn save(&self, token: &SecretString) -> Result<(), StorageError> {
        self.store
            .set(TOKEN_KEY, token.expose_secret().trim().to_string())
            .await
    }

    /// Forget the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(TOKEN_KEY).await
    }
}
