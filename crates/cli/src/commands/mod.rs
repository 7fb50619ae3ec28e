//! CLI command implementations.

pub mod address;
pub mod auth;
pub mod cart;
pub mod checkout;

use std::sync::Arc;

use rust_decimal::Decimal;
use shopfront_client::{
    AddressBook, AddressError, ApiClient, ApiError, CheckoutError, ClientConfig, ClientError,
    FileStore, KeyValueStore, StorageError, TokenStore,
};
use shopfront_core::{CurrencyCode, Price};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Whether signing in again would help.
    pub const fn requires_login(&self) -> bool {
        match self {
            Self::Client(e) => e.requires_login(),
            Self::Io(_) => false,
        }
    }
}

macro_rules! impl_from_client_error {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(e: $source) -> Self {
                    Self::Client(ClientError::from(e))
                }
            }
        )+
    };
}

impl_from_client_error!(ApiError, StorageError, AddressError, CheckoutError);

/// Shared handles for one CLI invocation.
pub struct Context {
    pub config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
}

impl Context {
    pub fn new(config: ClientConfig) -> Self {
        let store = Arc::new(FileStore::new(&config.storage_path));
        Self { config, store }
    }

    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(Arc::clone(&self.store))
    }

    pub fn addresses(&self) -> AddressBook {
        AddressBook::new(Arc::clone(&self.store))
    }

    /// REST client authenticated with the stored token.
    pub fn api(&self) -> Result<Arc<ApiClient>, CliError> {
        Ok(Arc::new(ApiClient::new(&self.config, self.tokens())?))
    }
}

/// Format an amount for display.
pub fn money(amount: Decimal) -> Price {
    Price::new(amount, CurrencyCode::USD)
}
