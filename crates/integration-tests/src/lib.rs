//! Integration tests for the Shopfront client.
//!
//! Every test runs the real [`ApiClient`] against a local `wiremock` server,
//! so no backend is needed:
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `api_client` - request shapes, auth header, status mapping
//! - `cart_sync` - debounced cart writes observed on the wire
//! - `checkout` - order submission and cart reload

// Test support code: failing fast is the point.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use shopfront_client::{ApiClient, ClientConfig, MemoryStore, TokenStore};
use wiremock::MockServer;

/// Bearer token stored by [`TestBackend::start`].
pub const TEST_TOKEN: &str = "test-token";

/// Quiet period used by cart tests; short enough to keep the suite fast.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(50);

/// A mock backend plus a client configured against it.
pub struct TestBackend {
    pub server: MockServer,
    pub config: ClientConfig,
    pub tokens: TokenStore,
}

impl TestBackend {
    /// Start a mock server with a token already stored.
    pub async fn start() -> Self {
        let backend = Self::signed_out().await;
        backend
            .tokens
            .save(&SecretString::from(TEST_TOKEN))
            .await
            .expect("store test token");
        backend
    }

    /// Start a mock server with no token stored.
    pub async fn signed_out() -> Self {
        let server = MockServer::start().await;
        let mut config = ClientConfig::with_api_url(&server.uri()).expect("mock server URL");
        config.sync_debounce = TEST_DEBOUNCE;
        config.request_timeout = Duration::from_secs(5);

        Self {
            server,
            config,
            tokens: TokenStore::new(Arc::new(MemoryStore::new())),
        }
    }

    /// A client for this backend.
    pub fn client(&self) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(&self.config, self.tokens.clone()).expect("build client"))
    }
}

/// A cart line as the backend sends it.
pub fn cart_line(id: &str, quantity: u32, stock: u32, price: f64) -> Value {
    json!({
        "product": {
            "_id": id,
            "name": format!("Product {id}"),
            "image": format!("/images/{id}.jpg"),
            "price": price,
            "countInStock": stock,
        },
        "quantity": quantity,
    })
}

/// A `GET /api/cart` body.
pub fn cart_body(lines: impl IntoIterator<Item = Value>) -> Value {
    json!({ "items": lines.into_iter().collect::<Vec<_>>() })
}
