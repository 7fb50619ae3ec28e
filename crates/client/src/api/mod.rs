//! Storefront REST API client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for carts and orders
//! - Every call is authenticated with the bearer token from device storage;
//!   a missing token fails the call before anything is sent
//! - [`CartService`] and [`OrderService`] are the seams the cart and checkout
//!   code depend on, so they can run against in-memory fakes
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_client::{ApiClient, CartService};
//!
//! let client = ApiClient::new(&config, tokens)?;
//! let cart = client.fetch_cart().await?;
//! client.update_item(&cart.items[0].product.id, 3).await?;
//! ```

pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use shopfront_core::ProductId;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::storage::{StorageError, TokenStore};

pub use types::{
    AddItemRequest, CartLinePayload, CartPayload, CreateOrderRequest, OrderItem, OrderRecord,
    ProductSnapshot, RemoveItemsRequest, RemoveLine, ShippingInfo, UpdateItemRequest,
};

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No bearer token in device storage.
    #[error("not signed in (no bearer token stored)")]
    MissingToken,

    /// The backend rejected the token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the backend.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Non-success response.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Token lookup failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The configured base URL cannot carry path segments.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Whether the failure is an authentication problem.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::MissingToken | Self::Unauthorized(_))
    }
}

// =============================================================================
// Service traits
// =============================================================================

/// Remote cart operations.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Fetch the authoritative cart.
    async fn fetch_cart(&self) -> Result<CartPayload, ApiError>;

    /// Add `quantity` units of a product.
    async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError>;

    /// Set the quantity of a product already in the cart.
    async fn update_item(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError>;

    /// Remove several products in one call.
    async fn remove_items(&self, items: &[RemoveLine]) -> Result<(), ApiError>;

    /// Empty the cart.
    async fn clear_cart(&self) -> Result<(), ApiError>;
}

/// Remote order operations.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Submit a finalized order.
    async fn create_order(&self, order: &CreateOrderRequest) -> Result<OrderRecord, ApiError>;
}

// =============================================================================
// ApiClient
// =============================================================================

/// HTTP client for the storefront API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    tokens: TokenStore,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                tokens,
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build the URL for `segments` under the base URL. Segments are
    /// percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start an authenticated request.
    async fn authorized(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let token = self
            .inner
            .tokens
            .load()
            .await?
            .ok_or(ApiError::MissingToken)?;
        let url = self.endpoint(segments)?;

        Ok(self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body, status);
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ApiError::Unauthorized(message));
        }

        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Storefront API returned non-success status"
        );
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Send a request and parse the JSON response.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse storefront API response"
            );
            ApiError::Parse(e)
        })
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<types::ErrorBody>(body).map_or_else(
        |_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        },
        |b| b.message,
    )
}

#[async_trait]
impl CartService for ApiClient {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartPayload, ApiError> {
        let request = self.authorized(Method::GET, &["api", "cart"]).await?;
        let cart: CartPayload = self.send_json(request).await?;
        debug!(lines = cart.items.len(), "Fetched cart");
        Ok(cart)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
        let request = self
            .authorized(Method::POST, &["api", "cart", "items"])
            .await?
            .json(&AddItemRequest {
                product_id: product_id.clone(),
                quantity,
            });
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn update_item(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
        let request = self
            .authorized(Method::PUT, &["api", "cart", "items", product_id.as_str()])
            .await?
            .json(&UpdateItemRequest { quantity });
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn remove_items(&self, items: &[RemoveLine]) -> Result<(), ApiError> {
        let request = self
            .authorized(Method::POST, &["api", "cart", "remove"])
            .await?
            .json(&RemoveItemsRequest {
                items: items.to_vec(),
            });
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        let request = self.authorized(Method::DELETE, &["api", "cart"]).await?;
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderService for ApiClient {
    #[instrument(skip(self, order), fields(items = order.order_items.len()))]
    async fn create_order(&self, order: &CreateOrderRequest) -> Result<OrderRecord, ApiError> {
        let request = self
            .authorized(Method::POST, &["api", "orders"])
            .await?
            .json(order);
        let record: OrderRecord = self.send_json(request).await?;
        debug!(order_id = %record.id, "Order created");
        Ok(record)
    }
}
