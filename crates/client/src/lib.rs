//! Shopfront Client - storefront client library.
//!
//! The backend owns every authoritative decision (pricing, inventory, order
//! persistence, payment capture). This crate holds the client side of that
//! contract: thin REST wrappers, an optimistically-updated cart that syncs
//! lazily, checkout drafting, and device-local storage.
//!
//! # Architecture
//!
//! - [`api`] - `reqwest` client for the REST backend, behind the
//!   [`CartService`] and [`OrderService`] traits
//! - [`cart`] - cart reconciliation: local state, debounced flush channels
//! - [`checkout`] - order drafting and submission from the selected items
//! - [`storage`] - device key-value store, bearer token and address book
//! - [`notice`] - non-blocking user notifications
//! - [`config`] - environment configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopfront_client::{ApiClient, CartController, ClientConfig, Notifier};
//!
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileStore::new(&config.storage_path));
//! let api = Arc::new(ApiClient::new(&config, TokenStore::new(store))?);
//! let (notifier, mut notices) = Notifier::channel();
//!
//! let cart = CartController::new(api, notifier, config.sync_debounce);
//! cart.load().await;
//! cart.change_quantity(&product_id, 1)?;
//! println!("{}", cart.selected_total());
//! cart.shutdown().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod notice;
pub mod storage;
mod sync;

pub use api::{ApiClient, ApiError, CartService, OrderService};
pub use cart::{CartController, CartItem, CartSnapshot, FlushState, QuantityRejection};
pub use checkout::{CheckoutError, OrderDraft, OrderTotals, PricingPolicy, place_order};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use notice::{Notice, Notifier, SyncChannel};
pub use storage::{
    Address, AddressBook, AddressError, FileStore, KeyValueStore, MemoryStore, NewAddress,
    StorageError, TokenStore,
};
