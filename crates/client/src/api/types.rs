//! Wire types for the storefront REST API.
//!
//! Field names follow the backend's camelCase JSON. Prices are decimals; the
//! backend may send them as JSON numbers or strings and both deserialize.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_core::{OrderId, OrderStatus, PaymentMethod, PhoneNumber, ProductId, UserId};

// =============================================================================
// Cart
// =============================================================================

/// Cart contents returned by `GET /api/cart`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartPayload {
    /// Cart lines. A missing list means an empty cart.
    #[serde(default)]
    pub items: Vec<CartLinePayload>,
}

/// One cart line with a snapshot of its product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLinePayload {
    /// Product snapshot at fetch time.
    pub product: ProductSnapshot,
    /// Quantity stored server-side.
    pub quantity: u32,
    /// Unit price recorded on the line, when it differs from the product.
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl CartLinePayload {
    /// Unit price for this line (line price, else the product price).
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.price.unwrap_or(self.product.price)
    }
}

/// Product fields embedded in cart lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Product key.
    #[serde(alias = "_id")]
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Primary image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Current unit price.
    pub price: Decimal,
    /// Units available.
    #[serde(default)]
    pub count_in_stock: u32,
}

/// Body of `POST /api/cart/items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `PUT /api/cart/items/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

/// One entry of a batch removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /api/cart/remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItemsRequest {
    pub items: Vec<RemoveLine>,
}

// =============================================================================
// Orders
// =============================================================================

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: PhoneNumber,
}

/// An ordered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product key (the backend calls it `product`).
    #[serde(rename = "product")]
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_info: ShippingInfo,
    pub order_items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
}

/// Order record returned by `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(alias = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub status: OrderStatus,
    pub total_price: Decimal,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Error body the backend sends with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}
