//! Order drafting and submission.
//!
//! Checkout takes only the *selected* cart items. Totals are computed here so
//! the user sees them before confirming, but the backend re-prices the order
//! and its numbers are the ones that stick.

use rust_decimal::{Decimal, RoundingStrategy};
use shopfront_core::{PaymentMethod, ProductId};
use thiserror::Error;
use tracing::{info, instrument};

use crate::api::{ApiError, CreateOrderRequest, OrderItem, OrderRecord, OrderService, ShippingInfo};
use crate::cart::{CartController, CartSnapshot};

/// Errors from drafting or placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("no items selected for checkout")]
    EmptySelection,

    #[error("product {0} is sold out")]
    SoldOut(ProductId),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Shipping and tax rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Flat shipping fee.
    pub shipping_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    /// Fraction of the subtotal charged as tax.
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping_fee: Decimal::from(10),
            free_shipping_threshold: Decimal::from(100),
            tax_rate: Decimal::new(15, 2),
        }
    }
}

/// Price breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub items: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Apply `policy` to an items subtotal.
    #[must_use]
    pub fn compute(items: Decimal, policy: &PricingPolicy) -> Self {
        let shipping = if items >= policy.free_shipping_threshold {
            Decimal::ZERO
        } else {
            policy.shipping_fee
        };
        let tax = (items * policy.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            items,
            shipping,
            tax,
            total: items + shipping + tax,
        }
    }
}

/// An order ready to submit.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    request: CreateOrderRequest,
    totals: OrderTotals,
}

impl OrderDraft {
    /// Build a draft from the selected items of `snapshot`.
    ///
    /// # Errors
    ///
    /// Fails if nothing is selected or a selected item is sold out.
    pub fn from_snapshot(
        snapshot: &CartSnapshot,
        shipping_info: ShippingInfo,
        payment_method: PaymentMethod,
        policy: &PricingPolicy,
    ) -> Result<Self, CheckoutError> {
        let mut order_items = Vec::new();
        for item in snapshot.selected_items() {
            if item.is_sold_out() {
                return Err(CheckoutError::SoldOut(item.product_id.clone()));
            }
            order_items.push(OrderItem {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                price: item.unit_price,
                image: item.image.clone(),
            });
        }
        if order_items.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }

        let subtotal = order_items
            .iter()
            .map(|i| i.price * Decimal::from(i.quantity))
            .sum();
        let totals = OrderTotals::compute(subtotal, policy);

        Ok(Self {
            request: CreateOrderRequest {
                shipping_info,
                order_items,
                payment_method,
                items_price: totals.items,
                shipping_price: totals.shipping,
                tax_price: totals.tax,
                total_price: totals.total,
            },
            totals,
        })
    }

    #[must_use]
    pub const fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    #[must_use]
    pub const fn request(&self) -> &CreateOrderRequest {
        &self.request
    }

    #[must_use]
    pub fn into_request(self) -> CreateOrderRequest {
        self.request
    }
}

/// Submit `draft`.
///
/// Pending cart writes are sent first so the backend sees the quantities the
/// draft was built from. The cart is reloaded afterwards, whether or not the
/// order went through.
///
/// # Errors
///
/// Returns the API error if the order is rejected.
#[instrument(skip_all, fields(items = draft.request.order_items.len(), total = %draft.totals.total))]
pub async fn place_order(
    cart: &CartController,
    orders: &dyn OrderService,
    draft: &OrderDraft,
) -> Result<OrderRecord, CheckoutError> {
    cart.flush_pending().await;
    let result = orders.create_order(&draft.request).await;
    cart.load().await;

    let order = result?;
    info!(order_id = %order.id, status = %order.status, "Order placed");
    Ok(order)
}
