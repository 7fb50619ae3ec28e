//! Local cart state.
//!
//! Everything here is synchronous and free of I/O. [`CartState`] is the
//! in-memory view the controller mutates optimistically.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;
use shopfront_core::ProductId;
use thiserror::Error;

use crate::api::{CartLinePayload, CartPayload};

/// Smallest quantity a cart line can show.
pub const MIN_QUANTITY: u32 = 1;

/// Why a quantity change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityRejection {
    /// The result would drop below one unit.
    #[error("quantity can't go below 1")]
    BelowMinimum,
    /// The result would exceed the units in stock.
    #[error("only {stock} in stock")]
    ExceedsStock { stock: u32 },
    /// The product is not in the cart.
    #[error("item is not in the cart")]
    UnknownItem,
}

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Quantity shown to the user.
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Units available; the shown quantity never exceeds this unless the
    /// product is sold out.
    pub stock_limit: u32,
}

impl CartItem {
    /// Build an item from a fetched line, clamping the quantity into
    /// `1..=stock_limit`.
    #[must_use]
    pub fn from_line(line: &CartLinePayload) -> Self {
        let stock_limit = line.product.count_in_stock;
        Self {
            product_id: line.product.id.clone(),
            name: line.product.name.clone(),
            image: line.product.image.clone(),
            quantity: line.quantity.clamp(MIN_QUANTITY, stock_limit.max(MIN_QUANTITY)),
            unit_price: line.unit_price(),
            stock_limit,
        }
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Nothing left in stock.
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.stock_limit == 0
    }
}

/// Items plus the subset selected for checkout.
///
/// Invariant: every id in the selection belongs to an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    items: Vec<CartItem>,
    selection: BTreeSet<ProductId>,
}

impl CartState {
    /// State for a freshly fetched cart with every item selected.
    ///
    /// Repeated lines for one product are merged.
    #[must_use]
    pub fn from_payload(payload: &CartPayload) -> Self {
        let mut items: Vec<CartItem> = Vec::with_capacity(payload.items.len());
        for line in &payload.items {
            let item = CartItem::from_line(line);
            if let Some(existing) = items.iter_mut().find(|i| i.product_id == item.product_id) {
                let merged = existing.quantity.saturating_add(item.quantity);
                existing.quantity = merged.min(existing.stock_limit.max(MIN_QUANTITY));
            } else {
                items.push(item);
            }
        }

        let selection = items.iter().map(|i| i.product_id.clone()).collect();
        Self { items, selection }
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Look up an item.
    #[must_use]
    pub fn item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply `delta` to an item's quantity and return the new quantity.
    ///
    /// # Errors
    ///
    /// Refuses results below one, increases past the stock limit, and
    /// unknown products. A refused change leaves the state untouched.
    pub fn apply_quantity_delta(
        &mut self,
        product_id: &ProductId,
        delta: i32,
    ) -> Result<u32, QuantityRejection> {
        let item = self
            .items
            .iter_mut()
            .find(|i| &i.product_id == product_id)
            .ok_or(QuantityRejection::UnknownItem)?;

        let next = i64::from(item.quantity) + i64::from(delta);
        if next < i64::from(MIN_QUANTITY) {
            return Err(QuantityRejection::BelowMinimum);
        }
        if delta > 0 && next > i64::from(item.stock_limit) {
            return Err(QuantityRejection::ExceedsStock {
                stock: item.stock_limit,
            });
        }

        item.quantity = u32::try_from(next).map_err(|_| QuantityRejection::ExceedsStock {
            stock: item.stock_limit,
        })?;
        Ok(item.quantity)
    }

    /// Remove an item and drop it from the selection.
    pub fn remove(&mut self, product_id: &ProductId) -> Option<CartItem> {
        let index = self.items.iter().position(|i| &i.product_id == product_id)?;
        self.selection.remove(product_id);
        Some(self.items.remove(index))
    }

    /// Flip an item's selection and return whether it is now selected.
    /// Ids not in the cart are ignored.
    pub fn toggle_selection(&mut self, product_id: &ProductId) -> bool {
        if self.item(product_id).is_none() {
            return false;
        }
        if self.selection.remove(product_id) {
            false
        } else {
            self.selection.insert(product_id.clone());
            true
        }
    }

    /// Select every item.
    pub fn select_all(&mut self) {
        self.selection = self.items.iter().map(|i| i.product_id.clone()).collect();
    }

    /// Deselect every item.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    #[must_use]
    pub fn is_selected(&self, product_id: &ProductId) -> bool {
        self.selection.contains(product_id)
    }

    /// Selected items in display order.
    pub fn selected_items(&self) -> impl Iterator<Item = &CartItem> {
        self.items
            .iter()
            .filter(|i| self.selection.contains(&i.product_id))
    }

    /// Σ `unit_price × quantity` over the selected items.
    #[must_use]
    pub fn selected_total(&self) -> Decimal {
        self.selected_items().map(CartItem::line_total).sum()
    }

    /// Read-only copy for rendering.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            selected: self.selection.clone(),
            selected_total: self.selected_total(),
            item_count: self.items.iter().map(|i| i.quantity).sum(),
        }
    }
}

/// A point-in-time copy of the cart for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub selected: BTreeSet<ProductId>,
    pub selected_total: Decimal,
    /// Total units across all lines.
    pub item_count: u32,
}

impl CartSnapshot {
    /// Selected items in display order.
    pub fn selected_items(&self) -> impl Iterator<Item = &CartItem> {
        self.items
            .iter()
            .filter(|i| self.selected.contains(&i.product_id))
    }

    #[must_use]
    pub fn is_selected(&self, product_id: &ProductId) -> bool {
        self.selected.contains(product_id)
    }
}
