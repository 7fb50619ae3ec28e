//! Cart reconciliation.
//!
//! The cart is edited optimistically: every mutation lands in local state
//! at once and the server catches up later. Two independent channels carry
//! writes to the backend:
//!
//! - **quantity** - a single pending `{product, quantity}` that the latest
//!   change overwrites, sent as one update after a quiet period
//! - **removal** - every removed line accumulates and goes out as one batch
//!
//! Selection (which items go to checkout) is purely local and never synced.

mod controller;
mod debounce;
mod mailbox;
mod model;

pub use controller::{CartController, DEFAULT_SYNC_DEBOUNCE};
pub use debounce::{Debouncer, FlushState};
pub use mailbox::{Batch, Mailbox};
pub use model::{CartItem, CartSnapshot, CartState, MIN_QUANTITY, QuantityRejection};
