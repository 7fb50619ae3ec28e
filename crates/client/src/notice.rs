//! Non-blocking user notifications.
//!
//! Failures inside the cart are caught at the operation boundary and turned
//! into a [`Notice`]. Notices travel over an unbounded channel so publishing
//! never waits on the presentation layer.

use std::fmt;

use shopfront_core::ProductId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cart::QuantityRejection;

/// Which pending-change channel a sync notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncChannel {
    /// Quantity updates.
    Quantity,
    /// Batched item removals.
    Deletion,
}

impl fmt::Display for SyncChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity => write!(f, "quantity update"),
            Self::Deletion => write!(f, "item removal"),
        }
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A quantity change was refused locally; nothing was sent.
    QuantityRejected {
        product_id: ProductId,
        reason: QuantityRejection,
    },
    /// The cart could not be fetched; an empty cart is shown.
    LoadFailed { message: String },
    /// A flush failed. Local state was kept as-is.
    SyncFailed {
        channel: SyncChannel,
        message: String,
    },
    /// The bearer token is missing or was rejected.
    AuthRequired { message: String },
}

impl Notice {
    /// Notice for a failed cart fetch.
    #[must_use]
    pub fn load_failed(err: &ApiError) -> Self {
        if err.is_auth() {
            return Self::AuthRequired {
                message: err.to_string(),
            };
        }
        Self::LoadFailed {
            message: err.to_string(),
        }
    }

    /// Notice for a failed flush on `channel`.
    #[must_use]
    pub fn sync_failed(channel: SyncChannel, err: &ApiError) -> Self {
        if err.is_auth() {
            return Self::AuthRequired {
                message: err.to_string(),
            };
        }
        Self::SyncFailed {
            channel,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuantityRejected { product_id, reason } => {
                write!(f, "Can't change quantity of {product_id}: {reason}")
            }
            Self::LoadFailed { message } => {
                write!(f, "Couldn't load your cart ({message}). Pull to refresh.")
            }
            Self::SyncFailed { channel, message } => write!(
                f,
                "Your {channel} didn't reach the store ({message}). Refresh to see the saved cart."
            ),
            Self::AuthRequired { message } => write!(f, "Please sign in again ({message})."),
        }
    }
}

/// Publishing half of the notice channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    /// Create a notifier and the receiver the presentation layer drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish a notice. Never blocks; dropped if nobody is listening.
    pub fn publish(&self, notice: Notice) {
        match &notice {
            Notice::QuantityRejected { .. } => debug!(%notice, "Quantity change rejected"),
            _ => warn!(%notice, "User notice"),
        }

        if self.tx.send(notice).is_err() {
            debug!("Notice receiver dropped");
        }
    }
}
