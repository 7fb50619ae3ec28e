//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod price;
pub mod status;

pub use contact::{ContactError, PhoneNumber};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
