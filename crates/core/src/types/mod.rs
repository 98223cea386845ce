//! Core types for Planora.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod entitlement;
pub mod id;
pub mod price;
pub mod status;

pub use entitlement::UserEntitlement;
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
