//! Planora Core - Shared types library.
//!
//! This crate provides common types used across the Planora components:
//! - `gateway` - HTTP gateway binary (checkout flow, user data sync)
//! - `integration-tests` - end-to-end tests against a processor stub
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and checkout statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
