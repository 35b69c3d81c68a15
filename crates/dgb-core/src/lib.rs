//! Core domain + application logic for the discussion guard bot.
//!
//! This crate is intentionally framework-agnostic. The Telegram Bot API lives
//! behind the `ModerationApi` port implemented in the adapter crate; durable
//! violation state lives behind the `ViolationStore` port.

pub mod api;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod notify;
pub mod policy;
pub mod store;

pub use errors::{Error, Result};
