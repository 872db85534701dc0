//! Core logic for sweeping a Telegram account's groups and channels.
//!
//! This crate is transport-agnostic. The MTProto session lives behind the
//! [`client::port::GroupClient`] port, implemented in an adapter crate.

pub mod audit;
pub mod catalog;
pub mod client;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod participant;
pub mod primitives;
pub mod role;
pub mod strategy;

#[cfg(test)]
mod fake;

pub use errors::{Error, Result};
