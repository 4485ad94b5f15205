//! Core domain + application logic for the Discord auto-reply bot.
//!
//! This crate is intentionally framework-agnostic. Discord / Gemini live
//! behind ports (traits) implemented in adapter crates.

pub mod chat;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod filter;
pub mod generator;
pub mod keys;
pub mod logging;
pub mod model;
pub mod pool;
pub mod worker;

pub use errors::{Error, Result};
