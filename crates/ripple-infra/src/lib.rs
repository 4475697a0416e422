//! Infrastructure adapters for Ripple.
//!
//! Implements the ports defined in `ripple-core`: a WebSocket transport
//! with reconnect/backoff, a REST client for the durable message log and
//! the conversation directory, and the config loader.

pub mod backoff;
pub mod config;
pub mod rest;
pub mod ws;
