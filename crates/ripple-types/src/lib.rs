//! Shared domain types for Ripple.
//!
//! This crate contains the types used across the Ripple messaging client:
//! conversations, messages, participants, session state, wire events, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod message;
pub mod participant;
pub mod session;
