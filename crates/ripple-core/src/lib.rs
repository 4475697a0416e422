//! Session reconciliation core for Ripple.
//!
//! This crate defines the "ports" (transport, message repository, and
//! conversation directory traits) that the infrastructure layer implements,
//! plus the session reconciler state machine and the synchronizer driver
//! that merges fetched history, live room events, and optimistic local
//! sends into one ordered timeline. It depends only on `ripple-types` --
//! never on `ripple-infra` or any network crate.

pub mod directory;
pub mod repository;
pub mod session;
pub mod transport;
