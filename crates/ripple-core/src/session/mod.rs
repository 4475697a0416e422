//! Session reconciliation: state machine, event bus, and async driver.

pub mod bus;
pub mod reconciler;
pub mod sync;

pub use bus::SessionBus;
pub use reconciler::Reconciler;
pub use sync::{SessionHandle, SessionSync};
