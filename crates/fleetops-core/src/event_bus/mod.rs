//! EventBus - fan-out of task and session events to live observers.
//!
//! Executors, the orchestrator and terminal bridges publish here; WebSocket
//! streams and the CLI subscribe. Delivery is at-most-once with no replay:
//! a subscriber only sees events published while it is registered.

/// Subscriber registry and delivery.
pub mod bus;
/// Event type definitions.
pub mod types;

pub use bus::{EventBus, Subscription};
pub use types::{Event, EventStatus, Topic};
