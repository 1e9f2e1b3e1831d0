//! Paceline event bus.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] — the canonical domain event envelope.
//! - [`event_types`] — the dot-separated event names the service layer
//!   publishes.
//!
//! Delivery to external channels is a transport concern and lives outside
//! this workspace; consumers subscribe and relay.

pub mod bus;

pub use bus::{event_types, EventBus, PlatformEvent, DEFAULT_CAPACITY};
