//! Paceline service surface.
//!
//! Plain-data operations over [`AppState`], to be wrapped by whatever
//! transport the surrounding system uses. Every operation takes an
//! explicit [`RequestContext`] resolved once at the boundary via
//! [`context::authenticate`]; there is no ambient session state.

pub mod behaviors;
mod codec;
pub mod collections;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod plans;
pub mod sharing;
pub mod state;
pub mod telemetry;

pub use config::ServiceConfig;
pub use context::RequestContext;
pub use error::{ServiceError, ServiceResult};
pub use state::{AppState, InMemoryHandles};

// ---------------------------------------------------------------------------
// Shared test fixtures
// ---------------------------------------------------------------------------
