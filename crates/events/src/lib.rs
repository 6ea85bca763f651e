//! Studio event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`StudioEvent`]: job lifecycle, queue state and banner notifications.
//! - [`EventLogger`]: background task mirroring every event to `tracing`.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, EventKind, PauseReason, StudioEvent};
pub use logger::EventLogger;
