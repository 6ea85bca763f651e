//! Job orchestration for the relighting studio.
//!
//! - [`QueueController`]: single-flight scheduler driving generation.
//! - [`PreferenceAggregator`]: persisted rating log and derived profile.
//! - [`PresetLibrary`]: persisted material presets.
//! - [`Studio`]: facade wiring store, settings, controller and events.

pub mod config;
pub mod controller;
pub mod error;
pub mod preferences;
pub mod presets;
pub mod studio;

pub use config::QueueConfig;
pub use controller::{QueueController, RunState};
pub use error::StudioError;
pub use preferences::PreferenceAggregator;
pub use presets::PresetLibrary;
pub use studio::{Studio, StudioParts};
