//! Domain logic for the Atelier product-photo relighting studio.
//!
//! Everything in this crate is free of I/O apart from the
//! [`persistence::KeyValueStore`] seam, so both the pipeline and any
//! future front-end can share it.

pub mod compiler;
pub mod error;
pub mod failure;
pub mod intake;
pub mod job;
pub mod job_store;
pub mod persistence;
pub mod preference;
pub mod preset;
pub mod settings;
pub mod types;
