//! rf-core: shared types, IDs, errors, configuration, and the job request
//! model.
//!
//! This crate is the foundational dependency for the other rf-* crates. It
//! carries the [`PipelineRequest`] handed over by the job scheduler, the
//! unified [`Error`] type every stage funnels into, and the application
//! [`config::Config`].

pub mod config;
pub mod error;
pub mod ids;
pub mod request;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorKind, Result};
pub use ids::*;
pub use request::*;
