//! # rf-pipeline
//!
//! Orchestration of the post-processing pipeline.
//!
//! This crate provides:
//!
//! - **[`Stage`]** trait -- one processing step that turns the current
//!   working output into a new one.
//! - **[`StageContext`]** -- what every stage may use (working set, resolved
//!   inputs, tool resolver, config, cancellation, progress).
//! - **Built-in stages** ([`stages`]) -- stabilize, upscale, interpolate,
//!   finalize.
//! - **[`Pipeline`]** -- fetches inputs, runs the enabled stages in their
//!   fixed order, reports progress, and cleans up the working set whatever
//!   the outcome.

pub mod context;
pub mod orchestrator;
pub mod stage;
pub mod stages;

// Re-export key types at the crate root.
pub use context::{ProgressSender, StageContext};
pub use orchestrator::Pipeline;
pub use stage::Stage;
pub use stages::default_stages;
