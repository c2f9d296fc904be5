//! Shared types for the StyleForge image-styling pipeline.
//!
//! This crate has no internal dependencies. It holds the error taxonomy,
//! identifier/timestamp aliases, environment-driven settings, the style
//! preset registry, and upload/output path resolution used by every other
//! crate in the workspace.

pub mod config;
pub mod error;
pub mod storage;
pub mod styles;
pub mod types;
