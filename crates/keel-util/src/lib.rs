//! Shared utilities for keel.
//!
//! This crate provides cross-cutting concerns used by all other keel crates:
//! the error taxonomy, filesystem helpers, and terminal status output.

pub mod errors;
pub mod fs;
pub mod progress;
