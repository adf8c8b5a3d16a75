//! Domain model for stories, workspaces and setting libraries.
//!
//! # Responsibility
//! - Define the value types exchanged across the repository boundary.
//! - Keep the JSON shape (camelCase keys) identical to the interchange format.
//!
//! # Invariants
//! - Values are plain data; nothing here holds a database handle.
//! - Well-typed values are produced by `crate::normalize`, never by trusting
//!   raw JSON directly.

pub mod library;
pub mod setting;
pub mod story;
