//! Use-case services layered over the repository contract.
//!
//! # Responsibility
//! - Turn repository snapshots into files under the project root and back.
//! - Keep CLI/UI hosts free of path and file-format details.

pub mod project_service;
