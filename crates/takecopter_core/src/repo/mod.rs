//! Repository layer: the project data contract and its implementation.
//!
//! # Responsibility
//! - Define the `ProjectDataRepository` contract consumed by UI/service callers.
//! - Keep SQL, storage tiers and legacy formats behind that contract.
//!
//! # Invariants
//! - Callers never see the engine handle; entities cross the boundary by value.
//! - Repository APIs return semantic errors (`NotFound`, `EmptyTitle`, ...)
//!   in addition to engine and storage failures.

mod bootstrap;
mod error;
mod legacy;
mod project_repo;
mod rows;
mod shared;

pub use bootstrap::{EXPORTS_DIR, LEGACY_MANIFEST_FILE, LOCK_FILE};
pub use error::{RepoError, RepoResult};
pub use project_repo::{ProjectDataRepository, ProjectRepository};
pub use shared::SharedProjectRepository;
