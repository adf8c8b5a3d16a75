//! Local-first data repository for the takecopter writing workbench.
//! Owns every persistent piece of project state behind `ProjectDataRepository`.

pub mod clock;
pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod service;
pub mod storage;

pub use codec::{CodecError, ExportedProjectData, ExportedStoryData};
pub use config::RepositoryConfig;
pub use db::schema::CURRENT_SCHEMA_VERSION;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::library::{SettingLibrary, SettingTag, SettingTemplate, TemplatePreset};
pub use model::setting::{
    CustomField, FieldSize, Iteration, Position, ReasonType, Relation, SettingCard, SettingType,
};
pub use model::story::{BootstrapState, CreateStoryInput, ProjectData, Story, StoryId, Workspace};
pub use normalize::Normalize;
pub use repo::{
    ProjectDataRepository, ProjectRepository, RepoError, RepoResult, SharedProjectRepository,
};
pub use service::project_service::ProjectService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
