//! Project repository contract and its engine-backed implementation.
//!
//! # Responsibility
//! - Expose story/workspace/library CRUD, import/export and root lifecycle.
//! - Own the single engine handle, opened lazily per active root.
//! - Flush the database image after every successful mutation.
//!
//! # Invariants
//! - Every mutation runs as normalize → BEGIN → statements → COMMIT → persist.
//!   A failing statement rolls the whole mutation back.
//! - A mutating call returns `Ok` only after the image reached a storage tier.
//!   When both tiers fail, the committed in-memory state is kept so the next
//!   successful call flushes it.
//! - Import envelopes are fully validated before the engine is touched.
//!
//! # See also
//! - crate::db::schema for the tables behind these operations.

use super::bootstrap::{self, has_project_files};
use super::legacy;
use super::rows::{self, WorkspaceColumn};
use super::{RepoError, RepoResult};
use crate::clock::{now_millis, now_rfc3339};
use crate::codec::{decode_project, decode_story, wrap_project, wrap_story};
use crate::codec::{ExportedProjectData, ExportedStoryData};
use crate::config::RepositoryConfig;
use crate::db::schema::ensure_schema;
use crate::db::Engine;
use crate::model::library::SettingLibrary;
use crate::model::setting::SettingCard;
use crate::model::story::{BootstrapState, CreateStoryInput, ProjectData, Story, COVER_COLORS};
use crate::normalize::{normalize_cards, normalize_library, normalize_tree};
use crate::storage::{FilePersistenceProvider, PersistenceProvider, TieredPersistence};
use log::{error, info};
use rusqlite::Transaction;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Repository interface consumed by the UI and the service layer.
pub trait ProjectDataRepository {
    fn bootstrap_state(&self) -> BootstrapState;
    /// Activates `path`, or the default root when `None` or blank.
    fn initialize_project_root(&mut self, path: Option<&str>) -> RepoResult<PathBuf>;
    fn open_project_root(&mut self, path: &str) -> RepoResult<PathBuf>;
    fn active_root(&self) -> Option<&Path>;
    fn load(&mut self) -> RepoResult<ProjectData>;
    fn create_story(&mut self, input: CreateStoryInput) -> RepoResult<Story>;
    fn rename_story(&mut self, story_id: &str, title: &str) -> RepoResult<Story>;
    fn delete_story(&mut self, story_id: &str) -> RepoResult<()>;
    fn update_settings(&mut self, story_id: &str, cards: &[SettingCard]) -> RepoResult<()>;
    fn update_tree(&mut self, story_id: &str, tree: &[Value]) -> RepoResult<()>;
    fn update_story_library(&mut self, story_id: &str, library: &SettingLibrary)
        -> RepoResult<()>;
    fn update_global_library(&mut self, library: &SettingLibrary) -> RepoResult<()>;
    fn export_project(&mut self) -> RepoResult<ExportedProjectData>;
    fn export_story(&mut self, story_id: &str) -> RepoResult<ExportedStoryData>;
    /// Replaces every story with the envelope's contents.
    fn import_project(&mut self, envelope: &Value) -> RepoResult<()>;
    /// Replaces (or adds) the envelope's story, leaving other stories alone.
    fn import_story(&mut self, envelope: &Value) -> RepoResult<Story>;
    /// Current database image, as it would be persisted.
    fn database_image(&mut self) -> RepoResult<Vec<u8>>;
}

struct Session {
    root: PathBuf,
    engine: Engine,
    persistence: TieredPersistence,
    schema_version: i64,
}

impl Session {
    fn open(root: PathBuf, provider: &dyn PersistenceProvider) -> RepoResult<Self> {
        let started_at = Instant::now();
        let persistence = provider.persistence_for(&root);
        let image = persistence.load()?;
        let restored = image.is_some();
        let mut engine = match image {
            Some(bytes) => Engine::from_image(&bytes)?,
            None => Engine::open_empty()?,
        };

        let report = ensure_schema(engine.conn_mut())?;
        let mut dirty = !restored || report.changed();

        if rows::read_global_library(engine.conn())?.is_none() {
            engine.transaction(|tx| rows::write_global_library(tx, &SettingLibrary::seeded()))?;
            dirty = true;
        }

        let mut migrated = None;
        if rows::story_count(engine.conn())? == 0 {
            if let Some(import) = legacy::discover(&root, &persistence)? {
                engine.transaction(|tx| replace_project(tx, &import.data))?;
                info!(
                    "event=legacy_migrate module=repo status=ok source={} stories={}",
                    import.source.label(),
                    import.data.stories.len()
                );
                migrated = Some(import.source);
                dirty = true;
            }
        }

        let session = Self {
            root,
            engine,
            persistence,
            schema_version: report.version,
        };
        if dirty {
            session.persist()?;
        }
        if let Some(source) = migrated {
            legacy::finish(&source, &session.persistence);
        }

        info!(
            "event=repo_open module=repo status=ok restored={} schema_version={} duration_ms={}",
            restored,
            session.schema_version,
            started_at.elapsed().as_millis()
        );
        Ok(session)
    }

    fn persist(&self) -> RepoResult<()> {
        let image = self.engine.export()?;
        self.persistence.save(&image)?;
        Ok(())
    }
}

/// Engine-backed repository bound to one installation's configuration.
pub struct ProjectRepository {
    config: RepositoryConfig,
    provider: Box<dyn PersistenceProvider>,
    active_root: Option<PathBuf>,
    session: Option<Session>,
}

impl ProjectRepository {
    /// Opens the repository with file-backed storage tiers, restoring the
    /// active root from the bootstrap record.
    pub fn open(config: RepositoryConfig) -> RepoResult<Self> {
        let provider = FilePersistenceProvider::new(config.fallback_dir());
        Self::with_provider(config, Box::new(provider))
    }

    pub fn with_provider(
        config: RepositoryConfig,
        provider: Box<dyn PersistenceProvider>,
    ) -> RepoResult<Self> {
        let active_root = bootstrap::read_active_root(&config)?;
        Ok(Self {
            config,
            provider,
            active_root,
            session: None,
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Schema version of the open database, opening it if needed.
    pub fn schema_version(&mut self) -> RepoResult<i64> {
        Ok(self.session()?.schema_version)
    }

    fn session(&mut self) -> RepoResult<&mut Session> {
        let root = self.active_root.clone().ok_or(RepoError::SetupRequired)?;
        let stale = self
            .session
            .as_ref()
            .map_or(true, |session| session.root != root);
        if stale {
            self.session = None;
            self.session = Some(Session::open(root, self.provider.as_ref())?);
        }
        self.session.as_mut().ok_or(RepoError::SetupRequired)
    }

    fn activate(&mut self, root: PathBuf) -> RepoResult<PathBuf> {
        bootstrap::ensure_root_layout(&root)?;
        bootstrap::write_active_root(&self.config, &root)?;
        if self.active_root.as_ref() != Some(&root) {
            self.session = None;
        }
        self.active_root = Some(root.clone());
        info!("event=root_activate module=repo status=ok root={}", root.display());
        Ok(root)
    }

    /// Runs one atomic mutation and flushes the image.
    ///
    /// Statement errors come back as `TransactionFailed`; semantic errors
    /// raised by `body` (such as `NotFound`) also roll back and pass through.
    fn mutate<T>(
        &mut self,
        op: &'static str,
        body: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let session = self.session()?;
        let outcome = session.engine.transaction(body).map_err(|err| match err {
            RepoError::Db(db) => RepoError::TransactionFailed(db),
            other => other,
        });
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                error!(
                    "event=repo_mutate module=repo status=error op={} stage=transaction error={}",
                    op, err
                );
                return Err(err);
            }
        };
        if let Err(err) = session.persist() {
            error!(
                "event=repo_mutate module=repo status=error op={} stage=persist error={}",
                op, err
            );
            return Err(err);
        }
        info!(
            "event=repo_mutate module=repo status=ok op={} duration_ms={}",
            op,
            started_at.elapsed().as_millis()
        );
        Ok(value)
    }

    fn update_column(
        &mut self,
        op: &'static str,
        story_id: &str,
        column: WorkspaceColumn,
        json: String,
    ) -> RepoResult<()> {
        let now = now_rfc3339();
        self.mutate(op, |tx| {
            if !rows::update_workspace_column(tx, story_id, column, &json)? {
                return Err(RepoError::NotFound(story_id.to_string()));
            }
            rows::touch_story(tx, story_id, &now)?;
            Ok(())
        })
    }
}

impl ProjectDataRepository for ProjectRepository {
    fn bootstrap_state(&self) -> BootstrapState {
        BootstrapState {
            needs_setup: self.active_root.is_none(),
            default_root_path: self.config.default_root_path().to_string_lossy().into_owned(),
            active_root_path: self
                .active_root
                .as_ref()
                .map(|root| root.to_string_lossy().into_owned()),
        }
    }

    fn initialize_project_root(&mut self, path: Option<&str>) -> RepoResult<PathBuf> {
        let root = match path.map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.config.default_root_path(),
        };
        self.activate(root)
    }

    fn open_project_root(&mut self, path: &str) -> RepoResult<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(RepoError::EmptyPath);
        }
        let root = PathBuf::from(trimmed);
        if !root.is_dir() {
            return Err(RepoError::RootNotFound(root));
        }
        if !has_project_files(&root) && self.provider.persistence_for(&root).load()?.is_none() {
            return Err(RepoError::NotAProject(root));
        }
        self.activate(root)
    }

    fn active_root(&self) -> Option<&Path> {
        self.active_root.as_deref()
    }

    fn load(&mut self) -> RepoResult<ProjectData> {
        let session = self.session()?;
        rows::read_project(session.engine.conn())
    }

    fn create_story(&mut self, input: CreateStoryInput) -> RepoResult<Story> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(RepoError::EmptyTitle);
        }
        let palette_index = now_millis().rem_euclid(COVER_COLORS.len() as i64) as usize;
        let story = Story {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: input.description.trim().to_string(),
            updated_at: now_rfc3339(),
            cover_color: COVER_COLORS[palette_index].to_string(),
        };
        self.mutate("create_story", |tx| {
            rows::insert_story(tx, &story)?;
            rows::insert_workspace(tx, &story.id, &Default::default())
        })?;
        info!("event=story_create module=repo status=ok story_id={}", story.id);
        Ok(story)
    }

    fn rename_story(&mut self, story_id: &str, title: &str) -> RepoResult<Story> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RepoError::EmptyTitle);
        }
        let now = now_rfc3339();
        self.mutate("rename_story", |tx| {
            if !rows::rename_story(tx, story_id, title, &now)? {
                return Err(RepoError::NotFound(story_id.to_string()));
            }
            rows::find_story(tx, story_id)?
                .ok_or_else(|| RepoError::NotFound(story_id.to_string()))
        })
    }

    fn delete_story(&mut self, story_id: &str) -> RepoResult<()> {
        self.mutate("delete_story", |tx| {
            if !rows::delete_story(tx, story_id)? {
                return Err(RepoError::NotFound(story_id.to_string()));
            }
            Ok(())
        })
    }

    fn update_settings(&mut self, story_id: &str, cards: &[SettingCard]) -> RepoResult<()> {
        let raw = serde_json::to_value(cards)
            .map_err(|err| RepoError::InvalidData(format!("serialize failed: {err}")))?;
        let json = rows::to_json(&normalize_cards(&raw))?;
        self.update_column("update_settings", story_id, WorkspaceColumn::Settings, json)
    }

    fn update_tree(&mut self, story_id: &str, tree: &[Value]) -> RepoResult<()> {
        let json = rows::to_json(&normalize_tree(&Value::Array(tree.to_vec())))?;
        self.update_column("update_tree", story_id, WorkspaceColumn::Tree, json)
    }

    fn update_story_library(
        &mut self,
        story_id: &str,
        library: &SettingLibrary,
    ) -> RepoResult<()> {
        let json = rows::to_json(&normalized_library(library)?)?;
        self.update_column("update_story_library", story_id, WorkspaceColumn::Library, json)
    }

    fn update_global_library(&mut self, library: &SettingLibrary) -> RepoResult<()> {
        let library = normalized_library(library)?;
        self.mutate("update_global_library", |tx| {
            rows::write_global_library(tx, &library)
        })
    }

    fn export_project(&mut self) -> RepoResult<ExportedProjectData> {
        let data = self.load()?;
        info!(
            "event=export module=repo status=ok scope=project stories={}",
            data.stories.len()
        );
        Ok(wrap_project(data))
    }

    fn export_story(&mut self, story_id: &str) -> RepoResult<ExportedStoryData> {
        let session = self.session()?;
        let conn = session.engine.conn();
        let story = rows::find_story(conn, story_id)?
            .ok_or_else(|| RepoError::NotFound(story_id.to_string()))?;
        let workspace = rows::read_workspace(conn, story_id)?.unwrap_or_default();
        info!("event=export module=repo status=ok scope=story story_id={}", story_id);
        Ok(wrap_story(story, workspace))
    }

    fn import_project(&mut self, envelope: &Value) -> RepoResult<()> {
        let decoded = decode_project(envelope).map_err(|err| {
            error!("event=import module=repo status=rejected scope=project error={}", err);
            RepoError::from(err)
        })?;
        let story_count = decoded.data.stories.len();
        self.mutate("import_project", |tx| replace_project(tx, &decoded.data))?;
        info!(
            "event=import module=repo status=ok scope=project stories={} source_version={}",
            story_count, decoded.schema_version
        );
        Ok(())
    }

    fn import_story(&mut self, envelope: &Value) -> RepoResult<Story> {
        let decoded = decode_story(envelope).map_err(|err| {
            error!("event=import module=repo status=rejected scope=story error={}", err);
            RepoError::from(err)
        })?;
        let story = decoded.story;
        let workspace = decoded.workspace;
        self.mutate("import_story", |tx| {
            rows::delete_story(tx, &story.id)?;
            rows::insert_story(tx, &story)?;
            rows::insert_workspace(tx, &story.id, &workspace)
        })?;
        info!(
            "event=import module=repo status=ok scope=story story_id={} source_version={}",
            story.id, decoded.schema_version
        );
        Ok(story)
    }

    fn database_image(&mut self) -> RepoResult<Vec<u8>> {
        Ok(self.session()?.engine.export()?)
    }
}

/// Full replace of stories, workspaces and the global library.
fn replace_project(tx: &Transaction<'_>, data: &ProjectData) -> RepoResult<()> {
    rows::delete_all_stories(tx)?;
    for story in &data.stories {
        rows::insert_story(tx, story)?;
        let workspace = data.workspace(&story.id).cloned().unwrap_or_default();
        rows::insert_workspace(tx, &story.id, &workspace)?;
    }
    rows::write_global_library(tx, &data.shared_library)
}

fn normalized_library(library: &SettingLibrary) -> RepoResult<SettingLibrary> {
    let raw = serde_json::to_value(library)
        .map_err(|err| RepoError::InvalidData(format!("serialize failed: {err}")))?;
    Ok(normalize_library(&raw))
}
