use std::path::Path;
use takecopter_core::config::DATABASE_IMAGE_KEY;
use takecopter_core::db::schema::{ensure_schema, stored_version};
use takecopter_core::db::Engine;
use takecopter_core::storage::{KeyValueStore, MemoryPersistenceProvider};
use takecopter_core::{
    ProjectDataRepository, ProjectRepository, RepositoryConfig, CURRENT_SCHEMA_VERSION,
};

fn first_release_image() -> Vec<u8> {
    let engine = Engine::open_empty().unwrap();
    engine
        .exec(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT);
             CREATE TABLE stories (
                 id TEXT PRIMARY KEY,
                 title TEXT NOT NULL DEFAULT '',
                 description TEXT NOT NULL DEFAULT '',
                 updated_at TEXT NOT NULL DEFAULT ''
             );
             CREATE TABLE workspaces (
                 story_id TEXT PRIMARY KEY REFERENCES stories(id) ON DELETE CASCADE,
                 settings_json TEXT NOT NULL DEFAULT '[]',
                 tree_json TEXT NOT NULL DEFAULT '[]'
             );
             INSERT INTO meta (key, value) VALUES ('schema_version', '1');
             INSERT INTO stories (id, title, updated_at) VALUES ('s1', 'Old', '2023-01-01T00:00:00Z');
             INSERT INTO workspaces (story_id, settings_json) VALUES ('s1', '[{\"id\":\"c1\",\"title\":\"Card\"}]');",
        )
        .unwrap();
    engine.export().unwrap()
}

fn repo_over(data_dir: &Path, provider: &MemoryPersistenceProvider) -> ProjectRepository {
    let mut repo = ProjectRepository::with_provider(
        RepositoryConfig::new(data_dir),
        Box::new(provider.clone()),
    )
    .unwrap();
    repo.initialize_project_root(None).unwrap();
    repo
}

#[test]
fn ensure_schema_twice_is_a_no_op() {
    let mut engine = Engine::open_empty().unwrap();
    let first = ensure_schema(engine.conn_mut()).unwrap();
    assert!(first.changed());

    let second = ensure_schema(engine.conn_mut()).unwrap();
    assert!(!second.changed());
    assert_eq!(second.version, CURRENT_SCHEMA_VERSION);
    assert_eq!(stored_version(engine.conn()).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn first_release_image_is_upgraded_in_place_without_data_loss() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MemoryPersistenceProvider::new();
    provider
        .primary
        .put(DATABASE_IMAGE_KEY, &first_release_image())
        .unwrap();

    let mut repo = repo_over(dir.path(), &provider);
    let project = repo.load().unwrap();
    assert_eq!(repo.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);

    assert_eq!(project.stories.len(), 1);
    assert_eq!(project.stories[0].cover_color, "var(--coral-400)");
    let workspace = project.workspace("s1").unwrap();
    assert_eq!(workspace.settings[0].id, "c1");
    assert!(workspace.library.is_empty());

    let upgraded = provider.primary.get(DATABASE_IMAGE_KEY).unwrap().unwrap();
    let reopened = Engine::from_image(&upgraded).unwrap();
    assert_eq!(stored_version(reopened.conn()).unwrap(), CURRENT_SCHEMA_VERSION);
}
