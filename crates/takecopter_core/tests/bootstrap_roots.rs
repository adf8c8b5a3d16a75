use std::fs;
use takecopter_core::config::DATABASE_IMAGE_KEY;
use takecopter_core::repo::{EXPORTS_DIR, LOCK_FILE};
use takecopter_core::{
    CreateStoryInput, ProjectDataRepository, ProjectRepository, ProjectService, RepoError,
    RepositoryConfig,
};

#[test]
fn bootstrap_state_tracks_the_active_root() {
    let dir = tempfile::tempdir().unwrap();
    let config = RepositoryConfig::new(dir.path());
    let mut repo = ProjectRepository::open(config.clone()).unwrap();

    let state = repo.bootstrap_state();
    assert!(state.needs_setup);
    assert_eq!(state.active_root_path, None);
    assert_eq!(
        state.default_root_path,
        config.default_root_path().to_string_lossy()
    );

    let root = repo.initialize_project_root(Some("   ")).unwrap();
    assert_eq!(root, config.default_root_path());
    assert!(root.join(EXPORTS_DIR).is_dir());
    assert!(root.join(LOCK_FILE).is_file());

    let state = repo.bootstrap_state();
    assert!(!state.needs_setup);
    assert_eq!(
        state.active_root_path,
        Some(root.to_string_lossy().into_owned())
    );

    let restarted = ProjectRepository::open(config).unwrap();
    assert_eq!(restarted.active_root(), Some(root.as_path()));
}

#[test]
fn open_project_root_validates_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = ProjectRepository::open(RepositoryConfig::new(dir.path().join("data"))).unwrap();

    assert!(matches!(
        repo.open_project_root("  "),
        Err(RepoError::EmptyPath)
    ));

    let missing = dir.path().join("missing");
    assert!(matches!(
        repo.open_project_root(missing.to_str().unwrap()),
        Err(RepoError::RootNotFound(path)) if path == missing
    ));

    let empty = dir.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    assert!(matches!(
        repo.open_project_root(empty.to_str().unwrap()),
        Err(RepoError::NotAProject(_))
    ));
    assert!(repo.bootstrap_state().needs_setup);
}

#[test]
fn switching_roots_switches_projects() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = ProjectRepository::open(RepositoryConfig::new(dir.path().join("data"))).unwrap();

    let first = dir.path().join("first");
    repo.initialize_project_root(first.to_str()).unwrap();
    repo.create_story(CreateStoryInput::new("In first", "")).unwrap();
    assert!(first.join(DATABASE_IMAGE_KEY).is_file());

    let second = dir.path().join("second");
    repo.initialize_project_root(second.to_str()).unwrap();
    assert!(repo.load().unwrap().stories.is_empty());

    repo.open_project_root(first.to_str().unwrap()).unwrap();
    let project = repo.load().unwrap();
    assert_eq!(project.stories.len(), 1);
    assert_eq!(project.stories[0].title, "In first");
}

#[test]
fn service_writes_exports_and_backups_under_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = ProjectRepository::open(RepositoryConfig::new(dir.path().join("data"))).unwrap();
    let root = repo.initialize_project_root(None).unwrap();
    let story = repo.create_story(CreateStoryInput::new("Exported", "")).unwrap();
    let mut service = ProjectService::new(repo);

    let project_file = service.export_project_to_file().unwrap();
    assert!(project_file.starts_with(root.join(EXPORTS_DIR)));
    let name = project_file.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("takecopter-project-") && name.ends_with(".json"));
    let envelope: serde_json::Value =
        serde_json::from_slice(&fs::read(&project_file).unwrap()).unwrap();
    assert_eq!(envelope["app"], "takecopter");
    assert_eq!(envelope["data"]["stories"][0]["id"], story.id.as_str());

    let story_file = service.export_story_to_file(&story.id).unwrap();
    let name = story_file.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(&format!("takecopter-story-{}-", story.id)));

    let backup = service.backup_database().unwrap();
    let bytes = fs::read(&backup).unwrap();
    assert!(bytes.starts_with(b"SQLite format 3\0"));

    service.repo_mut().delete_story(&story.id).unwrap();
    let restored = service.import_story_file(&story_file).unwrap();
    assert_eq!(restored.id, story.id);
    service.import_project_file(&project_file).unwrap();
    assert_eq!(service.repo_mut().load().unwrap().stories.len(), 1);
}

#[test]
fn unparsable_import_file_is_an_invalid_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = ProjectRepository::open(RepositoryConfig::new(dir.path().join("data"))).unwrap();
    repo.initialize_project_root(None).unwrap();
    let mut service = ProjectService::new(repo);

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "definitely not json").unwrap();
    assert!(matches!(
        service.import_project_file(&garbage),
        Err(RepoError::InvalidSource(_))
    ));
    assert!(matches!(
        service.import_project_file(&dir.path().join("absent.json")),
        Err(RepoError::Io { .. })
    ));
}
