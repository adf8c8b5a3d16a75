use serde_json::json;
use std::path::Path;
use takecopter_core::model::library::DEFAULT_CATEGORIES;
use takecopter_core::storage::MemoryPersistenceProvider;
use takecopter_core::{
    CreateStoryInput, ProjectDataRepository, ProjectRepository, RepoError, RepositoryConfig,
    SettingCard, SettingLibrary, SettingTag, SettingType,
};

fn memory_repo(data_dir: &Path) -> ProjectRepository {
    let mut repo = ProjectRepository::with_provider(
        RepositoryConfig::new(data_dir),
        Box::new(MemoryPersistenceProvider::new()),
    )
    .unwrap();
    repo.initialize_project_root(None).unwrap();
    repo
}

#[test]
fn load_before_setup_requires_a_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = ProjectRepository::with_provider(
        RepositoryConfig::new(dir.path()),
        Box::new(MemoryPersistenceProvider::new()),
    )
    .unwrap();

    assert!(repo.bootstrap_state().needs_setup);
    assert!(matches!(repo.load(), Err(RepoError::SetupRequired)));
    assert!(matches!(
        repo.create_story(CreateStoryInput::new("A", "")),
        Err(RepoError::SetupRequired)
    ));
}

#[test]
fn fresh_project_has_seeded_global_library_and_no_stories() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());

    let project = repo.load().unwrap();
    assert!(project.stories.is_empty());
    assert!(project.workspaces.is_empty());
    assert_eq!(project.shared_library.categories, DEFAULT_CATEGORIES);
}

#[test]
fn create_story_adds_exactly_one_story_with_empty_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    repo.create_story(CreateStoryInput::new("First", "")).unwrap();
    let before = repo.load().unwrap();

    let story = repo
        .create_story(CreateStoryInput::new("  Second  ", "a sequel"))
        .unwrap();
    let after = repo.load().unwrap();

    assert_eq!(after.stories.len(), before.stories.len() + 1);
    assert_eq!(story.title, "Second");
    assert_eq!(story.description, "a sequel");
    assert!(!story.updated_at.is_empty());
    let workspace = after.workspace(&story.id).unwrap();
    assert!(workspace.settings.is_empty());
    assert!(workspace.tree.is_empty());
    assert!(workspace.library.is_empty());
}

#[test]
fn rename_validates_title_and_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    let story = repo.create_story(CreateStoryInput::new("Draft", "")).unwrap();

    assert!(matches!(
        repo.rename_story(&story.id, "   "),
        Err(RepoError::EmptyTitle)
    ));
    assert!(matches!(
        repo.rename_story("missing", "Title"),
        Err(RepoError::NotFound(id)) if id == "missing"
    ));

    let renamed = repo.rename_story(&story.id, " Final ").unwrap();
    assert_eq!(renamed.title, "Final");
    assert_eq!(renamed.id, story.id);
    assert_eq!(repo.load().unwrap().story(&story.id).unwrap().title, "Final");
}

#[test]
fn delete_story_cascades_to_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    let keep = repo.create_story(CreateStoryInput::new("Keep", "")).unwrap();
    let gone = repo.create_story(CreateStoryInput::new("Gone", "")).unwrap();
    repo.update_tree(&gone.id, &[json!({"id": "n1"})]).unwrap();

    repo.delete_story(&gone.id).unwrap();

    let project = repo.load().unwrap();
    assert_eq!(project.stories.len(), 1);
    assert_eq!(project.stories[0].id, keep.id);
    assert!(project.workspace(&gone.id).is_none());
    assert!(matches!(
        repo.delete_story(&gone.id),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn workspace_updates_replace_columns_and_bump_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    let story = repo.create_story(CreateStoryInput::new("Saga", "")).unwrap();

    let mut hero = SettingCard::new("hero", SettingType::Character, "Hero");
    hero.summary = "brave".to_string();
    let duplicate = SettingCard::new("hero", SettingType::Location, "Keep");
    repo.update_settings(&story.id, &[hero, duplicate]).unwrap();
    repo.update_tree(&story.id, &[json!({"id": "chapter-1", "children": []})])
        .unwrap();
    let library = SettingLibrary {
        tags: vec![SettingTag {
            name: "主角".to_string(),
            color: "var(--rose-400)".to_string(),
        }],
        categories: vec!["角色".to_string()],
        templates: Vec::new(),
    };
    repo.update_story_library(&story.id, &library).unwrap();

    let project = repo.load().unwrap();
    let workspace = project.workspace(&story.id).unwrap();
    let ids: Vec<_> = workspace.settings.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["hero", "hero__2"]);
    assert_eq!(workspace.tree, vec![json!({"id": "chapter-1", "children": []})]);
    assert_eq!(workspace.library, library);
    assert!(project.story(&story.id).unwrap().updated_at >= story.updated_at);

    assert!(matches!(
        repo.update_tree("missing", &[]),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn global_library_is_independent_of_story_libraries() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    let story = repo.create_story(CreateStoryInput::new("Saga", "")).unwrap();

    let global = SettingLibrary {
        tags: Vec::new(),
        categories: vec!["势力".to_string(), "  ".to_string(), "势力".to_string()],
        templates: Vec::new(),
    };
    repo.update_global_library(&global).unwrap();

    let project = repo.load().unwrap();
    assert_eq!(project.shared_library.categories, ["势力"]);
    assert!(project.workspace(&story.id).unwrap().library.is_empty());
}

#[test]
fn stories_are_listed_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    let envelope = json!({
        "app": "takecopter",
        "schemaVersion": 3,
        "exportedAt": "2024-06-01T00:00:00Z",
        "data": {
            "stories": [
                {"id": "old", "title": "Old", "updatedAt": "2023-01-01T00:00:00Z"},
                {"id": "new", "title": "New", "updatedAt": "2024-05-01T00:00:00Z"},
                {"id": "mid", "title": "Mid", "updatedAt": "2023-06-01T00:00:00Z"}
            ]
        }
    });
    repo.import_project(&envelope).unwrap();

    let order: Vec<_> = repo
        .load()
        .unwrap()
        .stories
        .into_iter()
        .map(|story| story.id)
        .collect();
    assert_eq!(order, ["new", "mid", "old"]);
}
