use serde_json::{json, Value};
use std::path::Path;
use takecopter_core::storage::MemoryPersistenceProvider;
use takecopter_core::{
    CreateStoryInput, ProjectDataRepository, ProjectRepository, Relation, RepoError,
    RepositoryConfig, SettingCard, SettingType, CURRENT_SCHEMA_VERSION,
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

fn card_with_relation(id: &str, target: &str) -> SettingCard {
    let mut card = SettingCard::new(id, SettingType::Character, id.to_uppercase());
    card.relations.push(Relation {
        target_id: target.to_string(),
        kind: "rival".to_string(),
        source_field_id: None,
        target_field_id: None,
    });
    card
}

fn populated_repo(data_dir: &Path) -> ProjectRepository {
    let mut repo = memory_repo(data_dir);
    let a = repo.create_story(CreateStoryInput::new("A", "first")).unwrap();
    let b = repo.create_story(CreateStoryInput::new("B", "")).unwrap();
    repo.update_settings(
        &a.id,
        &[card_with_relation("x", "y"), card_with_relation("y", "x")],
    )
    .unwrap();
    repo.update_tree(&b.id, &[json!({"id": "root", "children": [{"id": "leaf"}]})])
        .unwrap();
    repo
}

#[test]
fn project_round_trip_restores_identical_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = populated_repo(dir.path());
    let before = repo.load().unwrap();

    let envelope = serde_json::to_value(repo.export_project().unwrap()).unwrap();
    assert_eq!(envelope["app"], "takecopter");
    assert_eq!(envelope["schemaVersion"], CURRENT_SCHEMA_VERSION);

    repo.create_story(CreateStoryInput::new("Scratch", "")).unwrap();
    repo.import_project(&envelope).unwrap();

    assert_eq!(repo.load().unwrap(), before);
}

#[test]
fn newer_schema_version_is_rejected_and_data_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = populated_repo(dir.path());
    let before = repo.load().unwrap();

    let mut envelope = serde_json::to_value(repo.export_project().unwrap()).unwrap();
    envelope["schemaVersion"] = json!(CURRENT_SCHEMA_VERSION + 1);
    envelope["data"]["stories"] = json!([]);

    let err = repo.import_project(&envelope).unwrap_err();
    match err {
        RepoError::VersionTooNew { found, supported } => {
            assert_eq!(found, CURRENT_SCHEMA_VERSION + 1);
            assert_eq!(supported, CURRENT_SCHEMA_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repo.load().unwrap(), before);
}

#[test]
fn foreign_app_tag_is_rejected_and_data_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = populated_repo(dir.path());
    let before = repo.load().unwrap();
    let story_id = before.stories[0].id.clone();

    let mut project = serde_json::to_value(repo.export_project().unwrap()).unwrap();
    project["app"] = json!("someone-else");
    assert!(matches!(
        repo.import_project(&project),
        Err(RepoError::InvalidSource(_))
    ));

    let mut story = serde_json::to_value(repo.export_story(&story_id).unwrap()).unwrap();
    story["app"] = json!("someone-else");
    assert!(matches!(
        repo.import_story(&story),
        Err(RepoError::InvalidSource(_))
    ));

    assert_eq!(repo.load().unwrap(), before);
}

#[test]
fn exported_story_imports_into_fresh_repository_with_ids_intact() {
    let source_dir = tempfile::tempdir().unwrap();
    let mut source = memory_repo(source_dir.path());
    let story = source.create_story(CreateStoryInput::new("A", "")).unwrap();
    let card_x = SettingCard::new("card-x", SettingType::Item, "Lantern");
    source.update_settings(&story.id, &[card_x]).unwrap();
    let envelope = serde_json::to_value(source.export_story(&story.id).unwrap()).unwrap();

    let target_dir = tempfile::tempdir().unwrap();
    let mut target = memory_repo(target_dir.path());
    let imported = target.import_story(&envelope).unwrap();

    let project = target.load().unwrap();
    assert_eq!(project.stories.len(), 1);
    assert_eq!(project.stories[0].id, story.id);
    assert_eq!(project.stories[0].title, "A");
    assert_eq!(imported.id, story.id);
    let settings = &project.workspace(&story.id).unwrap().settings;
    assert_eq!(settings.len(), 1);
    assert_eq!(settings[0].id, "card-x");
    assert_eq!(settings[0].title, "Lantern");
}

#[test]
fn import_story_replaces_only_the_matching_story() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = populated_repo(dir.path());
    let before = repo.load().unwrap();
    let target = before.stories.iter().find(|s| s.title == "A").unwrap().clone();
    let other = before.stories.iter().find(|s| s.title == "B").unwrap().clone();

    let mut envelope = serde_json::to_value(repo.export_story(&target.id).unwrap()).unwrap();
    envelope["story"]["title"] = json!("A (restored)");
    envelope["workspace"]["settings"] = json!([]);
    repo.import_story(&envelope).unwrap();

    let after = repo.load().unwrap();
    assert_eq!(after.stories.len(), 2);
    assert_eq!(after.story(&target.id).unwrap().title, "A (restored)");
    assert!(after.workspace(&target.id).unwrap().settings.is_empty());
    assert_eq!(after.story(&other.id), before.story(&other.id));
    assert_eq!(after.workspace(&other.id), before.workspace(&other.id));
}

#[test]
fn import_normalizes_malformed_payloads_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());
    let envelope = json!({
        "app": "takecopter",
        "schemaVersion": 1,
        "exportedAt": "2024-01-02T03:04:05Z",
        "data": {
            "stories": [{"id": "s1", "title": "Old"}, {"title": "no id"}],
            "workspaces": {
                "s1": {
                    "settings": [
                        {"id": "c", "title": "One", "relations": [{"targetId": ""}, {"targetId": "c__2"}]},
                        {"id": "c", "title": "Two", "customFields": [{"name": "age", "value": "30"}]}
                    ],
                    "tree": "not-a-tree"
                }
            }
        }
    });
    repo.import_project(&envelope).unwrap();

    let project = repo.load().unwrap();
    assert_eq!(project.stories.len(), 1);
    assert_eq!(project.stories[0].updated_at, "2024-01-02T03:04:05Z");
    let workspace = project.workspace("s1").unwrap();
    assert_eq!(workspace.settings[1].id, "c__2");
    assert_eq!(workspace.settings[0].relations.len(), 1);
    assert_eq!(workspace.settings[0].relations[0].kind, "关联");
    assert_eq!(workspace.settings[1].custom_fields[0].id, "field-1");
    assert!(workspace.tree.is_empty());
}

#[test]
fn legacy_unwrapped_payloads_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = memory_repo(dir.path());

    let bare_project: Value = json!({
        "stories": [{"id": "legacy", "title": "Legacy", "updatedAt": "2022-02-02T00:00:00Z"}],
        "workspaces": {"legacy": {"settings": [], "tree": []}}
    });
    repo.import_project(&bare_project).unwrap();
    assert_eq!(repo.load().unwrap().stories[0].id, "legacy");

    let bare_story = json!({"story": {"id": "extra", "title": "Extra"}, "workspace": {}});
    repo.import_story(&bare_story).unwrap();
    assert_eq!(repo.load().unwrap().stories.len(), 2);
}
