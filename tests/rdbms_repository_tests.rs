use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection};
use testcontainers_modules::{postgres, testcontainers};
use todomvc_server::entities::todo;
use todomvc_server::todo::repository::{
    RdbmsRepository, RepositoryError, TodoFilter, TodoRepository,
};
use todomvc_server::todo::{Status, Todo};

mod common;

pub struct TestContext {
    #[allow(dead_code)] // container is kept to ensure it's not dropped
    pub container: testcontainers::ContainerAsync<postgres::Postgres>,
    pub db: DatabaseConnection,
}

async fn setup() -> anyhow::Result<TestContext> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().try_init();
    let container = common::setup_container().await?;
    let db = common::setup_db(&container).await?;
    Ok(TestContext { db, container })
}

#[tokio::test]
async fn can_save_and_find_one() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    repository
        .save(Todo::new(1, "Buy milk"))
        .await
        .expect("Failed to save todo");

    let found = repository
        .find_one(1)
        .await
        .expect("Failed to find todo")
        .expect("Todo should be present");
    assert_eq!(found.text(), "Buy milk");
    assert_eq!(found.status(), Status::Active);

    let absent = repository.find_one(2).await.expect("Failed to query todo");
    assert!(absent.is_none());
}

#[tokio::test]
async fn can_upsert_without_duplicating() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    let original = Todo::new(7, "Original");
    repository
        .save(original.clone())
        .await
        .expect("Failed to save todo");
    repository
        .save(original.with_status(Status::Completed))
        .await
        .expect("Failed to save changed todo");

    assert_eq!(repository.count().await.expect("Failed to count"), 1);
    let stored = repository
        .find_one(7)
        .await
        .expect("Failed to find todo")
        .expect("Todo should be present");
    assert_eq!(stored.status(), Status::Completed);
    assert_eq!(stored.text(), "Original");
}

#[tokio::test]
async fn can_list_todos_newest_first() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    for id in [1, 3, 2] {
        repository
            .save(Todo::new(id, format!("todo {id}")))
            .await
            .expect("Failed to save todo");
    }

    let all = repository.find_all().await.expect("Failed to list todos");
    let ids: Vec<i64> = all.iter().map(Todo::id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
async fn count_matches_find_all_length() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    for id in 1..=4 {
        repository
            .save(Todo::new(id, "x"))
            .await
            .expect("Failed to save todo");
    }
    repository.delete(2).await.expect("Failed to delete todo");

    let all = repository.find_all().await.expect("Failed to list todos");
    let count = repository.count().await.expect("Failed to count");
    assert_eq!(all.len() as u64, count);
}

#[tokio::test]
async fn can_filter_completed_todos() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    repository
        .save(Todo::new(1, "active"))
        .await
        .expect("Failed to save todo");
    repository
        .save(Todo::new(2, "done").with_status(Status::Completed))
        .await
        .expect("Failed to save todo");

    let completed = repository
        .find_all_matching(TodoFilter::StatusIs(Status::Completed))
        .await
        .expect("Failed to filter todos");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id(), 2);
}

#[tokio::test]
async fn can_clear_completed_with_one_bulk_delete() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    repository
        .save(Todo::new(1, "keep"))
        .await
        .expect("Failed to save todo");
    repository
        .save(Todo::new(2, "drop").with_status(Status::Completed))
        .await
        .expect("Failed to save todo");
    repository
        .save(Todo::new(3, "drop too").with_status(Status::Completed))
        .await
        .expect("Failed to save todo");

    let removed = repository
        .delete_matching(TodoFilter::StatusIs(Status::Completed))
        .await
        .expect("Failed to clear completed todos");
    assert_eq!(removed, 2);

    let remaining = repository.find_all().await.expect("Failed to list todos");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), 1);

    let removed_again = repository
        .delete_matching(TodoFilter::StatusIs(Status::Completed))
        .await
        .expect("Failed to clear completed todos");
    assert_eq!(removed_again, 0);
}

#[tokio::test]
async fn can_delete_unknown_id_without_error() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    let removed = repository.delete(404).await.expect("Failed to delete");
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn can_check_existence_and_delete_all() {
    let state = setup().await.expect("Failed to setup test context");
    let repository = RdbmsRepository::new(state.db);

    repository
        .save(Todo::new(5, "here"))
        .await
        .expect("Failed to save todo");
    assert!(repository.exists(5).await.expect("Failed to check existence"));
    assert!(!repository.exists(6).await.expect("Failed to check existence"));

    repository.delete_all().await.expect("Failed to delete all");
    assert_eq!(repository.count().await.expect("Failed to count"), 0);
}

#[tokio::test]
async fn can_report_unknown_status_label_as_corrupted() {
    let state = setup().await.expect("Failed to setup test context");

    // Write a row with a label the application does not know, bypassing the
    // repository.
    let active_model = todo::ActiveModel {
        id: ActiveValue::Set(1),
        name: ActiveValue::Set("weird".to_string()),
        status: ActiveValue::Set("archived".to_string()),
    };
    active_model
        .insert(&state.db)
        .await
        .expect("Failed to insert row");

    let repository = RdbmsRepository::new(state.db);
    let result = repository.find_all().await;

    assert!(matches!(result, Err(RepositoryError::Corrupted(label)) if label == "archived"));
}
