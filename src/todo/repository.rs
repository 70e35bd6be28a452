//! Persistence layer for todos.
//!
//! [`TodoRepository`] abstracts storage behind a small CRUD contract with
//! two interchangeable implementations: [`InMemoryRepository`], backed by an
//! ordered map, and [`RdbmsRepository`], backed by a single `todos` table.
//! Both honor identical externally observable semantics.

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sea_orm::*;
use tokio::sync::RwLock;

use crate::entities::todo;
use crate::todo::{Status, Todo};

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The backing store could not execute the operation.
    #[error("storage failure: {0}")]
    Storage(#[from] sea_orm::DbErr),
    /// A stored row carried a status label the application does not know.
    #[error("stored status label '{0}' is not recognized")]
    Corrupted(String),
}

/// Explicit filter criterion for queries and bulk deletes.
///
/// Kept as a closed set of criteria rather than an arbitrary closure so
/// every backend can translate it into its native query form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoFilter {
    /// Matches todos whose status equals the given status.
    StatusIs(Status),
}

impl TodoFilter {
    fn matches(&self, todo: &Todo) -> bool {
        match self {
            TodoFilter::StatusIs(status) => todo.status() == *status,
        }
    }
}

/// Storage contract for todo records.
///
/// `save` is an upsert by id: it updates the text and status of an existing
/// record or inserts a new one. Callers rely on this for status toggling,
/// which constructs a changed copy and saves it over the stored record.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Returns the number of stored todos.
    async fn count(&self) -> Result<u64, RepositoryError>;

    /// Returns all stored todos, newest first by id.
    async fn find_all(&self) -> Result<Vec<Todo>, RepositoryError>;

    /// Returns the todos satisfying the filter, newest first by id.
    async fn find_all_matching(&self, filter: TodoFilter) -> Result<Vec<Todo>, RepositoryError>;

    /// Returns the todo with the given id, or `None` when missing.
    async fn find_one(&self, id: i64) -> Result<Option<Todo>, RepositoryError>;

    /// Upserts by id and returns the saved todo.
    async fn save(&self, todo: Todo) -> Result<Todo, RepositoryError>;

    /// Deletes the todo with the given id, returning the removed count (0 or 1).
    async fn delete(&self, id: i64) -> Result<u64, RepositoryError>;

    /// Deletes every todo satisfying the filter, returning the removed count.
    async fn delete_matching(&self, filter: TodoFilter) -> Result<u64, RepositoryError>;

    /// Removes every stored todo. Used at startup/reset only.
    async fn delete_all(&self) -> Result<(), RepositoryError>;

    /// Returns whether a todo with the given id is stored.
    async fn exists(&self, id: i64) -> Result<bool, RepositoryError>;
}

/// Map-backed repository.
///
/// The ordered map keyed by id gives `find_all` its stable newest-first
/// order through reverse key iteration. Operations never fail.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    todos: RwLock<BTreeMap<i64, Todo>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoRepository for InMemoryRepository {
    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.todos.read().await.len() as u64)
    }

    async fn find_all(&self) -> Result<Vec<Todo>, RepositoryError> {
        Ok(self.todos.read().await.values().rev().cloned().collect())
    }

    async fn find_all_matching(&self, filter: TodoFilter) -> Result<Vec<Todo>, RepositoryError> {
        Ok(self
            .todos
            .read()
            .await
            .values()
            .rev()
            .filter(|todo| filter.matches(todo))
            .cloned()
            .collect())
    }

    async fn find_one(&self, id: i64) -> Result<Option<Todo>, RepositoryError> {
        Ok(self.todos.read().await.get(&id).cloned())
    }

    async fn save(&self, todo: Todo) -> Result<Todo, RepositoryError> {
        // Map insertion is the upsert; one write guard covers the existence
        // check and the write.
        self.todos.write().await.insert(todo.id(), todo.clone());
        Ok(todo)
    }

    async fn delete(&self, id: i64) -> Result<u64, RepositoryError> {
        Ok(self.todos.write().await.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_matching(&self, filter: TodoFilter) -> Result<u64, RepositoryError> {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|_, todo| !filter.matches(todo));
        Ok((before - todos.len()) as u64)
    }

    async fn delete_all(&self) -> Result<(), RepositoryError> {
        self.todos.write().await.clear();
        Ok(())
    }

    async fn exists(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.todos.read().await.contains_key(&id))
    }
}

/// Relational repository over the `todos` table.
///
/// Each operation draws one pooled connection from the shared
/// [`DatabaseConnection`] and maps to a single SQL statement, except `save`,
/// which wraps its existence check and write in one transaction so the
/// upsert branches cannot race.
#[derive(Debug)]
pub struct RdbmsRepository {
    db: DatabaseConnection,
}

impl RdbmsRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_todo(model: todo::Model) -> Result<Todo, RepositoryError> {
    let status = Status::from_label(&model.status)
        .ok_or_else(|| RepositoryError::Corrupted(model.status.clone()))?;
    Ok(Todo::new(model.id, model.name).with_status(status))
}

fn to_condition(filter: TodoFilter) -> sea_query::SimpleExpr {
    match filter {
        TodoFilter::StatusIs(status) => todo::Column::Status.eq(status.as_label()),
    }
}

#[async_trait]
impl TodoRepository for RdbmsRepository {
    #[tracing::instrument(skip(self))]
    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(todo::Entity::find().count(&self.db).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Todo>, RepositoryError> {
        let models = todo::Entity::find()
            .order_by_desc(todo::Column::Id)
            .all(&self.db)
            .await?;
        models.into_iter().map(to_todo).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn find_all_matching(&self, filter: TodoFilter) -> Result<Vec<Todo>, RepositoryError> {
        let models = todo::Entity::find()
            .filter(to_condition(filter))
            .order_by_desc(todo::Column::Id)
            .all(&self.db)
            .await?;
        models.into_iter().map(to_todo).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn find_one(&self, id: i64) -> Result<Option<Todo>, RepositoryError> {
        let model = todo::Entity::find_by_id(id).one(&self.db).await?;
        model.map(to_todo).transpose()
    }

    #[tracing::instrument(skip(self, todo_value))]
    async fn save(&self, todo_value: Todo) -> Result<Todo, RepositoryError> {
        let txn = self.db.begin().await?;

        let existing = todo::Entity::find_by_id(todo_value.id()).one(&txn).await?;
        match existing {
            Some(model) => {
                let mut active: todo::ActiveModel = model.into();
                active.name = ActiveValue::Set(todo_value.text().to_owned());
                active.status = ActiveValue::Set(todo_value.status().as_label().to_owned());
                active.update(&txn).await?;
            }
            None => {
                let active = todo::ActiveModel {
                    id: ActiveValue::Set(todo_value.id()),
                    name: ActiveValue::Set(todo_value.text().to_owned()),
                    status: ActiveValue::Set(todo_value.status().as_label().to_owned()),
                };
                active.insert(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(todo_value)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<u64, RepositoryError> {
        let result = todo::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_matching(&self, filter: TodoFilter) -> Result<u64, RepositoryError> {
        let result = todo::Entity::delete_many()
            .filter(to_condition(filter))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_all(&self) -> Result<(), RepositoryError> {
        todo::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(todo::Entity::find_by_id(id).one(&self.db).await?.is_some())
    }
}
