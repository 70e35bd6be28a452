use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

pub mod repository;
pub mod web;

use repository::{RepositoryError, TodoFilter, TodoRepository};

/// A single to-do item.
///
/// The id and text are fixed at creation. A status change is expressed by
/// building a new value with [`Todo::with_status`] and saving it over the
/// stored record carrying the same id; the repository reconciles the changed
/// copy as an update, never an insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Todo {
    id: i64,
    text: String,
    status: Status,
}

impl Todo {
    /// Creates a new active todo with the given id and text.
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            status: Status::Active,
        }
    }

    /// Returns a copy of this todo carrying the given status.
    pub fn with_status(&self, status: Status) -> Self {
        Self {
            id: self.id,
            text: self.text.clone(),
            status,
        }
    }

    /// Returns the id of the todo.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns the description text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the completion status.
    pub fn status(&self) -> Status {
        self.status
    }
}

/// Completion state of a [`Todo`].
///
/// The lowercase label doubles as the database representation and the CSS
/// class on the rendered list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Active,
    Completed,
}

impl Status {
    /// Returns the lowercase label for this status.
    pub fn as_label(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Completed => "completed",
        }
    }

    /// Parses a lowercase label back into a status.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "active" => Some(Status::Active),
            "completed" => Some(Status::Completed),
            _ => None,
        }
    }

    /// Returns the opposite status.
    pub fn toggled(&self) -> Self {
        match self {
            Status::Active => Status::Completed,
            Status::Completed => Status::Active,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Request parameters extracted by the transport layer.
pub type Params = HashMap<String, String>;

/// Named collections produced by the list action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TodoListing {
    /// Every stored todo, newest first.
    pub todos: Vec<Todo>,
    /// The subset with status completed, newest first.
    pub completed: Vec<Todo>,
}

/// Result of dispatching one request triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The list action ran; render the named collections.
    Listing(TodoListing),
    /// A mutation ran and affected this many records. Zero is a valid
    /// outcome: deleting an id with no record changes nothing.
    Changed(u64),
    /// A toggle referenced an id with no stored record.
    NoSuchTodo(i64),
    /// No route matched the method/path combination.
    Unmatched,
}

/// Error type for dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A required form field was absent from the request.
    #[error("required parameter '{0}' is missing")]
    MissingParameter(&'static str),
    /// A form field was present but could not be parsed as an id.
    #[error("parameter '{0}' is not a valid id")]
    InvalidParameter(&'static str),
    /// The repository reported a storage failure.
    #[error("storage failure")]
    Storage(#[from] RepositoryError),
}

/// Hands out creation ids.
///
/// Seeded from the wall clock in milliseconds and bumped atomically per id,
/// so ids stay unique within a process even when several todos are created
/// in the same millisecond.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(chrono::Utc::now().timestamp_millis()),
        }
    }

    fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps an (HTTP method, path, parameter-map) triple to a repository
/// operation and packages the result.
///
/// Matching is case-insensitive on both method and path. The repository is
/// injected at construction; the dispatcher holds no other state beyond the
/// id source for newly created todos.
pub struct Dispatcher {
    repository: Arc<dyn TodoRepository>,
    ids: IdGenerator,
}

impl Dispatcher {
    pub fn new(repository: Arc<dyn TodoRepository>) -> Self {
        Self {
            repository,
            ids: IdGenerator::new(),
        }
    }

    /// Returns the repository this dispatcher operates on.
    pub fn repository(&self) -> &dyn TodoRepository {
        self.repository.as_ref()
    }

    /// Routes one request triple to its action and executes it.
    #[tracing::instrument(skip(self, params))]
    pub async fn dispatch(
        &self,
        method: &str,
        path: &str,
        params: &Params,
    ) -> Result<DispatchOutcome, DispatchError> {
        tracing::debug!(?params, "dispatching request");

        if route(method, path, "GET", "/todos") || route(method, path, "GET", "/") {
            return self.handle_index().await;
        }
        if route(method, path, "POST", "/todos") || route(method, path, "POST", "/") {
            return self.handle_create(params).await;
        }
        if route(method, path, "POST", "/toggleStatus") {
            return self.handle_toggle(params).await;
        }
        if route(method, path, "POST", "/deleteTodo") {
            return self.handle_delete(params).await;
        }
        if route(method, path, "POST", "/clearTodo") {
            return self.handle_clear().await;
        }

        Ok(DispatchOutcome::Unmatched)
    }

    async fn handle_index(&self) -> Result<DispatchOutcome, DispatchError> {
        let todos = self.repository.find_all().await?;
        let completed = self
            .repository
            .find_all_matching(TodoFilter::StatusIs(Status::Completed))
            .await?;
        Ok(DispatchOutcome::Listing(TodoListing { todos, completed }))
    }

    async fn handle_create(&self, params: &Params) -> Result<DispatchOutcome, DispatchError> {
        let text = params
            .get("new-todo")
            .ok_or(DispatchError::MissingParameter("new-todo"))?;
        let todo = Todo::new(self.ids.next_id(), text.clone());
        self.repository.save(todo).await?;
        Ok(DispatchOutcome::Changed(1))
    }

    async fn handle_toggle(&self, params: &Params) -> Result<DispatchOutcome, DispatchError> {
        let id = parse_todo_id(params)?;
        let Some(todo) = self.repository.find_one(id).await? else {
            return Ok(DispatchOutcome::NoSuchTodo(id));
        };
        let changed = todo.with_status(todo.status().toggled());
        self.repository.save(changed).await?;
        Ok(DispatchOutcome::Changed(1))
    }

    async fn handle_delete(&self, params: &Params) -> Result<DispatchOutcome, DispatchError> {
        let id = parse_todo_id(params)?;
        let removed = self.repository.delete(id).await?;
        Ok(DispatchOutcome::Changed(removed))
    }

    async fn handle_clear(&self) -> Result<DispatchOutcome, DispatchError> {
        let removed = self
            .repository
            .delete_matching(TodoFilter::StatusIs(Status::Completed))
            .await?;
        Ok(DispatchOutcome::Changed(removed))
    }
}

fn route(method: &str, path: &str, expected_method: &str, expected_path: &str) -> bool {
    method.eq_ignore_ascii_case(expected_method) && path.eq_ignore_ascii_case(expected_path)
}

fn parse_todo_id(params: &Params) -> Result<i64, DispatchError> {
    let raw = params
        .get("todo-id")
        .ok_or(DispatchError::MissingParameter("todo-id"))?;
    raw.parse()
        .map_err(|_| DispatchError::InvalidParameter("todo-id"))
}
