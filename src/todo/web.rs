use askama::Template;
use axum::{
    Form,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::todo::{DispatchError, DispatchOutcome, Dispatcher, Params, Todo, TodoListing};

/// Shared state for the todo dispatch surface.
#[derive(Clone)]
pub struct TodoState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Transport-facing error type for the todo dispatch surface.
#[derive(Debug, thiserror::Error)]
pub enum TodoWebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents a dispatch failure.
    #[error("Dispatch failed")]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for TodoWebError {
    fn into_response(self) -> Response {
        if let TodoWebError::Dispatch(DispatchError::Storage(err)) = &self {
            tracing::error!(%err, "storage failure while handling request");
        }

        let (status_code, heading, user_facing_error_message) = match &self {
            TodoWebError::Dispatch(DispatchError::MissingParameter(name)) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                format!("Required parameter '{name}' is missing."),
            ),
            TodoWebError::Dispatch(DispatchError::InvalidParameter(name)) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                format!("Parameter '{name}' must be a number."),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An unexpected error occurred while processing your request. Please try again later."
                    .to_string(),
            ),
        };

        (
            status_code,
            Html(format!(
                "<h1>{}</h1><p>{}</p>",
                heading, user_facing_error_message
            )),
        )
            .into_response()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    todos: Vec<Todo>,
    items_left: usize,
    completed_count: usize,
    plural: bool,
}

impl IndexTemplate {
    pub fn new(listing: TodoListing) -> Self {
        let completed_count = listing.completed.len();
        let items_left = listing.todos.len().saturating_sub(completed_count);
        Self {
            todos: listing.todos,
            items_left,
            completed_count,
            plural: items_left != 1,
        }
    }
}

/// Catch-all handler feeding every request into the dispatcher.
///
/// GET and HEAD requests carry their parameters in the query string, POSTs
/// in an urlencoded form body; [`Form`] covers both. Listings render as
/// HTML, mutations answer with a 303 redirect back to the listing, and
/// unmatched routes fall through to a plain 404.
#[tracing::instrument(skip(state, params))]
pub async fn dispatch_handler(
    State(state): State<TodoState>,
    method: Method,
    uri: Uri,
    Form(params): Form<Params>,
) -> Result<Response, TodoWebError> {
    let outcome = state
        .dispatcher
        .dispatch(method.as_str(), uri.path(), &params)
        .await?;

    match outcome {
        DispatchOutcome::Listing(listing) => {
            let template = IndexTemplate::new(listing);
            let rendered = template.render().map_err(TodoWebError::from)?;
            Ok(Html(rendered).into_response())
        }
        DispatchOutcome::Changed(changed) => {
            tracing::debug!(changed, "mutation applied, redirecting to listing");
            Ok(Redirect::to("/").into_response())
        }
        DispatchOutcome::NoSuchTodo(id) => {
            tracing::warn!(id, "request referenced an unknown todo");
            Ok(Redirect::to("/").into_response())
        }
        DispatchOutcome::Unmatched => {
            Ok((StatusCode::NOT_FOUND, "Error 404: resource not found").into_response())
        }
    }
}
