use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, create_book, delete_book, get_book, list_books, loan_book, return_book,
};

/// Creates the API router with all lending endpoints
///
/// Query endpoints (Read operations):
/// - GET /books/all - List every book
/// - GET /books/:key - Look a book up by id or isbn (selector in `podle`)
///
/// Command endpoints (Write operations):
/// - POST /books/create - Register a book (privileged)
/// - POST /books/delete - Remove a book
/// - POST /books/loan - Borrow a copy (privileged)
/// - POST /books/return - Return a copy
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Query endpoints
        .route("/books/all", get(list_books))
        .route("/books/:key", get(get_book))
        // Command endpoints
        .route("/books/create", post(create_book))
        .route("/books/delete", post(delete_book))
        .route("/books/loan", post(loan_book))
        .route("/books/return", post(return_book))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
