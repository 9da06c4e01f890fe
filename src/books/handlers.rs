use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use tracing::instrument;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    books::{
        dto::{BookListResponse, CreateBookRequest, ListQuery, UpdateStatusRequest},
        repo_types::{Book, BookId},
        services,
    },
    error::{json_body, AppError, AppResult},
    state::AppState,
};

fn book_id(path: Result<Path<BookId>, PathRejection>) -> AppResult<BookId> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::validation("invalid book id"))
}

#[instrument(skip(state, query))]
pub async fn list_books(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<BookListResponse>> {
    let Query(q) = query.map_err(|e| AppError::validation(e.body_text()))?;
    let books = services::list_books(&state, user_id, q.status.as_deref()).await?;
    Ok(Json(BookListResponse {
        count: books.len(),
        books,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> AppResult<(StatusCode, HeaderMap, Json<Book>)> {
    let req = json_body(payload)?;
    let book = services::create_book(
        &state,
        user_id,
        &req.title,
        req.author.as_deref(),
        &req.status,
    )
    .await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/books/{}", book.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(book)))
}

#[instrument(skip(state, path, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<BookId>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> AppResult<Json<Book>> {
    let id = book_id(path)?;
    let req = json_body(payload)?;
    let book = services::update_status(&state, id, user_id, &req.status).await?;
    Ok(Json(book))
}

#[instrument(skip(state, path))]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<BookId>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let id = book_id(path)?;
    services::delete_book(&state, id, user_id).await?;
    Ok(Json(MessageResponse {
        message: "book deleted",
    }))
}
