use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::repo_types::UserId,
    books::repo_types::{Book, BookId, BookStatus, NewBook, Progress},
    error::{with_deadline, AppError, AppResult},
    state::AppState,
};

pub async fn create_book(
    state: &AppState,
    owner: UserId,
    title: &str,
    author: Option<&str>,
    status: &str,
) -> AppResult<Book> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    let status: BookStatus = status.parse()?;
    let author = author.map(str::trim).filter(|a| !a.is_empty());
    if title.contains('\0') || author.is_some_and(|a| a.contains('\0')) {
        return Err(AppError::validation("title and author must not contain NUL characters"));
    }

    let now = OffsetDateTime::now_utc();
    let new = NewBook {
        user_id: owner,
        title: title.to_string(),
        author: author.map(String::from),
        progress: Progress::initial(status, now),
        date_added: now,
    };
    let book = with_deadline(state.config.store_timeout, state.books.insert(new)).await?;
    info!(book_id = %book.id, user_id = %owner, status = %book.status, "book created");
    Ok(book)
}

pub async fn list_books(
    state: &AppState,
    owner: UserId,
    status: Option<&str>,
) -> AppResult<Vec<Book>> {
    let status = status
        .filter(|s| !s.is_empty())
        .map(str::parse::<BookStatus>)
        .transpose()?;
    with_deadline(
        state.config.store_timeout,
        state.books.list_by_owner(owner, status),
    )
    .await
}

pub async fn get_book(state: &AppState, id: BookId, owner: UserId) -> AppResult<Book> {
    with_deadline(state.config.store_timeout, state.books.get_by_id(id, owner)).await
}

pub async fn update_status(
    state: &AppState,
    id: BookId,
    owner: UserId,
    status: &str,
) -> AppResult<Book> {
    let status: BookStatus = status.parse()?;
    let current = get_book(state, id, owner).await?;
    let next = current
        .progress()
        .transition(status, OffsetDateTime::now_utc());

    let book = with_deadline(
        state.config.store_timeout,
        state.books.save_progress(id, owner, next),
    )
    .await?;
    info!(book_id = %id, user_id = %owner, from = %current.status, to = %status, "book status updated");
    Ok(book)
}

pub async fn delete_book(state: &AppState, id: BookId, owner: UserId) -> AppResult<()> {
    with_deadline(state.config.store_timeout, state.books.soft_delete(id, owner))
        .await
        .map_err(|e| {
            if matches!(e, AppError::NotFound(_)) {
                warn!(book_id = %id, user_id = %owner, "delete of unknown book");
            }
            e
        })?;
    info!(book_id = %id, user_id = %owner, "book deleted");
    Ok(())
}
