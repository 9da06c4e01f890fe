use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    auth::repo_types::UserId,
    books::repo_types::{Book, BookId, BookRow, BookStatus, NewBook, Progress},
    error::{AppError, AppResult},
};

pub(crate) const BOOK_NOT_FOUND: &str = "book not found";

/// Book persistence. Every owner-scoped call matches on id, owner and
/// liveness in the same predicate, so another user's book is
/// indistinguishable from a missing one.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn insert(&self, book: NewBook) -> AppResult<Book>;

    /// Live books of `owner`, newest first.
    async fn list_by_owner(&self, owner: UserId, status: Option<BookStatus>)
        -> AppResult<Vec<Book>>;

    async fn get_by_id(&self, id: BookId, owner: UserId) -> AppResult<Book>;

    /// Persists a transition. Markers already stored win over `progress`.
    async fn save_progress(&self, id: BookId, owner: UserId, progress: Progress)
        -> AppResult<Book>;

    async fn soft_delete(&self, id: BookId, owner: UserId) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgBookStore {
    pool: PgPool,
}

impl PgBookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOK_COLUMNS: &str = "id, user_id, title, author, status, date_added, date_started, \
                            date_finished, created_at, updated_at";

#[async_trait]
impl BookStore for PgBookStore {
    async fn insert(&self, book: NewBook) -> AppResult<Book> {
        let sql = format!(
            r#"
            INSERT INTO books (user_id, title, author, status, date_added, date_started,
                               date_finished, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $5, $5)
            RETURNING {BOOK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.progress.status.as_str())
            .bind(book.date_added)
            .bind(book.progress.date_started)
            .bind(book.progress.date_finished)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn list_by_owner(
        &self,
        owner: UserId,
        status: Option<BookStatus>,
    ) -> AppResult<Vec<Book>> {
        let sql = format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .bind(owner)
            .bind(status.map(BookStatus::as_str))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Book::try_from).collect()
    }

    async fn get_by_id(&self, id: BookId, owner: UserId) -> AppResult<Book> {
        let sql = format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#
        );
        sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(BOOK_NOT_FOUND))?
            .try_into()
    }

    async fn save_progress(
        &self,
        id: BookId,
        owner: UserId,
        progress: Progress,
    ) -> AppResult<Book> {
        // COALESCE keeps a marker written by a concurrent update.
        let sql = format!(
            r#"
            UPDATE books
               SET status = $3,
                   date_started = COALESCE(date_started, $4),
                   date_finished = COALESCE(date_finished, $5),
                   updated_at = now()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING {BOOK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .bind(owner)
            .bind(progress.status.as_str())
            .bind(progress.date_started)
            .bind(progress.date_finished)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(BOOK_NOT_FOUND))?
            .try_into()
    }

    async fn soft_delete(&self, id: BookId, owner: UserId) -> AppResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE books
               SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(BOOK_NOT_FOUND));
        }
        Ok(())
    }
}

#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::repo::{PgUserStore, UserStore};
    use time::{Duration, OffsetDateTime};

    async fn owners(pool: &PgPool) -> (UserId, UserId) {
        let users = PgUserStore::new(pool.clone());
        let a = users.create_user("alice", "x").await.unwrap().id;
        let b = users.create_user("bob", "x").await.unwrap().id;
        (a, b)
    }

    fn new_book(owner: UserId, title: &str, status: BookStatus, at: OffsetDateTime) -> NewBook {
        NewBook {
            user_id: owner,
            title: title.into(),
            author: None,
            progress: Progress::initial(status, at),
            date_added: at,
        }
    }

    fn now_micros() -> OffsetDateTime {
        // TIMESTAMPTZ stores microseconds
        let now = OffsetDateTime::now_utc();
        now.replace_nanosecond(now.microsecond() * 1_000).unwrap()
    }

    // Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn other_owner_sees_nothing(pool: PgPool) {
        let (alice, bob) = owners(&pool).await;
        let store = PgBookStore::new(pool);
        let book = store
            .insert(new_book(alice, "Dune", BookStatus::ToRead, now_micros()))
            .await
            .unwrap();

        assert!(matches!(store.get_by_id(book.id, bob).await, Err(AppError::NotFound(_))));
        let progress = book.progress().transition(BookStatus::Read, now_micros());
        assert!(matches!(
            store.save_progress(book.id, bob, progress).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(store.soft_delete(book.id, bob).await, Err(AppError::NotFound(_))));

        let still = store.get_by_id(book.id, alice).await.unwrap();
        assert_eq!(still.status, BookStatus::ToRead);
        assert_eq!(still.date_started, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn soft_deleted_rows_are_hidden(pool: PgPool) {
        let (alice, _) = owners(&pool).await;
        let store = PgBookStore::new(pool.clone());
        let book = store
            .insert(new_book(alice, "Dune", BookStatus::Reading, now_micros()))
            .await
            .unwrap();

        store.soft_delete(book.id, alice).await.unwrap();
        assert!(store.list_by_owner(alice, None).await.unwrap().is_empty());
        assert!(matches!(store.get_by_id(book.id, alice).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.soft_delete(book.id, alice).await, Err(AppError::NotFound(_))));
        let progress = book.progress().transition(BookStatus::Read, now_micros());
        assert!(matches!(
            store.save_progress(book.id, alice, progress).await,
            Err(AppError::NotFound(_))
        ));

        let (rows,): (i64,) = sqlx::query_as("SELECT count(*) FROM books WHERE deleted_at IS NOT NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn stored_markers_survive_status_changes(pool: PgPool) {
        let (alice, _) = owners(&pool).await;
        let store = PgBookStore::new(pool);
        let t0 = now_micros();
        let book = store
            .insert(new_book(alice, "Dune", BookStatus::Reading, t0))
            .await
            .unwrap();
        assert_eq!(book.date_started, Some(t0));

        let t1 = t0 + Duration::hours(1);
        let read = store
            .save_progress(book.id, alice, book.progress().transition(BookStatus::Read, t1))
            .await
            .unwrap();
        assert_eq!((read.date_started, read.date_finished), (Some(t0), Some(t1)));

        let back = store
            .save_progress(book.id, alice, read.progress().transition(BookStatus::ToRead, t1))
            .await
            .unwrap();
        assert_eq!(back.status, BookStatus::ToRead);
        assert_eq!((back.date_started, back.date_finished), (Some(t0), Some(t1)));

        // a stale writer that never saw the markers must not move them
        let t2 = t0 + Duration::hours(2);
        let stale = Progress::initial(BookStatus::ToRead, t0).transition(BookStatus::Read, t2);
        let again = store.save_progress(book.id, alice, stale).await.unwrap();
        assert_eq!(again.status, BookStatus::Read);
        assert_eq!((again.date_started, again.date_finished), (Some(t0), Some(t1)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn list_filters_by_status_newest_first(pool: PgPool) {
        let (alice, bob) = owners(&pool).await;
        let store = PgBookStore::new(pool);
        let t0 = now_micros();
        let a = store.insert(new_book(alice, "A", BookStatus::ToRead, t0)).await.unwrap();
        let b = store
            .insert(new_book(alice, "B", BookStatus::Read, t0 + Duration::minutes(1)))
            .await
            .unwrap();
        let c = store
            .insert(new_book(alice, "C", BookStatus::ToRead, t0 + Duration::minutes(2)))
            .await
            .unwrap();
        // same instant as `c`: id breaks the tie
        let d = store
            .insert(new_book(alice, "D", BookStatus::ToRead, t0 + Duration::minutes(2)))
            .await
            .unwrap();
        store.insert(new_book(bob, "E", BookStatus::ToRead, t0)).await.unwrap();

        let ids = |books: Vec<Book>| books.into_iter().map(|b| b.id).collect::<Vec<_>>();
        assert_eq!(
            ids(store.list_by_owner(alice, None).await.unwrap()),
            vec![d.id, c.id, b.id, a.id]
        );
        assert_eq!(
            ids(store.list_by_owner(alice, Some(BookStatus::ToRead)).await.unwrap()),
            vec![d.id, c.id, a.id]
        );
        assert_eq!(
            ids(store.list_by_owner(alice, Some(BookStatus::Read)).await.unwrap()),
            vec![b.id]
        );
        assert!(store
            .list_by_owner(alice, Some(BookStatus::Reading))
            .await
            .unwrap()
            .is_empty());
    }
}
