use std::{fmt, str::FromStr};

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{auth::repo_types::UserId, error::AppError};

pub type BookId = i64;

/// Reading status label. Progress markers live on [`Book`] independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookStatus {
    ToRead,
    Reading,
    Read,
}

impl BookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::ToRead => "to-read",
            BookStatus::Reading => "reading",
            BookStatus::Read => "read",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to-read" => Ok(BookStatus::ToRead),
            "reading" => Ok(BookStatus::Reading),
            "read" => Ok(BookStatus::Read),
            _ => Err(AppError::validation(
                "status must be 'to-read', 'reading', or 'read'",
            )),
        }
    }
}

/// Status plus the two progress markers. Markers only ever go from absent to
/// present; once set they are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub status: BookStatus,
    pub date_started: Option<OffsetDateTime>,
    pub date_finished: Option<OffsetDateTime>,
}

impl Progress {
    /// Markers for a book that starts life in `status`.
    pub fn initial(status: BookStatus, now: OffsetDateTime) -> Self {
        Progress {
            status: BookStatus::ToRead,
            date_started: None,
            date_finished: None,
        }
        .transition(status, now)
    }

    /// Any status may follow any other. `to-read` never rolls markers back.
    pub fn transition(self, to: BookStatus, now: OffsetDateTime) -> Self {
        let mut next = Progress { status: to, ..self };
        match to {
            BookStatus::ToRead => {}
            BookStatus::Reading => {
                next.date_started.get_or_insert(now);
            }
            BookStatus::Read => {
                next.date_started.get_or_insert(now);
                next.date_finished.get_or_insert(now);
            }
        }
        next
    }
}

/// Raw row as stored; `status` is TEXT constrained by a CHECK.
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub id: BookId,
    pub user_id: UserId,
    pub title: String,
    pub author: Option<String>,
    pub status: String,
    pub date_added: OffsetDateTime,
    pub date_started: Option<OffsetDateTime>,
    pub date_finished: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    pub user_id: UserId,
    pub title: String,
    pub author: Option<String>,
    pub status: BookStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_started: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_finished: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Book {
    pub fn progress(&self) -> Progress {
        Progress {
            status: self.status,
            date_started: self.date_started,
            date_finished: self.date_finished,
        }
    }
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(r: BookRow) -> Result<Self, Self::Error> {
        let status = r.status.parse::<BookStatus>().map_err(|_| {
            AppError::Internal(anyhow::anyhow!(
                "book {} has unknown status {:?}",
                r.id,
                r.status
            ))
        })?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            author: r.author,
            status,
            date_added: r.date_added,
            date_started: r.date_started,
            date_finished: r.date_finished,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated input for a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub user_id: UserId,
    pub title: String,
    pub author: Option<String>,
    pub progress: Progress,
    pub date_added: OffsetDateTime,
}
