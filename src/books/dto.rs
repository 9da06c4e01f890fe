use serde::{Deserialize, Serialize};

use crate::books::repo_types::Book;

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    #[serde(default)]
    pub title: String,
    pub author: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookListResponse {
    pub books: Vec<Book>,
    pub count: usize,
}
