use std::sync::Arc;

use async_trait::async_trait;
use shelfmark_core::{Author, Book, BookDraft, BookPage, BookQuery, BookUpdate, Genre};
use tracing::{debug, info};

use super::CatalogService;
use crate::error::Result;
use crate::http::ApiClient;

/// `CatalogService` backed by the `/books`, `/genres` and `/authors` endpoints.
#[derive(Debug, Clone)]
pub struct BookService {
    api: Arc<ApiClient>,
}

impl BookService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CatalogService for BookService {
    async fn fetch_page(&self, query: &BookQuery) -> Result<BookPage> {
        let page: BookPage = self.api.get_json_with_query(&["books"], query).await?;
        debug!(
            page = page.page,
            total = page.total,
            items = page.items.len(),
            "fetched book page"
        );
        Ok(page)
    }

    async fn get_book(&self, id: &str) -> Result<Book> {
        self.api.get_json(&["books", id]).await
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
        let mut draft = draft.clone();
        draft.validate()?;
        let book: Book = self.api.post_json(&["books"], &draft).await?;
        info!(id = %book.id, title = %book.title, "created book");
        Ok(book)
    }

    async fn update_book(&self, update: &BookUpdate) -> Result<Book> {
        let book: Book = self.api.put_json(&["books"], update).await?;
        info!(id = %book.id, "updated book");
        Ok(book)
    }

    async fn delete_book(&self, id: &str) -> Result<()> {
        self.api.delete(&["books", id]).await?;
        info!(id, "deleted book");
        Ok(())
    }

    async fn list_genres(&self) -> Result<Vec<Genre>> {
        self.api.get_json(&["genres"]).await
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        self.api.get_json(&["authors"]).await
    }
}
