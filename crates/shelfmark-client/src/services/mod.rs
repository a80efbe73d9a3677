use async_trait::async_trait;
use shelfmark_core::{Author, Book, BookDraft, BookPage, BookQuery, BookUpdate, Genre};

use crate::error::Result;

pub mod auth;
pub mod books;
pub mod dashboard;

pub use auth::AuthService;
pub use books::BookService;
pub use dashboard::DashboardService;

/// The remote book collection as seen by list views.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// One page of books matching `query`.
    async fn fetch_page(&self, query: &BookQuery) -> Result<BookPage>;

    async fn get_book(&self, id: &str) -> Result<Book>;

    /// Returns the created book with genre and author resolved.
    async fn create_book(&self, draft: &BookDraft) -> Result<Book>;

    async fn update_book(&self, update: &BookUpdate) -> Result<Book>;

    async fn delete_book(&self, id: &str) -> Result<()>;

    async fn list_genres(&self) -> Result<Vec<Genre>>;

    async fn list_authors(&self) -> Result<Vec<Author>>;
}
