pub mod config;
pub mod error;
pub mod isbn;
pub mod models;
pub mod query;
pub mod session;

pub use config::AppConfig;
pub use error::{ExitCode, Result, ShelfmarkError};
pub use isbn::Isbn;
pub use models::*;
pub use query::{
    Availability, BookPage, BookQuery, FilterSet, Identified, PageWindow, ResultPage, SortColumn,
    SortDirection, SortSpec, VISIBLE_PAGES, page_numbers,
};
pub use session::{Session, SessionStore};
