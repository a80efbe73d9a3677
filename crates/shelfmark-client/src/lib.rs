//! Shelfmark client: authenticated HTTP access to the library API.

pub mod error;
pub mod http;
pub mod services;

pub use error::{ClientError, Result};
pub use http::ApiClient;
pub use services::{AuthService, BookService, CatalogService, DashboardService};
