//! Shelfmark view: presentation-independent state for the catalog list,
//! the dashboard and the sign-in forms.

pub mod auth;
pub mod collection;
pub mod dashboard;
pub mod debounce;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{LoginController, SignupController};
pub use collection::{
    CollectionController, CollectionOptions, FetchOutcome, FetchTicket, Selection, SelectionMode,
};
pub use dashboard::DashboardController;
pub use debounce::Debouncer;
