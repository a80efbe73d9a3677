pub mod book;
pub mod dashboard;
pub mod user;

pub use book::*;
pub use dashboard::*;
pub use user::*;
