//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity on both backends.

pub mod item;
pub mod news;
pub mod session;
pub mod user;

pub use item::{ItemRepository, SqlxItemRepository};
pub use news::{NewsRepository, SqlxNewsRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
