//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They are
//! responsible for:
//! - Implementing business rules and validation
//! - Ownership checks on news
//! - Keeping the item cache coherent with the database

pub mod item;
pub mod markdown;
pub mod news;
pub mod password;
pub mod rate_limiter;
pub mod user;

pub use item::{ItemService, ItemServiceError};
pub use markdown::MarkdownRenderer;
pub use news::{NewsService, NewsServiceError};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
