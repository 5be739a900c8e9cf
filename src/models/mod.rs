//! Data models
//!
//! Database entities (User, Session, News, Item), the enums stored in their
//! category columns, and the input/filter types consumed by the services.

mod item;
mod news;
mod session;
mod user;

pub use item::{CreateItemInput, Item, ItemCategory, UpdateItemInput, HIGH_DEMAND_THRESHOLD, MAX_STOCK};
pub use news::{CreateNewsInput, News, NewsCategory, NewsFilter, UpdateNewsInput, HOT_NEWS_VIEWS, MAX_TITLE_LENGTH};
pub use session::Session;
pub use user::User;
