//! Shared response types
//!
//! HTML handlers return [`Page`] or [`PageError`]; JSON handlers return
//! `Json<_>` or [`ApiError`]. View structs used by several templates live
//! here too.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{Item, News};
use crate::services::{ItemServiceError, NewsServiceError, UserServiceError};

// ============================================================================
// HTML pages
// ============================================================================

/// Response extension naming the template a page was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedTemplate(pub &'static str);

/// A rendered HTML page
#[derive(Debug)]
pub struct Page {
    pub template: &'static str,
    pub html: String,
    pub status: StatusCode,
    /// Expire the flash cookie once its message has been shown
    pub clear_flash: bool,
}

impl Page {
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let mut response = (self.status, Html(self.html)).into_response();
        response.extensions_mut().insert(RenderedTemplate(self.template));
        if self.clear_flash {
            response.headers_mut().append(
                header::SET_COOKIE,
                HeaderValue::from_static("flash=; Path=/; SameSite=Lax; Max-Age=0"),
            );
        }
        response
    }
}

/// Error raised by an HTML handler
///
/// The response carries an [`ErrorPage`] extension; the error page
/// middleware replaces the plain body with `404.html` or `error.html`.
#[derive(Debug)]
pub enum PageError {
    NotFound,
    Forbidden,
    BadRequest(String),
    Internal(String),
}

/// Marker left on error responses for the error page middleware
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub title: &'static str,
    pub message: String,
}

impl PageError {
    pub fn internal(e: impl std::fmt::Display) -> Self {
        tracing::error!("Request failed: {}", e);
        Self::Internal("Something went wrong on our side. Please try again later.".to_string())
    }

    fn error_page(self) -> ErrorPage {
        let (status, title, message) = match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "Page not found",
                "The page you requested does not exist.".to_string(),
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "You do not have permission to do that.".to_string(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "Bad request", message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error", message),
        };
        ErrorPage {
            status,
            title,
            message,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let page = self.error_page();
        let mut response = (page.status, page.message.clone()).into_response();
        response.extensions_mut().insert(page);
        response
    }
}

impl From<NewsServiceError> for PageError {
    fn from(e: NewsServiceError) -> Self {
        match e {
            NewsServiceError::NotFound(_) => Self::NotFound,
            NewsServiceError::Forbidden => Self::Forbidden,
            NewsServiceError::ValidationError(msg) => Self::BadRequest(msg),
            NewsServiceError::InternalError(e) => Self::internal(format!("{:#}", e)),
        }
    }
}

impl From<ItemServiceError> for PageError {
    fn from(e: ItemServiceError) -> Self {
        match e {
            ItemServiceError::NotFound(_) => Self::NotFound,
            ItemServiceError::ValidationError(msg) => Self::BadRequest(msg),
            ItemServiceError::InternalError(e) => Self::internal(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InternalError(e) => Self::internal(format!("{:#}", e)),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<crate::templates::TemplateError> for PageError {
    fn from(e: crate::templates::TemplateError) -> Self {
        Self::internal(e)
    }
}

// ============================================================================
// JSON errors
// ============================================================================

/// Error body for JSON endpoints: `{ "error": { "code", "message" } }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<NewsServiceError> for ApiError {
    fn from(e: NewsServiceError) -> Self {
        match e {
            NewsServiceError::NotFound(id) => Self::not_found(format!("News {} not found", id)),
            NewsServiceError::Forbidden => {
                Self::new("FORBIDDEN", "You do not have permission to modify this news")
            }
            NewsServiceError::ValidationError(msg) => Self::new("VALIDATION_ERROR", msg),
            NewsServiceError::InternalError(e) => {
                tracing::error!("News API request failed: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<ItemServiceError> for ApiError {
    fn from(e: ItemServiceError) -> Self {
        match e {
            ItemServiceError::NotFound(id) => Self::not_found(format!("Item {} not found", id)),
            ItemServiceError::ValidationError(msg) => Self::new("VALIDATION_ERROR", msg),
            ItemServiceError::InternalError(e) => {
                tracing::error!("Item API request failed: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

// ============================================================================
// View types
// ============================================================================

/// `<option>` entry for category selects
#[derive(Debug, Clone, Serialize)]
pub struct CategoryOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Display format for timestamps on pages
pub const DATE_FORMAT: &str = "%d %b %Y, %H:%M";

/// A news article as listed on the home page
#[derive(Debug, Serialize)]
pub struct NewsCard {
    #[serde(flatten)]
    pub news: News,
    pub category_label: &'static str,
    pub excerpt: String,
    pub published: String,
    pub is_hot: bool,
}

/// An item as shown in the shop and returned by the JSON endpoints
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    #[serde(flatten)]
    pub item: Item,
    pub category_label: &'static str,
    pub is_high_demand: bool,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            category_label: item.category.label(),
            is_high_demand: item.is_high_demand(),
            item,
        }
    }
}
