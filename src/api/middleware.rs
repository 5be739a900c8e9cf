//! HTTP middleware and request plumbing
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - Session cookie authentication (`optional_auth`, `require_login`)
//! - Error page rendering for handlers that fail with `PageError`
//! - Cookie helpers for the session, last-login and flash cookies

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::api::responses::{ErrorPage, Page, PageError};
use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxItemRepository, SqlxNewsRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{ItemService, NewsService, UserService};
use crate::templates::{PageVars, TemplateEngine};

pub const SESSION_COOKIE: &str = "session";
pub const LAST_LOGIN_COOKIE: &str = "last_login";
pub const FLASH_COOKIE: &str = "flash";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub news_service: Arc<NewsService>,
    pub item_service: Arc<ItemService>,
    pub templates: Arc<TemplateEngine>,
    pub site_name: Arc<str>,
    /// Session cookie lifetime in seconds
    pub session_max_age: i64,
    pub secure_cookies: bool,
}

impl AppState {
    /// Wire repositories, services, cache and templates from configuration
    pub fn from_config(config: &Config, pool: DynDatabasePool) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);

        let user_service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.session.expiration_days,
        );
        let news_service = NewsService::new(SqlxNewsRepository::boxed(pool.clone()));
        let item_service = ItemService::new(SqlxItemRepository::boxed(pool), cache);
        let templates = TemplateEngine::new(config.templates.path.as_deref())?;

        Ok(Self {
            user_service: Arc::new(user_service),
            news_service: Arc::new(news_service),
            item_service: Arc::new(item_service),
            templates: Arc::new(templates),
            site_name: Arc::from(config.site.name.as_str()),
            session_max_age: config.session.expiration_days * 24 * 60 * 60,
            secure_cookies: config.session.secure_cookie,
        })
    }

    /// Render a page template with the standard variables
    pub fn render(
        &self,
        template: &'static str,
        context: &TeraContext,
        vars: &PageVars,
    ) -> Result<Page, PageError> {
        let html = self.templates.render_page(template, context, vars)?;
        Ok(Page {
            template,
            html,
            status: axum::http::StatusCode::OK,
            clear_flash: vars.flash.is_some(),
        })
    }

    fn page_vars(&self, uri: &Uri, headers: &HeaderMap, user: Option<&User>) -> PageVars {
        PageVars::new(self.site_name.as_ref(), uri.path())
            .with_user(user)
            .with_last_login(user.and(cookie_value(headers, LAST_LOGIN_COOKIE)))
            .with_flash(cookie_value(headers, FLASH_COOKIE))
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Logged-in user; rejects anonymous requests with a redirect to the login page
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| login_redirect(&parts.uri))
    }
}

/// The logged-in user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|u| u.0.clone()),
        ))
    }
}

impl FromRequestParts<AppState> for PageVars {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<AuthenticatedUser>().map(|u| &u.0);
        Ok(state.page_vars(&parts.uri, &parts.headers, user))
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolve the session cookie, if present, into an `AuthenticatedUser` extension
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = cookie_value(request.headers(), SESSION_COOKIE) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Send anonymous visitors to `/login/?next=<path>`
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return login_redirect(request.uri());
    }
    next.run(request).await
}

/// Replace the plain body of `PageError` responses with a rendered error page
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request.extensions().get::<AuthenticatedUser>().map(|u| u.0.clone());
    let vars = state.page_vars(request.uri(), request.headers(), user.as_ref());

    let response = next.run(request).await;
    let Some(error) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let mut context = TeraContext::new();
    context.insert("status", &error.status.as_u16());
    context.insert("title", error.title);
    context.insert("message", &error.message);
    let template = if error.status == axum::http::StatusCode::NOT_FOUND {
        "404.html"
    } else {
        "error.html"
    };

    match state.render(template, &context, &vars) {
        Ok(page) => page.with_status(error.status).into_response(),
        Err(_) => response,
    }
}

// ============================================================================
// Cookies and redirects
// ============================================================================

/// Read a cookie from the request, percent-decoded
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|value| !value.is_empty())
}

/// Build a `Set-Cookie` value; `max_age` of zero expires the cookie
pub fn set_cookie(name: &str, value: &str, max_age: i64, http_only: bool, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; SameSite=Lax; Max-Age={}",
        name,
        urlencoding::encode(value),
        max_age
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    // Names are constants and the value is percent-encoded, so this cannot fail
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn clear_cookie(name: &str) -> HeaderValue {
    set_cookie(name, "", 0, true, false)
}

/// Flash message shown on the next rendered page
pub fn flash_cookie(message: &str) -> HeaderValue {
    set_cookie(FLASH_COOKIE, message, 60, true, false)
}

/// Redirect to the login page, remembering where the visitor was going
pub fn login_redirect(uri: &Uri) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&format!("/login/?next={}", urlencoding::encode(target))).into_response()
}

/// Only follow same-site relative redirects
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_cookie_value() {
        let h = headers("theme=dark; session=abc-123; last_login=2026-01-02%2010%3A00%3A00");

        assert_eq!(cookie_value(&h, "session").as_deref(), Some("abc-123"));
        assert_eq!(
            cookie_value(&h, "last_login").as_deref(),
            Some("2026-01-02 10:00:00")
        );
        assert_eq!(cookie_value(&h, "missing"), None);
        assert_eq!(cookie_value(&headers("session="), "session"), None);
    }

    #[test]
    fn test_set_cookie_encodes_value() {
        let cookie = set_cookie("flash", "Saved, thanks!", 60, true, true);
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with("flash=Saved%2C%20thanks%21;"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(clear_cookie("session").to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_login_redirect_keeps_target() {
        let response = login_redirect(&"/news/abc/?x=1".parse().unwrap());

        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login/?next=%2Fnews%2Fabc%2F%3Fx%3D1"
        );
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/news/1/")), "/news/1/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
