//! HTTP layer - handlers and routing
//!
//! Server-rendered pages for news, the item catalogue and authentication,
//! plus read-only JSON endpoints. Routes marked "login required" redirect
//! anonymous visitors to `/login/?next=<path>`.

pub mod auth;
pub mod items;
pub mod middleware;
pub mod news;
pub mod responses;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use middleware::{AppState, AuthenticatedUser, MaybeUser};
pub use responses::{ApiError, Page, PageError, RenderedTemplate};

/// Routes that need a logged-in user
fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/news/{id}/", get(news::detail))
        .route("/create-news/", get(news::create_form).post(news::create))
        .route("/news/{id}/edit/", get(news::edit_form).post(news::edit))
        .route("/news/{id}/delete/", post(news::delete))
        .route("/items/create/", get(items::create_form).post(items::create))
        .route("/items/{id}/increment-stock/", post(items::increment_stock))
        .route("/items/{id}/delete/", post(items::delete))
        .route_layer(axum_middleware::from_fn(middleware::require_login))
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(news::index))
        .route("/items/", get(items::index))
        .route("/json/", get(news::list_json))
        .route("/json/{id}/", get(news::detail_json))
        .route("/items/json/", get(items::list_json))
        .route("/items/json/{id}/", get(items::detail_json))
        .merge(auth::router())
}

async fn not_found() -> PageError {
    PageError::NotFound
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(public_router())
        .merge(protected_router())
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        // Runs before the error pages so they can show the logged-in user
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
