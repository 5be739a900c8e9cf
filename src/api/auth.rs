//! Authentication pages
//!
//! - GET/POST /login/    - login form, sets the session and last-login cookies
//! - GET/POST /register/ - account creation, then back to the login page
//! - GET/POST /logout/   - ends the session

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{
    clear_cookie, cookie_value, flash_cookie, safe_next, set_cookie, AppState, LAST_LOGIN_COOKIE,
    SESSION_COOKIE,
};
use crate::api::responses::PageError;
use crate::services::{LoginInput, RegisterInput, UserServiceError};
use crate::templates::PageVars;

/// Format of the `last_login` cookie
const LAST_LOGIN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", get(login_form).post(login))
        .route("/register/", get(register_form).post(register))
        .route("/logout/", get(logout).post(logout))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

/// GET /login/
async fn login_form(
    State(state): State<AppState>,
    vars: PageVars,
    Query(query): Query<LoginQuery>,
) -> Result<Response, PageError> {
    render_login(&state, &vars, "", query.next.as_deref(), &[])
}

/// POST /login/
async fn login(
    State(state): State<AppState>,
    vars: PageVars,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let input = LoginInput::new(form.username.clone(), form.password);

    let (session, _user) = match state.user_service.login(input).await {
        Ok(result) => result,
        Err(UserServiceError::AuthenticationError(msg)) => {
            return render_login(&state, &vars, &form.username, form.next.as_deref(), &[msg]);
        }
        Err(UserServiceError::RateLimited) => {
            let msg = UserServiceError::RateLimited.to_string();
            return render_login(&state, &vars, &form.username, form.next.as_deref(), &[msg]);
        }
        Err(e) => return Err(e.into()),
    };

    let last_login = Utc::now().format(LAST_LOGIN_FORMAT).to_string();
    let target = safe_next(form.next.as_deref()).to_string();

    Ok((
        AppendHeaders([
            (
                header::SET_COOKIE,
                set_cookie(SESSION_COOKIE, &session.id, state.session_max_age, true, state.secure_cookies),
            ),
            (
                header::SET_COOKIE,
                set_cookie(LAST_LOGIN_COOKIE, &last_login, state.session_max_age, true, state.secure_cookies),
            ),
        ]),
        Redirect::to(&target),
    )
        .into_response())
}

fn render_login(
    state: &AppState,
    vars: &PageVars,
    username: &str,
    next: Option<&str>,
    errors: &[String],
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("next", next.unwrap_or(""));
    context.insert("errors", errors);
    Ok(state.render("login.html", &context, vars)?.into_response())
}

/// GET /register/
async fn register_form(State(state): State<AppState>, vars: PageVars) -> Result<Response, PageError> {
    render_register(&state, &vars, "", &[])
}

/// POST /register/
async fn register(
    State(state): State<AppState>,
    vars: PageVars,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    let input = RegisterInput::new(form.username.clone(), form.password1, form.password2);

    match state.user_service.register(input).await {
        Ok(_) => Ok((
            AppendHeaders([(
                header::SET_COOKIE,
                flash_cookie("Your account has been successfully created!"),
            )]),
            Redirect::to("/login/"),
        )
            .into_response()),
        Err(UserServiceError::ValidationError(msg)) | Err(UserServiceError::UserExists(msg)) => {
            render_register(&state, &vars, &form.username, &[msg])
        }
        Err(e) => Err(e.into()),
    }
}

fn render_register(
    state: &AppState,
    vars: &PageVars,
    username: &str,
    errors: &[String],
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("errors", errors);
    Ok(state.render("register.html", &context, vars)?.into_response())
}

/// GET or POST /logout/
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, PageError> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        state.user_service.logout(&token).await?;
        tracing::info!("User logged out");
    }

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, clear_cookie(SESSION_COOKIE)),
            (header::SET_COOKIE, clear_cookie(LAST_LOGIN_COOKIE)),
        ]),
        Redirect::to("/login/"),
    )
        .into_response())
}
