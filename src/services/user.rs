//! User service
//!
//! Registration, login/logout and session validation.
//!
//! Registration applies the usual account-form rules: a username of at most
//! 150 characters drawn from letters, digits and `@.+-_`, two matching
//! passwords, and a password that is at least 8 characters, not entirely
//! numeric, not a near-copy of the username and not a well-known password.

use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Default session lifetime in days
pub const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 14;

pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "football", "football1",
    "baseball", "welcome1", "letmein1", "trustno1", "superman", "princess",
    "abc12345", "admin123", "passw0rd", "starwars", "whatever", "dragon123",
];

const INVALID_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

fn username_taken() -> UserServiceError {
    UserServiceError::UserExists("A user with that username already exists.".to_string())
}

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Wrong username or password
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Too many recent failures for this username
    #[error("Too many failed login attempts, try again later")]
    RateLimited,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
    rate_limiter: LoginRateLimiter,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a user service whose sessions last `session_expiration_days`
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(session_expiration_days),
            rate_limiter: LoginRateLimiter::new(),
        }
    }

    pub fn rate_limiter(&self) -> &LoginRateLimiter {
        &self.rate_limiter
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// - `ValidationError` with the first failed rule
    /// - `UserExists` if the username is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        validate_registration(&username, &input.password1, &input.password2)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(username_taken());
        }

        let password_hash = hash_password(&input.password1).context("Failed to hash password")?;
        // A concurrent registration can still win the insert after the lookup above
        let created = match self.user_repo.create(&User::new(username, password_hash)).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Err(username_taken()),
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Check credentials and start a session.
    ///
    /// Returns the session together with the user as it was before this
    /// login, so `last_login` still holds the previous visit.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let username = input.username.trim();

        if self.rate_limiter.is_limited(username).await {
            tracing::warn!(username = %username, "Login refused by rate limiter");
            return Err(UserServiceError::RateLimited);
        }

        let user = match self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failure(username).await;
                return Err(UserServiceError::AuthenticationError(
                    INVALID_CREDENTIALS.to_string(),
                ));
            }
        };

        if !verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?
        {
            self.rate_limiter.record_failure(username).await;
            return Err(UserServiceError::AuthenticationError(
                INVALID_CREDENTIALS.to_string(),
            ));
        }

        self.rate_limiter.clear(username).await;

        let session = Session::start(user.id, self.session_lifetime);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        self.user_repo
            .touch_last_login(user.id, Utc::now())
            .await
            .context("Failed to record login time")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok((session, user))
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; expired ones are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Delete sessions past their expiry; returns the number removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }
}

/// Apply the account-form rules, reporting the first one that fails
pub fn validate_registration(
    username: &str,
    password1: &str,
    password2: &str,
) -> Result<(), UserServiceError> {
    let invalid = |msg: &str| Err(UserServiceError::ValidationError(msg.to_string()));

    if username.is_empty() {
        return invalid("This field is required.");
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return invalid("Ensure this value has at most 150 characters.");
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || "@.+-".contains(c))
    {
        return invalid(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    if password1.is_empty() || password2.is_empty() {
        return invalid("This field is required.");
    }
    if password1 != password2 {
        return invalid("The two password fields didn't match.");
    }
    if is_similar_to_username(password1, username) {
        return invalid("The password is too similar to the username.");
    }
    if password1.chars().count() < MIN_PASSWORD_LENGTH {
        return invalid("This password is too short. It must contain at least 8 characters.");
    }
    if COMMON_PASSWORDS.contains(&password1.to_lowercase().as_str()) {
        return invalid("This password is too common.");
    }
    if password1.chars().all(|c| c.is_ascii_digit()) {
        return invalid("This password is entirely numeric.");
    }

    Ok(())
}

fn is_similar_to_username(password: &str, username: &str) -> bool {
    let password = password.to_lowercase();
    let username = username.to_lowercase();
    if username.chars().count() < 3 {
        return password == username;
    }
    password.contains(&username) || username.contains(&password)
}

/// Registration form
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        password1: impl Into<String>,
        password2: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password1: password1.into(),
            password2: password2.into(),
        }
    }
}

/// Login form
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}
