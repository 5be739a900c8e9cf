//! User repository
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Record a successful login
    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Delete a user (their sessions and news go with them)
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_username_sqlite(self.pool.sqlite()?, username).await
            }
            DatabaseDriver::Mysql => get_user_by_username_mysql(self.pool.mysql()?, username).await,
        }
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE users SET last_login = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update last login")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update last login")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM users WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete user")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM users";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count users")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count users")?
                .get("count"),
        };
        Ok(count)
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, created_at, last_login";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        username: user.username.clone(),
        password_hash: user.password_hash.clone(),
        created_at: now,
        last_login: None,
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.map(|row| row_to_user_sqlite(&row)))
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    Ok(row.map(|row| row_to_user_sqlite(&row)))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        username: user.username.clone(),
        password_hash: user.password_hash.clone(),
        created_at: now,
        last_login: None,
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.map(|row| row_to_user_mysql(&row)))
}

async fn get_user_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    Ok(row.map(|row| row_to_user_mysql(&row)))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};
    use crate::services::password::hash_password;

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn create_test_user(username: &str) -> User {
        User::new(
            username.to_string(),
            hash_password("test_password").expect("Failed to hash password"),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo.create(&create_test_user("testuser")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.username, "testuser");
        assert!(found.last_login.is_none());
        assert!(found.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&create_test_user("testuser")).await.unwrap();

        let err = repo.create(&create_test_user("testuser")).await.unwrap_err();

        assert!(is_unique_violation(&err), "unexpected error: {:#}", err);
        assert!(!is_unique_violation(&anyhow::anyhow!("Failed to create user")));
    }

    #[tokio::test]
    async fn test_get_user_by_username() {
        let repo = setup_test_repo().await;
        repo.create(&create_test_user("findme")).await.unwrap();

        assert!(repo.get_by_username("findme").await.unwrap().is_some());
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username_constraint() {
        let repo = setup_test_repo().await;
        repo.create(&create_test_user("duplicate")).await.unwrap();

        let result = repo.create(&create_test_user("duplicate")).await;

        assert!(result.is_err(), "Should fail due to duplicate username");
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let repo = setup_test_repo().await;
        let created = repo.create(&create_test_user("returning")).await.unwrap();
        let at = Utc::now();

        repo.touch_last_login(created.id, at).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        let last_login = found.last_login.expect("last_login should be set");
        assert!((last_login - at).num_seconds().abs() < 1);
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.count().await.unwrap(), 0);

        let a = repo.create(&create_test_user("user1")).await.unwrap();
        repo.create(&create_test_user("user2")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        repo.delete(a.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get_by_id(a.id).await.unwrap().is_none());
    }
}
