//! Session repository
//!
//! Persists login sessions keyed by their cookie token.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a freshly started session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Look up a session by its token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Remove a single session (logout)
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every session of a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Remove sessions past their expiry, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }

    /// Run a single-statement write with one bound string/int key
    async fn execute_keyed<K>(&self, sql: &str, key: K, what: &'static str) -> Result<u64>
    where
        K: for<'q> sqlx::Encode<'q, sqlx::Sqlite>
            + sqlx::Type<sqlx::Sqlite>
            + for<'q> sqlx::Encode<'q, sqlx::MySql>
            + sqlx::Type<sqlx::MySql>
            + Send
            + 'static,
    {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(key)
                .execute(self.pool.sqlite()?)
                .await
                .context(what)?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(key)
                .execute(self.pool.mysql()?)
                .await
                .context(what)?
                .rows_affected(),
        };
        Ok(affected)
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.sqlite()?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(self.pool.mysql()?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_session_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.execute_keyed(
            "DELETE FROM sessions WHERE id = ?",
            id.to_string(),
            "Failed to delete session",
        )
        .await?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        self.execute_keyed(
            "DELETE FROM sessions WHERE user_id = ?",
            user_id,
            "Failed to delete sessions by user",
        )
        .await?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        self.execute_keyed(
            "DELETE FROM sessions WHERE expires_at < ?",
            Utc::now(),
            "Failed to delete expired sessions",
        )
        .await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use chrono::Duration;

    async fn setup() -> (SqlxSessionRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let alice = users
            .create(&User::new("alice".to_string(), "hash".to_string()))
            .await
            .unwrap();
        let bob = users
            .create(&User::new("bob".to_string(), "hash".to_string()))
            .await
            .unwrap();

        (SqlxSessionRepository::new(pool), alice.id, bob.id)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (repo, alice, _) = setup().await;
        let session = Session::start(alice, Duration::days(14));

        repo.create(&session).await.unwrap();

        let found = repo.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, alice);
        assert!(!found.is_expired());
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (repo, alice, _) = setup().await;
        let session = Session::start(alice, Duration::days(1));
        repo.create(&session).await.unwrap();

        repo.delete(&session.id).await.unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let (repo, alice, bob) = setup().await;
        let a1 = Session::start(alice, Duration::days(1));
        let a2 = Session::start(alice, Duration::days(1));
        let b1 = Session::start(bob, Duration::days(1));
        for s in [&a1, &a2, &b1] {
            repo.create(s).await.unwrap();
        }

        repo.delete_by_user(alice).await.unwrap();

        assert!(repo.get_by_id(&a1.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&a2.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&b1.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (repo, alice, _) = setup().await;
        let expired = Session::start(alice, Duration::days(-1));
        let live = Session::start(alice, Duration::days(7));
        repo.create(&expired).await.unwrap();
        repo.create(&live).await.unwrap();

        let deleted = repo.delete_expired().await.unwrap();

        assert_eq!(deleted, 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&live.id).await.unwrap().is_some());
    }
}
