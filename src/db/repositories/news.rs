//! News repository
//!
//! This module provides:
//! - `NewsRepository` trait defining the interface for news data access
//! - `SqlxNewsRepository` implementing the trait for SQLite and MySQL
//!
//! News ids are UUIDs stored in their hyphenated text form so both backends
//! share one column type. Reads join `users` to carry the author's username.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{News, NewsCategory, NewsFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// News repository trait
#[async_trait]
pub trait NewsRepository: Send + Sync {
    /// Insert an article; the id and timestamp on `news` are kept as given
    async fn create(&self, news: &News) -> Result<News>;

    /// Get an article by id
    async fn get_by_id(&self, id: Uuid) -> Result<Option<News>>;

    /// List articles matching `filter`, newest first; same-instant ties by id
    async fn list(&self, filter: &NewsFilter) -> Result<Vec<News>>;

    /// Overwrite the editable fields of an article
    async fn update(&self, news: &News) -> Result<News>;

    /// Delete an article, returning whether a row was removed
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Atomically add one view, returning whether the article exists
    async fn increment_views(&self, id: Uuid) -> Result<bool>;
}

/// SQLx-based news repository implementation
pub struct SqlxNewsRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsRepository> {
        Arc::new(Self::new(pool))
    }

    async fn execute_by_id(&self, sql: &str, id: Uuid, what: &'static str) -> Result<u64> {
        let id = id.to_string();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&id)
                .execute(self.pool.sqlite()?)
                .await
                .context(what)?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&id)
                .execute(self.pool.mysql()?)
                .await
                .context(what)?
                .rows_affected(),
        };
        Ok(affected)
    }
}

#[async_trait]
impl NewsRepository for SqlxNewsRepository {
    async fn create(&self, news: &News) -> Result<News> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_news_sqlite(self.pool.sqlite()?, news).await?,
            DatabaseDriver::Mysql => create_news_mysql(self.pool.mysql()?, news).await?,
        }
        self.get_by_id(news.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("News not found after insert"))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<News>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_news_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_news_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, filter: &NewsFilter) -> Result<Vec<News>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_news_sqlite(self.pool.sqlite()?, filter).await,
            DatabaseDriver::Mysql => list_news_mysql(self.pool.mysql()?, filter).await,
        }
    }

    async fn update(&self, news: &News) -> Result<News> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_news_sqlite(self.pool.sqlite()?, news).await?,
            DatabaseDriver::Mysql => update_news_mysql(self.pool.mysql()?, news).await?,
        }
        self.get_by_id(news.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("News not found after update"))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .execute_by_id("DELETE FROM news WHERE id = ?", id, "Failed to delete news")
            .await?;
        Ok(affected > 0)
    }

    async fn increment_views(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .execute_by_id(
                "UPDATE news SET news_views = news_views + 1 WHERE id = ?",
                id,
                "Failed to increment news views",
            )
            .await?;
        Ok(affected > 0)
    }
}

const SELECT_NEWS: &str = r#"
    SELECT n.id, n.title, n.content, n.category, n.thumbnail, n.news_views,
           n.is_featured, n.user_id, n.created_at, u.username AS author_username
    FROM news n
    LEFT JOIN users u ON u.id = n.user_id
"#;

/// WHERE clause for a filter. Placeholders are bound in the order
/// owner, category, featured by the driver-specific list functions.
fn filter_clause(filter: &NewsFilter) -> String {
    let mut conditions = Vec::new();
    if filter.owner.is_some() {
        conditions.push("n.user_id = ?");
    }
    if filter.category.is_some() {
        conditions.push("n.category = ?");
    }
    if filter.featured_only {
        conditions.push("n.is_featured = ?");
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn list_sql(filter: &NewsFilter) -> String {
    format!(
        "{} {} ORDER BY n.created_at DESC, n.id DESC",
        SELECT_NEWS,
        filter_clause(filter)
    )
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid news id in database: {}", raw))
}

fn parse_category(raw: &str) -> Result<NewsCategory> {
    NewsCategory::from_str(raw)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_news_sqlite(pool: &SqlitePool, news: &News) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO news (id, title, content, category, thumbnail, news_views, is_featured, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(news.id.to_string())
    .bind(&news.title)
    .bind(&news.content)
    .bind(news.category.as_str())
    .bind(&news.thumbnail)
    .bind(news.news_views)
    .bind(news.is_featured)
    .bind(news.user_id)
    .bind(news.created_at)
    .execute(pool)
    .await
    .context("Failed to create news")?;

    Ok(())
}

async fn get_news_sqlite(pool: &SqlitePool, id: Uuid) -> Result<Option<News>> {
    let sql = format!("{} WHERE n.id = ?", SELECT_NEWS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("Failed to get news by ID")?;

    row.map(|row| row_to_news_sqlite(&row)).transpose()
}

async fn list_news_sqlite(pool: &SqlitePool, filter: &NewsFilter) -> Result<Vec<News>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql);
    if let Some(owner) = filter.owner {
        query = query.bind(owner);
    }
    if let Some(category) = filter.category {
        query = query.bind(category.as_str());
    }
    if filter.featured_only {
        query = query.bind(true);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list news")?;

    rows.iter().map(row_to_news_sqlite).collect()
}

async fn update_news_sqlite(pool: &SqlitePool, news: &News) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE news
        SET title = ?, content = ?, category = ?, thumbnail = ?, is_featured = ?
        WHERE id = ?
        "#,
    )
    .bind(&news.title)
    .bind(&news.content)
    .bind(news.category.as_str())
    .bind(&news.thumbnail)
    .bind(news.is_featured)
    .bind(news.id.to_string())
    .execute(pool)
    .await
    .context("Failed to update news")?;

    Ok(())
}

fn row_to_news_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<News> {
    let id: String = row.get("id");
    let category: String = row.get("category");

    Ok(News {
        id: parse_id(&id)?,
        title: row.get("title"),
        content: row.get("content"),
        category: parse_category(&category)?,
        thumbnail: row.get("thumbnail"),
        news_views: row.get("news_views"),
        is_featured: row.get("is_featured"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        author_username: row.get("author_username"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_news_mysql(pool: &MySqlPool, news: &News) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO news (id, title, content, category, thumbnail, news_views, is_featured, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(news.id.to_string())
    .bind(&news.title)
    .bind(&news.content)
    .bind(news.category.as_str())
    .bind(&news.thumbnail)
    .bind(news.news_views)
    .bind(news.is_featured)
    .bind(news.user_id)
    .bind(news.created_at)
    .execute(pool)
    .await
    .context("Failed to create news")?;

    Ok(())
}

async fn get_news_mysql(pool: &MySqlPool, id: Uuid) -> Result<Option<News>> {
    let sql = format!("{} WHERE n.id = ?", SELECT_NEWS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("Failed to get news by ID")?;

    row.map(|row| row_to_news_mysql(&row)).transpose()
}

async fn list_news_mysql(pool: &MySqlPool, filter: &NewsFilter) -> Result<Vec<News>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql);
    if let Some(owner) = filter.owner {
        query = query.bind(owner);
    }
    if let Some(category) = filter.category {
        query = query.bind(category.as_str());
    }
    if filter.featured_only {
        query = query.bind(true);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list news")?;

    rows.iter().map(row_to_news_mysql).collect()
}

async fn update_news_mysql(pool: &MySqlPool, news: &News) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE news
        SET title = ?, content = ?, category = ?, thumbnail = ?, is_featured = ?
        WHERE id = ?
        "#,
    )
    .bind(&news.title)
    .bind(&news.content)
    .bind(news.category.as_str())
    .bind(&news.thumbnail)
    .bind(news.is_featured)
    .bind(news.id.to_string())
    .execute(pool)
    .await
    .context("Failed to update news")?;

    Ok(())
}

fn row_to_news_mysql(row: &sqlx::mysql::MySqlRow) -> Result<News> {
    let id: String = row.get("id");
    let category: String = row.get("category");

    Ok(News {
        id: parse_id(&id)?,
        title: row.get("title"),
        content: row.get("content"),
        category: parse_category(&category)?,
        thumbnail: row.get("thumbnail"),
        news_views: row.get("news_views"),
        is_featured: row.get("is_featured"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        author_username: row.get("author_username"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use chrono::{Duration, Utc};

    async fn setup() -> (SqlxNewsRepository, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (
            SqlxNewsRepository::new(pool.clone()),
            SqlxUserRepository::new(pool),
        )
    }

    async fn make_user(users: &SqlxUserRepository, name: &str) -> User {
        users
            .create(&User::new(name.to_string(), "hash".to_string()))
            .await
            .unwrap()
    }

    fn article(title: &str, owner: Option<i64>, minutes_ago: i64) -> News {
        let mut news = News::new(title.to_string(), format!("{} content", title), owner);
        news.created_at = Utc::now() - Duration::minutes(minutes_ago);
        news
    }

    #[test]
    fn test_filter_clause() {
        assert_eq!(filter_clause(&NewsFilter::all()), "");

        let filter = NewsFilter {
            owner: Some(1),
            category: Some(NewsCategory::Match),
            featured_only: true,
        };
        assert_eq!(
            filter_clause(&filter),
            "WHERE n.user_id = ? AND n.category = ? AND n.is_featured = ?"
        );
    }

    #[tokio::test]
    async fn test_list_breaks_timestamp_ties_by_id() {
        let (repo, _) = setup().await;
        let posted_at = Utc::now();
        let mut expected = Vec::new();
        for title in ["First", "Second", "Third"] {
            let mut news = article(title, None, 0);
            news.created_at = posted_at;
            repo.create(&news).await.unwrap();
            expected.push(news.id.to_string());
        }
        expected.sort();
        expected.reverse();

        for _ in 0..2 {
            let listed: Vec<String> = repo
                .list(&NewsFilter::all())
                .await
                .unwrap()
                .iter()
                .map(|n| n.id.to_string())
                .collect();
            assert_eq!(listed, expected);
        }
    }

    #[tokio::test]
    async fn test_create_and_get_news() {
        let (repo, users) = setup().await;
        let author = make_user(&users, "reporter").await;
        let mut news = article("Derby Day", Some(author.id), 0);
        news.category = NewsCategory::Match;
        news.is_featured = true;
        news.thumbnail = Some("https://example.com/derby.png".to_string());

        let created = repo.create(&news).await.unwrap();

        assert_eq!(created.id, news.id);
        assert_eq!(created.category, NewsCategory::Match);
        assert!(created.is_featured);
        assert_eq!(created.author_username.as_deref(), Some("reporter"));
        assert_eq!(created.thumbnail.as_deref(), Some("https://example.com/derby.png"));

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_anonymous_news_has_no_author() {
        let (repo, _users) = setup().await;

        let created = repo.create(&article("Wire story", None, 0)).await.unwrap();

        assert!(created.user_id.is_none());
        assert!(created.author_username.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let (repo, users) = setup().await;
        let alice = make_user(&users, "alice").await;
        let bob = make_user(&users, "bob").await;

        let mut old = article("Old transfer", Some(alice.id), 30);
        old.category = NewsCategory::Transfer;
        let mut mid = article("Featured match", Some(bob.id), 20);
        mid.category = NewsCategory::Match;
        mid.is_featured = true;
        let new = article("Fresh update", Some(alice.id), 10);
        for n in [&old, &mid, &new] {
            repo.create(n).await.unwrap();
        }

        let all = repo.list(&NewsFilter::all()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Fresh update", "Featured match", "Old transfer"]);

        let mine = repo.list(&NewsFilter::owned_by(alice.id)).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|n| n.user_id == Some(alice.id)));

        let transfers = repo
            .list(&NewsFilter::all().with_category(Some(NewsCategory::Transfer)))
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].title, "Old transfer");

        let featured = repo
            .list(&NewsFilter {
                featured_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].title, "Featured match");
    }

    #[tokio::test]
    async fn test_update_news() {
        let (repo, _users) = setup().await;
        let created = repo.create(&article("Draft", None, 0)).await.unwrap();

        let mut edited = created.clone();
        edited.title = "Final".to_string();
        edited.category = NewsCategory::Analysis;
        let updated = repo.update(&edited).await.unwrap();

        assert_eq!(updated.title, "Final");
        assert_eq!(updated.category, NewsCategory::Analysis);
        assert_eq!(updated.news_views, 0);
    }

    #[tokio::test]
    async fn test_increment_views_and_delete() {
        let (repo, _users) = setup().await;
        let created = repo.create(&article("Popular", None, 0)).await.unwrap();

        assert!(repo.increment_views(created.id).await.unwrap());
        assert!(repo.increment_views(created.id).await.unwrap());
        assert!(!repo.increment_views(Uuid::new_v4()).await.unwrap());

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.news_views, 2);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_news() {
        let (repo, users) = setup().await;
        let author = make_user(&users, "leaver").await;
        let created = repo.create(&article("Farewell", Some(author.id), 0)).await.unwrap();

        users.delete(author.id).await.unwrap();

        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
