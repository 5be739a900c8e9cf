//! Item repository
//!
//! Database operations for the merchandise catalogue.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Item, ItemCategory, MAX_STOCK};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Item repository trait
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Insert an item and return it with its assigned id
    async fn create(&self, item: &Item) -> Result<Item>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Item>>;

    /// List items, optionally restricted to one category, newest first
    async fn list(&self, category: Option<ItemCategory>) -> Result<Vec<Item>>;

    /// List featured items, newest first
    async fn list_featured(&self) -> Result<Vec<Item>>;

    async fn update(&self, item: &Item) -> Result<Item>;

    /// Delete an item, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Atomically add one unit of stock
    ///
    /// Returns `false` when no row changed: the item is missing or its
    /// stock is already at [`MAX_STOCK`].
    async fn increment_stock(&self, id: i64) -> Result<bool>;
}

/// SQLx-based item repository implementation
pub struct SqlxItemRepository {
    pool: DynDatabasePool,
}

impl SqlxItemRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ItemRepository> {
        Arc::new(Self::new(pool))
    }

    async fn execute_by_id(&self, sql: &str, id: i64, what: &'static str) -> Result<u64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context(what)?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context(what)?
                .rows_affected(),
        };
        Ok(affected)
    }
}

#[async_trait]
impl ItemRepository for SqlxItemRepository {
    async fn create(&self, item: &Item) -> Result<Item> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_item_sqlite(self.pool.sqlite()?, item).await,
            DatabaseDriver::Mysql => create_item_mysql(self.pool.mysql()?, item).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Item>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_item_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_item_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, category: Option<ItemCategory>) -> Result<Vec<Item>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_items_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => list_items_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn list_featured(&self) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE is_featured = ? ORDER BY created_at DESC, id DESC",
            ITEM_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(true)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list featured items")?;
                rows.iter().map(row_to_item_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(true)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list featured items")?;
                rows.iter().map(row_to_item_mysql).collect()
            }
        }
    }

    async fn update(&self, item: &Item) -> Result<Item> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_item_sqlite(self.pool.sqlite()?, item).await?,
            DatabaseDriver::Mysql => update_item_mysql(self.pool.mysql()?, item).await?,
        }
        self.get_by_id(item.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Item not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .execute_by_id("DELETE FROM items WHERE id = ?", id, "Failed to delete item")
            .await?;
        Ok(affected > 0)
    }

    async fn increment_stock(&self, id: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE items SET stock = stock + 1 WHERE id = ? AND stock < {}",
            MAX_STOCK
        );
        let affected = self
            .execute_by_id(&sql, id, "Failed to increment item stock")
            .await?;
        Ok(affected > 0)
    }
}

const ITEM_COLUMNS: &str =
    "id, name, price, description, category, stock, rating, is_featured, is_official_merch, created_at";

fn category_sql(category: Option<ItemCategory>) -> String {
    let filter = if category.is_some() {
        "WHERE category = ?"
    } else {
        ""
    };
    format!(
        "SELECT {} FROM items {} ORDER BY created_at DESC, id DESC",
        ITEM_COLUMNS, filter
    )
}

fn parse_category(raw: &str) -> Result<ItemCategory> {
    ItemCategory::from_str(raw)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_item_sqlite(pool: &SqlitePool, item: &Item) -> Result<Item> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO items (name, price, description, category, stock, rating, is_featured, is_official_merch, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.name)
    .bind(item.price)
    .bind(&item.description)
    .bind(item.category.as_str())
    .bind(item.stock)
    .bind(item.rating)
    .bind(item.is_featured)
    .bind(item.is_official_merch)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    Ok(Item {
        id: result.last_insert_rowid(),
        created_at: now,
        ..item.clone()
    })
}

async fn get_item_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Item>> {
    let sql = format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by ID")?;

    row.map(|row| row_to_item_sqlite(&row)).transpose()
}

async fn list_items_sqlite(pool: &SqlitePool, category: Option<ItemCategory>) -> Result<Vec<Item>> {
    let sql = category_sql(category);
    let mut query = sqlx::query(&sql);
    if let Some(category) = category {
        query = query.bind(category.as_str());
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list items")?;

    rows.iter().map(row_to_item_sqlite).collect()
}

async fn update_item_sqlite(pool: &SqlitePool, item: &Item) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE items
        SET name = ?, price = ?, description = ?, category = ?, stock = ?, rating = ?,
            is_featured = ?, is_official_merch = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.name)
    .bind(item.price)
    .bind(&item.description)
    .bind(item.category.as_str())
    .bind(item.stock)
    .bind(item.rating)
    .bind(item.is_featured)
    .bind(item.is_official_merch)
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    Ok(())
}

fn row_to_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Item> {
    let category: String = row.get("category");

    Ok(Item {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        description: row.get("description"),
        category: parse_category(&category)?,
        stock: row.get("stock"),
        rating: row.get("rating"),
        is_featured: row.get("is_featured"),
        is_official_merch: row.get("is_official_merch"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_item_mysql(pool: &MySqlPool, item: &Item) -> Result<Item> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO items (name, price, description, category, stock, rating, is_featured, is_official_merch, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.name)
    .bind(item.price)
    .bind(&item.description)
    .bind(item.category.as_str())
    .bind(item.stock)
    .bind(item.rating)
    .bind(item.is_featured)
    .bind(item.is_official_merch)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    Ok(Item {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..item.clone()
    })
}

async fn get_item_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Item>> {
    let sql = format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by ID")?;

    row.map(|row| row_to_item_mysql(&row)).transpose()
}

async fn list_items_mysql(pool: &MySqlPool, category: Option<ItemCategory>) -> Result<Vec<Item>> {
    let sql = category_sql(category);
    let mut query = sqlx::query(&sql);
    if let Some(category) = category {
        query = query.bind(category.as_str());
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list items")?;

    rows.iter().map(row_to_item_mysql).collect()
}

async fn update_item_mysql(pool: &MySqlPool, item: &Item) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE items
        SET name = ?, price = ?, description = ?, category = ?, stock = ?, rating = ?,
            is_featured = ?, is_official_merch = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.name)
    .bind(item.price)
    .bind(&item.description)
    .bind(item.category.as_str())
    .bind(item.stock)
    .bind(item.rating)
    .bind(item.is_featured)
    .bind(item.is_official_merch)
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    Ok(())
}

fn row_to_item_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Item> {
    let category: String = row.get("category");

    Ok(Item {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        description: row.get("description"),
        category: parse_category(&category)?,
        stock: row.get("stock"),
        rating: row.get("rating"),
        is_featured: row.get("is_featured"),
        is_official_merch: row.get("is_official_merch"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateItemInput;

    async fn setup_test_repo() -> SqlxItemRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxItemRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_item_keeps_defaults() {
        let repo = setup_test_repo().await;
        let item = CreateItemInput::new("Default Product", 1_000_000, "Default product description")
            .into_item();

        let created = repo.create(&item).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert!(found.id > 0);
        assert_eq!(found.category, ItemCategory::Electronics);
        assert_eq!(found.stock, 0);
        assert_eq!(found.rating, 0.0);
        assert!(!found.is_featured);
        assert!(!found.is_official_merch);
    }

    #[tokio::test]
    async fn test_list_by_category() {
        let repo = setup_test_repo().await;
        let shirt = CreateItemInput::new("Shirt", 100, "Home shirt")
            .with_category(ItemCategory::Clothing)
            .into_item();
        let boots = CreateItemInput::new("Boots", 200, "Firm ground")
            .with_category(ItemCategory::Footwear)
            .into_item();
        repo.create(&shirt).await.unwrap();
        repo.create(&boots).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);

        let clothing = repo.list(Some(ItemCategory::Clothing)).await.unwrap();
        assert_eq!(clothing.len(), 1);
        assert_eq!(clothing[0].name, "Shirt");

        assert!(repo
            .list(Some(ItemCategory::Collectibles))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_featured() {
        let repo = setup_test_repo().await;
        repo.create(&CreateItemInput::new("Plain", 1, "x").into_item())
            .await
            .unwrap();
        repo.create(&CreateItemInput::new("Star", 1, "x").featured(true).into_item())
            .await
            .unwrap();

        let featured = repo.list_featured().await.unwrap();

        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].name, "Star");
    }

    #[tokio::test]
    async fn test_increment_stock_is_persisted() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&CreateItemInput::new("Scarf", 50, "Wool").into_item())
            .await
            .unwrap();

        assert!(repo.increment_stock(created.id).await.unwrap());
        assert!(!repo.increment_stock(9999).await.unwrap());

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.stock, created.stock + 1);
    }

    #[tokio::test]
    async fn test_increment_stock_refuses_past_max() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(
                &CreateItemInput::new("Pennant", 20, "Felt")
                    .with_stock(MAX_STOCK)
                    .into_item(),
            )
            .await
            .unwrap();

        assert!(!repo.increment_stock(created.id).await.unwrap());

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.stock, MAX_STOCK);
    }

    #[tokio::test]
    async fn test_update_and_delete_item() {
        let repo = setup_test_repo().await;
        let mut created = repo
            .create(&CreateItemInput::new("Ball", 300, "Size 5").into_item())
            .await
            .unwrap();

        created.price = 250;
        created.rating = 4.0;
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.price, 250);
        assert_eq!(updated.rating, 4.0);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
