//! Item service
//!
//! Catalogue business logic. Listings are cached per category and every write
//! drops the whole `items:` key space.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::ItemRepository;
use crate::models::{CreateItemInput, Item, ItemCategory, UpdateItemInput, MAX_STOCK};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_ITEM_LIST: &str = "items:list:";
const CACHE_KEY_FEATURED: &str = "items:featured";
const CACHE_PATTERN_ITEMS: &str = "items:*";

const MAX_RATING: f64 = 5.0;

/// Error types for item service operations
#[derive(Debug, thiserror::Error)]
pub enum ItemServiceError {
    #[error("Item not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ItemService {
    repo: Arc<dyn ItemRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl ItemService {
    pub fn new(repo: Arc<dyn ItemRepository>, cache: Arc<MemoryCache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn create(&self, input: CreateItemInput) -> Result<Item, ItemServiceError> {
        let mut item = input.into_item();
        item.name = item.name.trim().to_string();
        validate(&item)?;

        let created = self
            .repo
            .create(&item)
            .await
            .context("Failed to create item")?;
        self.invalidate().await;

        tracing::info!(item_id = created.id, name = %created.name, "Item created");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Item, ItemServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get item")?
            .ok_or(ItemServiceError::NotFound(id))
    }

    /// Items newest first, optionally for one category
    pub async fn list(&self, category: Option<ItemCategory>) -> Result<Vec<Item>, ItemServiceError> {
        let key = format!(
            "{}{}",
            CACHE_KEY_ITEM_LIST,
            category.map(|c| c.as_str()).unwrap_or("all")
        );
        if let Ok(Some(cached)) = self.cache.get::<Vec<Item>>(&key).await {
            return Ok(cached);
        }

        let items = self.repo.list(category).await.context("Failed to list items")?;
        let _ = self.cache.set(&key, &items, self.cache_ttl).await;
        Ok(items)
    }

    pub async fn list_featured(&self) -> Result<Vec<Item>, ItemServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Item>>(CACHE_KEY_FEATURED).await {
            return Ok(cached);
        }

        let items = self
            .repo
            .list_featured()
            .await
            .context("Failed to list featured items")?;
        let _ = self.cache.set(CACHE_KEY_FEATURED, &items, self.cache_ttl).await;
        Ok(items)
    }

    /// Add one unit of stock and return the refreshed item
    ///
    /// An item already holding [`MAX_STOCK`] units is left unchanged and
    /// reported as a validation error.
    pub async fn increment_stock(&self, id: i64) -> Result<Item, ItemServiceError> {
        let changed = self
            .repo
            .increment_stock(id)
            .await
            .context("Failed to increment stock")?;
        if !changed {
            let item = self.get(id).await?;
            tracing::warn!(item_id = id, stock = item.stock, "Stock increment refused");
            return Err(ItemServiceError::ValidationError(
                "Stock is at its maximum".to_string(),
            ));
        }
        self.invalidate().await;

        let item = self.get(id).await?;
        tracing::debug!(item_id = id, stock = item.stock, "Stock incremented");
        Ok(item)
    }

    pub async fn update(&self, id: i64, input: UpdateItemInput) -> Result<Item, ItemServiceError> {
        let mut item = self.get(id).await?;
        input.apply_to(&mut item);
        item.name = item.name.trim().to_string();
        validate(&item)?;

        let updated = self
            .repo
            .update(&item)
            .await
            .context("Failed to update item")?;
        self.invalidate().await;

        tracing::info!(item_id = id, "Item updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ItemServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete item")?;
        if !deleted {
            return Err(ItemServiceError::NotFound(id));
        }
        self.invalidate().await;

        tracing::info!(item_id = id, "Item deleted");
        Ok(())
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_ITEMS).await {
            tracing::warn!("Failed to invalidate item cache: {}", e);
        }
    }
}

fn validate(item: &Item) -> Result<(), ItemServiceError> {
    let invalid = |msg: &str| Err(ItemServiceError::ValidationError(msg.to_string()));

    if item.name.is_empty() {
        return invalid("Name cannot be empty");
    }
    if item.price < 0 {
        return invalid("Price cannot be negative");
    }
    if item.stock < 0 {
        return invalid("Stock cannot be negative");
    }
    if !(0.0..=MAX_RATING).contains(&item.rating) {
        return invalid("Rating must be between 0.0 and 5.0");
    }
    Ok(())
}
