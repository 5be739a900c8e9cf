//! Item model
//!
//! This module provides:
//! - `Item`, a merchandise catalogue record
//! - `ItemCategory`, the closed set of catalogue sections
//! - Input types for creating and updating items
//!
//! An item is in high demand while fewer than [`HIGH_DEMAND_THRESHOLD`]
//! units are in stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stock level below which an item counts as high demand
pub const HIGH_DEMAND_THRESHOLD: i32 = 10;

/// Largest stock an item can hold; the column is a 32-bit integer
pub const MAX_STOCK: i32 = i32::MAX;

/// Merchandise catalogue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: i64,
    pub name: String,
    /// Price in the smallest currency unit
    pub price: i64,
    pub description: String,
    pub category: ItemCategory,
    /// Units in stock
    pub stock: i32,
    /// Average rating, 0.0 to 5.0
    pub rating: f64,
    pub is_featured: bool,
    pub is_official_merch: bool,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// New item with every optional field at its default:
    /// category `electronics`, no stock, no rating, not featured, not official merch.
    pub fn new(name: String, price: i64, description: String) -> Self {
        Self {
            id: 0,
            name,
            price,
            description,
            category: ItemCategory::default(),
            stock: 0,
            rating: 0.0,
            is_featured: false,
            is_official_merch: false,
            created_at: Utc::now(),
        }
    }

    /// True while stock is below [`HIGH_DEMAND_THRESHOLD`]
    pub fn is_high_demand(&self) -> bool {
        self.stock < HIGH_DEMAND_THRESHOLD
    }

    /// Add exactly one unit to stock
    ///
    /// Returns `false` and leaves stock untouched when it is already at [`MAX_STOCK`].
    pub fn increment_stock(&mut self) -> bool {
        match self.stock.checked_add(1) {
            Some(stock) => {
                self.stock = stock;
                true
            }
            None => false,
        }
    }
}

/// Catalogue section of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    #[default]
    Electronics,
    Clothing,
    Footwear,
    Equipment,
    Accessories,
    Collectibles,
}

impl ItemCategory {
    /// Every category, in display order
    pub const ALL: [ItemCategory; 6] = [
        ItemCategory::Electronics,
        ItemCategory::Clothing,
        ItemCategory::Footwear,
        ItemCategory::Equipment,
        ItemCategory::Accessories,
        ItemCategory::Collectibles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Electronics => "electronics",
            ItemCategory::Clothing => "clothing",
            ItemCategory::Footwear => "footwear",
            ItemCategory::Equipment => "equipment",
            ItemCategory::Accessories => "accessories",
            ItemCategory::Collectibles => "collectibles",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ItemCategory::Electronics => "Electronics",
            ItemCategory::Clothing => "Clothing",
            ItemCategory::Footwear => "Footwear",
            ItemCategory::Equipment => "Equipment",
            ItemCategory::Accessories => "Accessories",
            ItemCategory::Collectibles => "Collectibles",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Invalid item category: {}", s))
    }
}

/// Input for creating an item; `None` fields take the model defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateItemInput {
    pub name: String,
    pub price: i64,
    pub description: String,
    pub category: Option<ItemCategory>,
    pub stock: Option<i32>,
    pub rating: Option<f64>,
    pub is_featured: Option<bool>,
    pub is_official_merch: Option<bool>,
}

impl CreateItemInput {
    pub fn new(name: impl Into<String>, price: i64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: ItemCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_stock(mut self, stock: i32) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn featured(mut self, is_featured: bool) -> Self {
        self.is_featured = Some(is_featured);
        self
    }

    pub fn official_merch(mut self, is_official_merch: bool) -> Self {
        self.is_official_merch = Some(is_official_merch);
        self
    }

    /// Materialise the input into an unsaved `Item`
    pub fn into_item(self) -> Item {
        let mut item = Item::new(self.name, self.price, self.description);
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(stock) = self.stock {
            item.stock = stock;
        }
        if let Some(rating) = self.rating {
            item.rating = rating;
        }
        item.is_featured = self.is_featured.unwrap_or(false);
        item.is_official_merch = self.is_official_merch.unwrap_or(false);
        item
    }
}

/// Partial update for an item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemInput {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
    pub stock: Option<i32>,
    pub rating: Option<f64>,
    pub is_featured: Option<bool>,
    pub is_official_merch: Option<bool>,
}

impl UpdateItemInput {
    /// Apply the present fields to `item`
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(ref name) = self.name {
            item.name = name.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(ref description) = self.description {
            item.description = description.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(stock) = self.stock {
            item.stock = stock;
        }
        if let Some(rating) = self.rating {
            item.rating = rating;
        }
        if let Some(is_featured) = self.is_featured {
            item.is_featured = is_featured;
        }
        if let Some(is_official_merch) = self.is_official_merch {
            item.is_official_merch = is_official_merch;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_default_values() {
        let item = Item::new(
            "Default Product".to_string(),
            1_000_000,
            "Default product description".to_string(),
        );

        assert_eq!(item.category, ItemCategory::Electronics);
        assert_eq!(item.category.to_string(), "electronics");
        assert_eq!(item.stock, 0);
        assert_eq!(item.rating, 0.0);
        assert!(!item.is_featured);
        assert!(!item.is_official_merch);
        assert!(item.is_high_demand());
    }

    #[test]
    fn test_create_input_overrides_defaults() {
        let item = CreateItemInput::new("Official Merch T-Shirt", 1_500_000, "High-quality official merch")
            .with_category(ItemCategory::Clothing)
            .with_stock(50)
            .with_rating(4.5)
            .featured(true)
            .official_merch(true)
            .into_item();

        assert_eq!(item.name, "Official Merch T-Shirt");
        assert_eq!(item.category, ItemCategory::Clothing);
        assert_eq!(item.stock, 50);
        assert_eq!(item.rating, 4.5);
        assert!(item.is_featured);
        assert!(item.is_official_merch);
        assert!(!item.is_high_demand());
    }

    #[test]
    fn test_increment_stock_adds_one() {
        let mut item = Item::new("Test Product".to_string(), 500_000, "Test product".to_string());
        let initial = item.stock;

        assert!(item.increment_stock());

        assert_eq!(item.stock, initial + 1);
    }

    #[test]
    fn test_increment_stock_stops_at_max() {
        let mut item = Item::new("Scarf".to_string(), 150_000, "Club scarf".to_string());
        item.stock = MAX_STOCK - 1;

        assert!(item.increment_stock());
        assert_eq!(item.stock, MAX_STOCK);

        assert!(!item.increment_stock());
        assert_eq!(item.stock, MAX_STOCK);
        assert!(!item.is_high_demand());
    }

    #[test]
    fn test_high_demand_threshold_boundary() {
        let mut item = Item::new("Boots".to_string(), 700_000, "Boots".to_string());

        item.stock = 9;
        assert!(item.is_high_demand());
        item.stock = 10;
        assert!(!item.is_high_demand());
        item.stock = 15;
        assert!(!item.is_high_demand());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(ItemCategory::from_str("clothing").unwrap(), ItemCategory::Clothing);
        assert_eq!(ItemCategory::from_str(" Footwear ").unwrap(), ItemCategory::Footwear);
        assert!(ItemCategory::from_str("groceries").is_err());
    }

    #[test]
    fn test_update_input_applies_only_present_fields() {
        let mut item = Item::new("Ball".to_string(), 200_000, "Match ball".to_string());
        let update = UpdateItemInput {
            price: Some(180_000),
            is_featured: Some(true),
            ..Default::default()
        };

        update.apply_to(&mut item);

        assert_eq!(item.name, "Ball");
        assert_eq!(item.price, 180_000);
        assert!(item.is_featured);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn high_demand_iff_stock_below_threshold(stock in -1_000i32..1_000) {
            let mut item = Item::new("Any".to_string(), 1, "Any".to_string());
            item.stock = stock;
            prop_assert_eq!(item.is_high_demand(), stock < HIGH_DEMAND_THRESHOLD);
        }

        #[test]
        fn increment_stock_is_exactly_one(stock in 0i32..MAX_STOCK) {
            let mut item = Item::new("Any".to_string(), 1, "Any".to_string());
            item.stock = stock;
            prop_assert!(item.increment_stock());
            prop_assert_eq!(item.stock, stock + 1);
        }
    }
}
