//! News model
//!
//! This module provides:
//! - `News`, a user-authored article
//! - `NewsCategory`, the closed set of article kinds
//! - `NewsFilter` for listing, plus create/update inputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// View count above which an article is considered hot
pub const HOT_NEWS_VIEWS: i64 = 20;

/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 255;

/// News article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: NewsCategory,
    pub thumbnail: Option<String>,
    pub news_views: i64,
    pub is_featured: bool,
    /// Owning user, if any
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    /// Owner's username, filled in by list and detail queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
}

impl News {
    pub fn new(title: String, content: String, user_id: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            content,
            category: NewsCategory::default(),
            thumbnail: None,
            news_views: 0,
            is_featured: false,
            user_id,
            created_at: Utc::now(),
            author_username: None,
        }
    }

    pub fn is_news_hot(&self) -> bool {
        self.news_views > HOT_NEWS_VIEWS
    }

    pub fn increment_views(&mut self) {
        self.news_views += 1;
    }
}

/// Kind of news article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    Transfer,
    #[default]
    Update,
    Exclusive,
    Match,
    Rumor,
    Analysis,
}

impl NewsCategory {
    pub const ALL: [NewsCategory; 6] = [
        NewsCategory::Transfer,
        NewsCategory::Update,
        NewsCategory::Exclusive,
        NewsCategory::Match,
        NewsCategory::Rumor,
        NewsCategory::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Transfer => "transfer",
            NewsCategory::Update => "update",
            NewsCategory::Exclusive => "exclusive",
            NewsCategory::Match => "match",
            NewsCategory::Rumor => "rumor",
            NewsCategory::Analysis => "analysis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NewsCategory::Transfer => "Transfer",
            NewsCategory::Update => "Update",
            NewsCategory::Exclusive => "Exclusive",
            NewsCategory::Match => "Match",
            NewsCategory::Rumor => "Rumor",
            NewsCategory::Analysis => "Analysis",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        NewsCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Invalid news category: {}", s))
    }
}

/// Listing filter; every populated field narrows the result
#[derive(Debug, Clone, Default)]
pub struct NewsFilter {
    /// Only articles owned by this user
    pub owner: Option<i64>,
    pub category: Option<NewsCategory>,
    pub featured_only: bool,
}

impl NewsFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owned_by(user_id: i64) -> Self {
        Self {
            owner: Some(user_id),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: Option<NewsCategory>) -> Self {
        self.category = category;
        self
    }
}

/// Input for creating a news article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateNewsInput {
    pub title: String,
    pub content: String,
    pub category: Option<NewsCategory>,
    pub thumbnail: Option<String>,
    pub is_featured: bool,
}

impl CreateNewsInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: NewsCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn featured(mut self, is_featured: bool) -> Self {
        self.is_featured = is_featured;
        self
    }
}

/// Input for editing a news article. The edit form always submits every
/// field, so this is a full replacement rather than a patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNewsInput {
    pub title: String,
    pub content: String,
    pub category: NewsCategory,
    pub thumbnail: Option<String>,
    pub is_featured: bool,
}
