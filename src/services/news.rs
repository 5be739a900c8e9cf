//! News service
//!
//! Business rules for articles:
//! - title and content are trimmed and must not be empty
//! - titles are capped at 255 characters
//! - a thumbnail, when given, must be an absolute http(s) URL
//! - only the owning user may edit or delete an article

use crate::db::repositories::NewsRepository;
use crate::models::{CreateNewsInput, News, NewsFilter, UpdateNewsInput, User};
use crate::models::MAX_TITLE_LENGTH;
use crate::services::markdown::MarkdownRenderer;
use anyhow::Context;
use std::sync::Arc;
use uuid::Uuid;

/// Words kept in listing excerpts
const EXCERPT_WORDS: usize = 30;

/// Error types for news service operations
#[derive(Debug, thiserror::Error)]
pub enum NewsServiceError {
    #[error("News not found: {0}")]
    NotFound(Uuid),

    /// The acting user does not own the article
    #[error("You do not have permission to modify this news")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NewsService {
    repo: Arc<dyn NewsRepository>,
    markdown: MarkdownRenderer,
}

impl NewsService {
    pub fn new(repo: Arc<dyn NewsRepository>) -> Self {
        Self {
            repo,
            markdown: MarkdownRenderer::new(),
        }
    }

    /// Publish an article owned by `author`
    pub async fn create(
        &self,
        input: CreateNewsInput,
        author: &User,
    ) -> Result<News, NewsServiceError> {
        let fields = validate(&input.title, &input.content, input.thumbnail.as_deref())?;

        let mut news = News::new(fields.title, fields.content, Some(author.id));
        news.category = input.category.unwrap_or_default();
        news.thumbnail = fields.thumbnail;
        news.is_featured = input.is_featured;

        let created = self
            .repo
            .create(&news)
            .await
            .context("Failed to create news")?;

        tracing::info!(news_id = %created.id, user_id = author.id, "News created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<News, NewsServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get news")?
            .ok_or(NewsServiceError::NotFound(id))
    }

    /// Articles matching `filter`, newest first
    pub async fn list(&self, filter: &NewsFilter) -> Result<Vec<News>, NewsServiceError> {
        Ok(self.repo.list(filter).await.context("Failed to list news")?)
    }

    /// Count a read of the article and return it with the new view count
    pub async fn view(&self, id: Uuid) -> Result<News, NewsServiceError> {
        let found = self
            .repo
            .increment_views(id)
            .await
            .context("Failed to record news view")?;
        if !found {
            return Err(NewsServiceError::NotFound(id));
        }
        self.get(id).await
    }

    /// Replace the editable fields of an article owned by `editor`
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateNewsInput,
        editor: &User,
    ) -> Result<News, NewsServiceError> {
        let mut news = self.get_owned(id, editor).await?;
        let fields = validate(&input.title, &input.content, input.thumbnail.as_deref())?;

        news.title = fields.title;
        news.content = fields.content;
        news.thumbnail = fields.thumbnail;
        news.category = input.category;
        news.is_featured = input.is_featured;

        let updated = self
            .repo
            .update(&news)
            .await
            .context("Failed to update news")?;

        tracing::info!(news_id = %id, user_id = editor.id, "News updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid, editor: &User) -> Result<(), NewsServiceError> {
        self.get_owned(id, editor).await?;
        self.repo.delete(id).await.context("Failed to delete news")?;

        tracing::info!(news_id = %id, user_id = editor.id, "News deleted");
        Ok(())
    }

    /// Article body as sanitised HTML
    pub fn render_content(&self, news: &News) -> String {
        self.markdown.render(&news.content)
    }

    /// Short plain-text teaser for listings
    pub fn excerpt(&self, news: &News) -> String {
        self.markdown.excerpt(&news.content, EXCERPT_WORDS)
    }

    async fn get_owned(&self, id: Uuid, user: &User) -> Result<News, NewsServiceError> {
        let news = self.get(id).await?;
        if !user.owns(news.user_id) {
            tracing::warn!(news_id = %id, user_id = user.id, "Refused edit of news owned by another user");
            return Err(NewsServiceError::Forbidden);
        }
        Ok(news)
    }
}

struct ValidFields {
    title: String,
    content: String,
    thumbnail: Option<String>,
}

fn validate(
    title: &str,
    content: &str,
    thumbnail: Option<&str>,
) -> Result<ValidFields, NewsServiceError> {
    let invalid = |msg: String| Err(NewsServiceError::ValidationError(msg));

    let title = title.trim();
    if title.is_empty() {
        return invalid("Title cannot be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return invalid(format!("Title cannot exceed {} characters", MAX_TITLE_LENGTH));
    }

    let content = content.trim();
    if content.is_empty() {
        return invalid("Content cannot be empty".to_string());
    }

    let thumbnail = thumbnail.map(str::trim).filter(|t| !t.is_empty());
    if let Some(url) = thumbnail {
        let lower = url.to_ascii_lowercase();
        let has_host = |scheme: &str| lower.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty());
        if !(has_host("http://") || has_host("https://")) {
            return invalid("Thumbnail must be a valid http or https URL".to_string());
        }
    }

    Ok(ValidFields {
        title: title.to_string(),
        content: content.to_string(),
        thumbnail: thumbnail.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxNewsRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::NewsCategory;

    struct Fixture {
        service: NewsService,
        alice: User,
        bob: User,
    }

    async fn setup() -> Fixture {
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

        Fixture {
            service: NewsService::new(SqlxNewsRepository::boxed(pool)),
            alice,
            bob,
        }
    }

    fn edit(title: &str) -> UpdateNewsInput {
        UpdateNewsInput {
            title: title.to_string(),
            content: "Edited body".to_string(),
            category: NewsCategory::Analysis,
            thumbnail: None,
            is_featured: false,
        }
    }

    #[tokio::test]
    async fn test_create_news_with_defaults() {
        let f = setup().await;

        let news = f
            .service
            .create(CreateNewsInput::new("  Derby Day  ", " Report "), &f.alice)
            .await
            .unwrap();

        assert_eq!(news.title, "Derby Day");
        assert_eq!(news.content, "Report");
        assert_eq!(news.category, NewsCategory::Update);
        assert_eq!(news.user_id, Some(f.alice.id));
        assert_eq!(news.news_views, 0);
        assert!(!news.is_featured);
    }

    #[tokio::test]
    async fn test_create_news_with_category_and_thumbnail() {
        let f = setup().await;
        let input = CreateNewsInput::new("Test News Title", "Test news content")
            .with_category(NewsCategory::Match)
            .with_thumbnail("https://example.com/image.jpg")
            .featured(true);

        let news = f.service.create(input, &f.alice).await.unwrap();

        assert_eq!(news.category, NewsCategory::Match);
        assert_eq!(news.thumbnail.as_deref(), Some("https://example.com/image.jpg"));
        assert!(news.is_featured);
    }

    #[tokio::test]
    async fn test_create_news_validation() {
        let f = setup().await;
        let cases = [
            CreateNewsInput::new("   ", "body"),
            CreateNewsInput::new("title", "  "),
            CreateNewsInput::new("x".repeat(256), "body"),
            CreateNewsInput::new("title", "body").with_thumbnail("ftp://example.com/a.png"),
            CreateNewsInput::new("title", "body").with_thumbnail("https://"),
        ];

        for input in cases {
            let result = f.service.create(input, &f.alice).await;
            assert!(
                matches!(result, Err(NewsServiceError::ValidationError(_))),
                "expected validation error, got {:?}",
                result
            );
        }

        let blank_thumbnail = CreateNewsInput::new("title", "body").with_thumbnail("   ");
        let news = f.service.create(blank_thumbnail, &f.alice).await.unwrap();
        assert!(news.thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_news() {
        let f = setup().await;
        let id = Uuid::new_v4();

        assert!(matches!(f.service.get(id).await, Err(NewsServiceError::NotFound(got)) if got == id));
        assert!(matches!(f.service.view(id).await, Err(NewsServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_view_increments_and_becomes_hot() {
        let f = setup().await;
        let news = f
            .service
            .create(CreateNewsInput::new("Popular", "Everyone reads this"), &f.alice)
            .await
            .unwrap();

        let mut last = news.clone();
        for _ in 0..21 {
            last = f.service.view(news.id).await.unwrap();
        }

        assert_eq!(last.news_views, 21);
        assert!(last.is_news_hot());
    }

    #[tokio::test]
    async fn test_list_all_and_mine() {
        let f = setup().await;
        f.service
            .create(CreateNewsInput::new("My Test News", "My news content"), &f.alice)
            .await
            .unwrap();
        f.service
            .create(CreateNewsInput::new("Other User News", "Other content"), &f.bob)
            .await
            .unwrap();

        let all = f.service.list(&NewsFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);

        let mine = f.service.list(&NewsFilter::owned_by(f.alice.id)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "My Test News");
        assert_eq!(mine[0].author_username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_only_owner_may_update_or_delete() {
        let f = setup().await;
        let news = f
            .service
            .create(CreateNewsInput::new("Original", "Body"), &f.alice)
            .await
            .unwrap();

        let refused = f.service.update(news.id, edit("Hijacked"), &f.bob).await;
        assert!(matches!(refused, Err(NewsServiceError::Forbidden)));
        let refused = f.service.delete(news.id, &f.bob).await;
        assert!(matches!(refused, Err(NewsServiceError::Forbidden)));

        let updated = f.service.update(news.id, edit("Revised"), &f.alice).await.unwrap();
        assert_eq!(updated.title, "Revised");
        assert_eq!(updated.category, NewsCategory::Analysis);

        f.service.delete(news.id, &f.alice).await.unwrap();
        assert!(matches!(f.service.get(news.id).await, Err(NewsServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_fields() {
        let f = setup().await;
        let news = f
            .service
            .create(CreateNewsInput::new("Original", "Body"), &f.alice)
            .await
            .unwrap();

        let result = f.service.update(news.id, edit(""), &f.alice).await;

        assert!(matches!(result, Err(NewsServiceError::ValidationError(_))));
        assert_eq!(f.service.get(news.id).await.unwrap().title, "Original");
    }

    #[tokio::test]
    async fn test_render_content_escapes_html() {
        let f = setup().await;
        let news = f
            .service
            .create(
                CreateNewsInput::new("Markup", "**Goal!** <script>x()</script>"),
                &f.alice,
            )
            .await
            .unwrap();

        let html = f.service.render_content(&news);

        assert!(html.contains("<strong>Goal!</strong>"));
        assert!(!html.contains("<script>"));
    }
}
