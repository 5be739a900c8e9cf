//! News pages and JSON endpoints
//!
//! - GET /                    - news list (`?filter=all|my`, `?category=`)
//! - GET /news/{id}/          - article detail, counts a view
//! - GET/POST /create-news/   - publish an article
//! - GET/POST /news/{id}/edit/ - edit an article (owner only)
//! - POST /news/{id}/delete/  - delete an article (owner only)
//! - GET /json/, /json/{id}/  - articles as JSON

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;
use uuid::Uuid;

use crate::api::middleware::{login_redirect, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{ApiError, CategoryOption, NewsCard, PageError, DATE_FORMAT};
use crate::models::{CreateNewsInput, News, NewsCategory, NewsFilter, UpdateNewsInput};
use crate::services::NewsServiceError;
use crate::templates::PageVars;

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub filter: Option<String>,
    pub category: Option<String>,
}

/// Create/edit form fields; also echoed back when the form is re-rendered
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsForm {
    pub title: String,
    pub content: String,
    pub category: String,
    pub thumbnail: String,
    /// Checkbox: present (usually `"on"`) when ticked
    pub is_featured: Option<String>,
}

impl NewsForm {
    fn blank() -> Self {
        Self {
            category: NewsCategory::default().as_str().to_string(),
            ..Default::default()
        }
    }

    fn from_news(news: &News) -> Self {
        Self {
            title: news.title.clone(),
            content: news.content.clone(),
            category: news.category.as_str().to_string(),
            thumbnail: news.thumbnail.clone().unwrap_or_default(),
            is_featured: news.is_featured.then(|| "on".to_string()),
        }
    }

    fn category(&self) -> Result<NewsCategory, String> {
        if self.category.trim().is_empty() {
            return Ok(NewsCategory::default());
        }
        self.category.parse().map_err(|_| {
            format!(
                "Select a valid choice. {} is not one of the available choices.",
                self.category
            )
        })
    }

    fn is_featured(&self) -> bool {
        self.is_featured.is_some()
    }
}

pub fn category_options() -> Vec<CategoryOption> {
    NewsCategory::ALL
        .iter()
        .map(|c| CategoryOption {
            value: c.as_str(),
            label: c.label(),
        })
        .collect()
}

fn parse_id(raw: &str) -> Result<Uuid, PageError> {
    Uuid::parse_str(raw).map_err(|_| PageError::NotFound)
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    vars: PageVars,
    MaybeUser(user): MaybeUser,
    uri: Uri,
    Query(query): Query<IndexQuery>,
) -> Result<Response, PageError> {
    let mine = query.filter.as_deref() == Some("my");
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<NewsCategory>().ok());

    let filter = match (mine, &user) {
        (true, Some(user)) => NewsFilter::owned_by(user.id),
        (true, None) => return Ok(login_redirect(&uri)),
        (false, _) => NewsFilter::all(),
    }
    .with_category(category);

    let news_list: Vec<NewsCard> = state
        .news_service
        .list(&filter)
        .await?
        .into_iter()
        .map(|news| NewsCard {
            category_label: news.category.label(),
            excerpt: state.news_service.excerpt(&news),
            published: news.created_at.format(DATE_FORMAT).to_string(),
            is_hot: news.is_news_hot(),
            news,
        })
        .collect();

    let mut context = TeraContext::new();
    context.insert("news_list", &news_list);
    context.insert("filter", if mine { "my" } else { "all" });
    context.insert("category", category.map(|c| c.as_str()).unwrap_or(""));
    context.insert("categories", &category_options());
    Ok(state.render("main.html", &context, &vars)?.into_response())
}

/// GET /news/{id}/
pub async fn detail(
    State(state): State<AppState>,
    vars: PageVars,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let news = state.news_service.view(parse_id(&id)?).await?;

    let mut context = TeraContext::new();
    context.insert("category_label", news.category.label());
    context.insert("content_html", &state.news_service.render_content(&news));
    context.insert("published", &news.created_at.format(DATE_FORMAT).to_string());
    context.insert("is_owner", &user.owns(news.user_id));
    context.insert("is_hot", &news.is_news_hot());
    context.insert("news", &news);
    Ok(state.render("news_detail.html", &context, &vars)?.into_response())
}

fn render_news_form(
    state: &AppState,
    vars: &PageVars,
    template: &'static str,
    form: &NewsForm,
    news_id: Option<Uuid>,
    errors: &[String],
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("categories", &category_options());
    context.insert("errors", errors);
    if let Some(id) = news_id {
        context.insert("news_id", &id);
    }
    Ok(state.render(template, &context, vars)?.into_response())
}

/// GET /create-news/
pub async fn create_form(State(state): State<AppState>, vars: PageVars) -> Result<Response, PageError> {
    render_news_form(&state, &vars, "create_news.html", &NewsForm::blank(), None, &[])
}

/// POST /create-news/
pub async fn create(
    State(state): State<AppState>,
    vars: PageVars,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<NewsForm>,
) -> Result<Response, PageError> {
    let category = match form.category() {
        Ok(category) => category,
        Err(msg) => return render_news_form(&state, &vars, "create_news.html", &form, None, &[msg]),
    };

    let mut input = CreateNewsInput::new(form.title.clone(), form.content.clone())
        .with_category(category)
        .featured(form.is_featured());
    if !form.thumbnail.trim().is_empty() {
        input = input.with_thumbnail(form.thumbnail.clone());
    }

    match state.news_service.create(input, &user).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(NewsServiceError::ValidationError(msg)) => {
            render_news_form(&state, &vars, "create_news.html", &form, None, &[msg])
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /news/{id}/edit/
pub async fn edit_form(
    State(state): State<AppState>,
    vars: PageVars,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let news = state.news_service.get(parse_id(&id)?).await?;
    if !user.owns(news.user_id) {
        return Err(PageError::Forbidden);
    }

    render_news_form(
        &state,
        &vars,
        "edit_news.html",
        &NewsForm::from_news(&news),
        Some(news.id),
        &[],
    )
}

/// POST /news/{id}/edit/
pub async fn edit(
    State(state): State<AppState>,
    vars: PageVars,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Form(form): Form<NewsForm>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let category = match form.category() {
        Ok(category) => category,
        Err(msg) => return render_news_form(&state, &vars, "edit_news.html", &form, Some(id), &[msg]),
    };

    let input = UpdateNewsInput {
        title: form.title.clone(),
        content: form.content.clone(),
        category,
        thumbnail: Some(form.thumbnail.clone()),
        is_featured: form.is_featured(),
    };

    match state.news_service.update(id, input, &user).await {
        Ok(news) => Ok(Redirect::to(&format!("/news/{}/", news.id)).into_response()),
        Err(NewsServiceError::ValidationError(msg)) => {
            render_news_form(&state, &vars, "edit_news.html", &form, Some(id), &[msg])
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /news/{id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    state.news_service.delete(parse_id(&id)?, &user).await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /json/
pub async fn list_json(State(state): State<AppState>) -> Result<Json<Vec<News>>, ApiError> {
    Ok(Json(state.news_service.list(&NewsFilter::all()).await?))
}

/// GET /json/{id}/
pub async fn detail_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<News>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::not_found(format!("News {} not found", id)))?;
    Ok(Json(state.news_service.get(id).await?))
}
