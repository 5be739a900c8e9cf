//! Item catalogue pages and JSON endpoints
//!
//! - GET /items/                          - catalogue (`?category=`)
//! - GET/POST /items/create/              - add an item
//! - POST /items/{id}/increment-stock/    - add one unit of stock
//! - POST /items/{id}/delete/             - remove an item
//! - GET /items/json/, /items/json/{id}/  - items as JSON

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::responses::{ApiError, CategoryOption, ItemResponse, PageError};
use crate::api::middleware::AppState;
use crate::models::{CreateItemInput, ItemCategory};
use crate::services::ItemServiceError;
use crate::templates::PageVars;

#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    pub category: Option<String>,
}

/// Raw item form; numbers stay strings until validated so bad input can be echoed back
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    pub name: String,
    pub price: String,
    pub description: String,
    pub category: String,
    pub stock: String,
    pub rating: String,
    pub is_featured: Option<String>,
    pub is_official_merch: Option<String>,
}

impl ItemForm {
    fn blank() -> Self {
        Self {
            price: "0".to_string(),
            category: ItemCategory::default().as_str().to_string(),
            stock: "0".to_string(),
            rating: "0.0".to_string(),
            ..Default::default()
        }
    }

    /// Parse the fields into a create input, collecting every field error
    fn to_input(&self) -> Result<CreateItemInput, Vec<String>> {
        let mut errors = Vec::new();

        let price = parse_field::<i64>(&self.price, "Price", "Enter a whole number.", &mut errors);
        let stock = parse_field::<i32>(&self.stock, "Stock", "Enter a whole number.", &mut errors);
        let rating = parse_field::<f64>(&self.rating, "Rating", "Enter a number.", &mut errors);
        let category = if self.category.trim().is_empty() {
            Some(ItemCategory::default())
        } else {
            match self.category.parse::<ItemCategory>() {
                Ok(category) => Some(category),
                Err(_) => {
                    errors.push(format!(
                        "Category: Select a valid choice. {} is not one of the available choices.",
                        self.category
                    ));
                    None
                }
            }
        };

        match (price, stock, rating, category) {
            (Some(price), Some(stock), Some(rating), Some(category)) if errors.is_empty() => {
                Ok(CreateItemInput::new(self.name.clone(), price, self.description.trim())
                    .with_category(category)
                    .with_stock(stock)
                    .with_rating(rating)
                    .featured(self.is_featured.is_some())
                    .official_merch(self.is_official_merch.is_some()))
            }
            _ => Err(errors),
        }
    }
}

/// Blank numeric fields take zero, matching the model defaults
fn parse_field<T: std::str::FromStr + Default>(
    raw: &str,
    label: &str,
    message: &str,
    errors: &mut Vec<String>,
) -> Option<T> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(T::default());
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(format!("{}: {}", label, message));
            None
        }
    }
}

pub fn category_options() -> Vec<CategoryOption> {
    ItemCategory::ALL
        .iter()
        .map(|c| CategoryOption {
            value: c.as_str(),
            label: c.label(),
        })
        .collect()
}

fn parse_category(raw: Option<&str>) -> Option<ItemCategory> {
    raw.filter(|c| !c.is_empty()).and_then(|c| c.parse().ok())
}

/// GET /items/
pub async fn index(
    State(state): State<AppState>,
    vars: PageVars,
    Query(query): Query<ItemsQuery>,
) -> Result<Response, PageError> {
    let category = parse_category(query.category.as_deref());
    let items: Vec<ItemResponse> = state
        .item_service
        .list(category)
        .await?
        .into_iter()
        .map(ItemResponse::from)
        .collect();

    let mut context = TeraContext::new();
    context.insert("items", &items);
    context.insert("category", category.map(|c| c.as_str()).unwrap_or(""));
    context.insert("categories", &category_options());
    Ok(state.render("items.html", &context, &vars)?.into_response())
}

fn render_item_form(
    state: &AppState,
    vars: &PageVars,
    form: &ItemForm,
    errors: &[String],
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("categories", &category_options());
    context.insert("errors", errors);
    Ok(state.render("create_item.html", &context, vars)?.into_response())
}

/// GET /items/create/
pub async fn create_form(State(state): State<AppState>, vars: PageVars) -> Result<Response, PageError> {
    render_item_form(&state, &vars, &ItemForm::blank(), &[])
}

/// POST /items/create/
pub async fn create(
    State(state): State<AppState>,
    vars: PageVars,
    Form(form): Form<ItemForm>,
) -> Result<Response, PageError> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return render_item_form(&state, &vars, &form, &errors),
    };

    match state.item_service.create(input).await {
        Ok(_) => Ok(Redirect::to("/items/").into_response()),
        Err(ItemServiceError::ValidationError(msg)) => render_item_form(&state, &vars, &form, &[msg]),
        Err(e) => Err(e.into()),
    }
}

/// POST /items/{id}/increment-stock/
pub async fn increment_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = id.parse::<i64>().map_err(|_| PageError::NotFound)?;
    state.item_service.increment_stock(id).await?;
    Ok(Redirect::to("/items/").into_response())
}

/// POST /items/{id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = id.parse::<i64>().map_err(|_| PageError::NotFound)?;
    state.item_service.delete(id).await?;
    Ok(Redirect::to("/items/").into_response())
}

/// GET /items/json/
pub async fn list_json(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let items = state
        .item_service
        .list(parse_category(query.category.as_deref()))
        .await?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// GET /items/json/{id}/
pub async fn detail_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let id = id
        .parse::<i64>()
        .map_err(|_| ApiError::not_found(format!("Item {} not found", id)))?;
    Ok(Json(state.item_service.get(id).await?.into()))
}
