//! Web router using Axum

use crate::error::ApiError;
use crate::sse;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use practix_core::{CoreError, HealthReport, QueryService};
use practix_types::{
    Category, CategoryId, CategoryMastery, ItemId, ListFilters, Page, ProgressMarker,
    SearchFilters, SortSpec, UserId,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<QueryService>;

/// Create the web router
pub fn create_router(service: Arc<QueryService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/categories", get(overview_handler))
        .route("/api/categories/{id}/items", get(list_handler))
        .route("/api/search", get(search_handler))
        .route("/api/users/{user_id}/mastery", get(mastery_handler))
        .route("/api/progress", post(progress_handler))
        .route("/api/admin/reload", post(reload_handler))
        .route("/api/health", get(health_handler))
        .route("/api/events", get(sse_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Raw listing parameters; parsed into closed types by the handler so that
/// every rejection uses the API error shape
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub difficulty: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub difficulty: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub item_id: ItemId,
    pub confidence_level: u8,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub categories_loaded: usize,
    pub files_scanned: usize,
    pub items_loaded: usize,
    pub items_skipped: usize,
    pub warnings: usize,
    pub errors: usize,
    pub fatal: usize,
}

fn parse_page(raw: Option<&str>) -> Result<u32, CoreError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(1),
        Some(value) => value
            .parse()
            .map_err(|_| CoreError::invalid_page(format!("page must be a positive integer, got '{}'", value))),
    }
}

fn parse_page_size(raw: Option<&str>) -> Result<Option<u32>, CoreError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            CoreError::invalid_page(format!("page_size must be a positive integer, got '{}'", value))
        }),
    }
}

async fn overview_handler(State(service): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(service.overview().await?))
}

async fn list_handler(
    State(service): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, ApiError> {
    let filters = ListFilters::parse(params.difficulty.as_deref())?;
    let sort = SortSpec::parse(params.sort.as_deref(), params.order.as_deref())?;
    let page = parse_page(params.page.as_deref())?;
    let page_size = parse_page_size(params.page_size.as_deref())?;

    let page = service
        .list(&CategoryId::from(id), &filters, &sort, page, page_size)
        .await?;
    Ok(Json(page))
}

async fn search_handler(
    State(service): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page>, ApiError> {
    let filters = SearchFilters::parse(params.difficulty.as_deref(), params.category.as_deref())?;
    let page = parse_page(params.page.as_deref())?;
    let page_size = parse_page_size(params.page_size.as_deref())?;

    Ok(Json(service.search(&params.q, &filters, page, page_size).await?))
}

async fn mastery_handler(
    State(service): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CategoryMastery>>, ApiError> {
    Ok(Json(service.mastery(&UserId::from(user_id)).await?))
}

async fn progress_handler(
    State(service): State<AppState>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.confidence_level > 5 {
        return Err(CoreError::InvalidFilter {
            param: "confidence_level".to_string(),
            value: request.confidence_level.to_string(),
        }
        .into());
    }

    let marker = ProgressMarker {
        user_id: request.user_id,
        item_id: request.item_id,
        confidence_level: request.confidence_level,
        updated_at: request.updated_at.unwrap_or_else(Utc::now),
    };
    service.record_progress(marker, request.category_id).await?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

async fn reload_handler(State(service): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let report = service.reload_corpus().await?;
    let (warnings, errors, fatal) = report.error_count();
    Ok(Json(ReloadResponse {
        categories_loaded: report.categories_loaded,
        files_scanned: report.files_scanned,
        items_loaded: report.items_loaded,
        items_skipped: report.items_skipped,
        warnings,
        errors,
        fatal,
    }))
}

async fn health_handler(State(service): State<AppState>) -> Json<HealthReport> {
    Json(service.health())
}

/// SSE endpoint for invalidation notices
async fn sse_handler(
    State(service): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse::create_sse_stream(service.events().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_parsing() {
        assert_eq!(parse_page(None).unwrap(), 1);
        assert_eq!(parse_page(Some(" 3 ")).unwrap(), 3);
        assert!(matches!(parse_page(Some("-1")), Err(CoreError::InvalidPage { .. })));
        assert_eq!(parse_page_size(Some("")).unwrap(), None);
        assert!(parse_page_size(Some("lots")).is_err());
    }
}
