//! Catalog transports used by the client runtime
//!
//! [`HttpCatalogClient`] talks to a running `practix serve` over the JSON
//! API; [`LocalCatalogClient`] calls an in-process [`QueryService`]. Both
//! surface failures as [`CoreError`] so the reducer can tell transient
//! errors from permanent ones.

use futures::future::BoxFuture;
use practix_core::{CoreError, QueryService};
use practix_types::{
    Category, CategoryId, CategoryMastery, ListFilters, Page, SearchFilters, SortSpec, UserId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One listing page request
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub category: CategoryId,
    pub filters: ListFilters,
    pub sort: SortSpec,
    pub page: u32,
    pub page_size: u32,
}

/// One search page request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub filters: SearchFilters,
    pub page: u32,
    pub page_size: u32,
}

/// Read access to the catalog
pub trait CatalogClient: Send + Sync + 'static {
    fn overview(&self) -> BoxFuture<'_, Result<Vec<Category>, CoreError>>;

    fn list(&self, request: ListRequest) -> BoxFuture<'_, Result<Page, CoreError>>;

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Page, CoreError>>;

    fn mastery(&self, user: UserId) -> BoxFuture<'_, Result<Vec<CategoryMastery>, CoreError>>;
}

/// Client over an in-process query service
pub struct LocalCatalogClient {
    service: Arc<QueryService>,
}

impl LocalCatalogClient {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }
}

impl CatalogClient for LocalCatalogClient {
    fn overview(&self) -> BoxFuture<'_, Result<Vec<Category>, CoreError>> {
        Box::pin(self.service.overview())
    }

    fn list(&self, request: ListRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async move {
            self.service
                .list(
                    &request.category,
                    &request.filters,
                    &request.sort,
                    request.page,
                    Some(request.page_size),
                )
                .await
        })
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async move {
            self.service
                .search(
                    &request.query,
                    &request.filters,
                    request.page,
                    Some(request.page_size),
                )
                .await
        })
    }

    fn mastery(&self, user: UserId) -> BoxFuture<'_, Result<Vec<CategoryMastery>, CoreError>> {
        Box::pin(async move { self.service.mastery(&user).await })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    kind: String,
    message: String,
}

/// Client over the JSON API of a running server
pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<T, CoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let unavailable = |e: reqwest::Error| {
            debug!(operation, error = %e, "Request failed");
            CoreError::ServiceUnavailable {
                operation: operation.to_string(),
            }
        };

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| CoreError::Remote {
                status: status.as_u16(),
                message: format!("malformed response: {}", e),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(operation, status.as_u16(), &body))
    }
}

/// Rebuild the server's error from its JSON body
fn error_from_response(operation: &str, status: u16, body: &str) -> CoreError {
    let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) else {
        return if status == 503 || status == 502 || status == 504 {
            CoreError::ServiceUnavailable {
                operation: operation.to_string(),
            }
        } else {
            CoreError::Remote {
                status,
                message: body.chars().take(200).collect(),
            }
        };
    };

    match error.kind.as_str() {
        "category_not_found" => CoreError::CategoryNotFound {
            category_id: error.message,
        },
        "invalid_sort" => CoreError::InvalidSort {
            value: error.message,
        },
        "invalid_page" => CoreError::InvalidPage {
            reason: error.message,
        },
        "invalid_filter" => CoreError::InvalidFilter {
            param: operation.to_string(),
            value: error.message,
        },
        "service_unavailable" => CoreError::ServiceUnavailable {
            operation: operation.to_string(),
        },
        _ => CoreError::Remote {
            status,
            message: error.message,
        },
    }
}

fn page_params(page: u32, page_size: u32) -> [(&'static str, String); 2] {
    [
        ("page", page.to_string()),
        ("page_size", page_size.to_string()),
    ]
}

impl CatalogClient for HttpCatalogClient {
    fn overview(&self) -> BoxFuture<'_, Result<Vec<Category>, CoreError>> {
        Box::pin(self.get_json("overview", "/api/categories", Vec::new()))
    }

    fn list(&self, request: ListRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async move {
            let mut query = vec![
                ("sort", request.sort.field.as_str().to_string()),
                ("order", request.sort.order.as_str().to_string()),
            ];
            if let Some(difficulty) = request.filters.difficulty {
                query.push(("difficulty", difficulty.as_str().to_string()));
            }
            query.extend(page_params(request.page, request.page_size));

            let path = format!("/api/categories/{}/items", request.category);
            self.get_json("list", &path, query).await
        })
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async move {
            let mut query = vec![("q", request.query.clone())];
            if let Some(difficulty) = request.filters.difficulty {
                query.push(("difficulty", difficulty.as_str().to_string()));
            }
            if let Some(category) = &request.filters.category {
                query.push(("category", category.to_string()));
            }
            query.extend(page_params(request.page, request.page_size));

            self.get_json("search", "/api/search", query).await
        })
    }

    fn mastery(&self, user: UserId) -> BoxFuture<'_, Result<Vec<CategoryMastery>, CoreError>> {
        Box::pin(async move {
            let path = format!("/api/users/{}/mastery", user);
            self.get_json("mastery", &path, Vec::new()).await
        })
    }
}
