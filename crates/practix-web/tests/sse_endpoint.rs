//! Integration test for SSE endpoint

use axum::body::Body;
use axum::http::{Request, StatusCode};
use practix_core::{CorpusStore, QueryService, SyntheticCorpus};
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn test_sse_endpoint_exists() {
    let snapshot = SyntheticCorpus::demo(50).build().unwrap();
    let service = QueryService::builder(Arc::new(CorpusStore::from_snapshot(snapshot))).build();

    let router = practix_web::create_router(Arc::new(service));

    let request = Request::builder()
        .uri("/api/events")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    // Should return 200 OK with text/event-stream header
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    assert!(content_type.is_some());
    assert!(content_type.unwrap().contains("text/event-stream"));
}
