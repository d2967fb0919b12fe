use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::{CuratedPost, SubstackConfig};
use crate::feed::{FeedAdapter, FeedItem};

pub struct AppState {
    pub substack: SubstackConfig,
    pub adapter: FeedAdapter,
}

impl AppState {
    pub fn new(substack: SubstackConfig) -> anyhow::Result<Self> {
        let adapter = FeedAdapter::from_config(&substack)?;
        Ok(Self { substack, adapter })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/substack", get(substack_feed))
        .route("/api/substack/curated", get(curated_posts))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<FeedItem>,
    /// Whether the feed URL passed the provider check, regardless of posts
    pub configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratedResponse {
    pub publication_url: String,
    pub curated_posts: Vec<CuratedPost>,
}

// Kept as a raw string so a bad value falls back to the default instead of a 400
#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

pub async fn substack_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let feed_url = &state.substack.feed_url;
    let configured = state.adapter.is_allowed(feed_url);
    let requested = state
        .adapter
        .limits()
        .parse_requested(query.limit.as_deref());

    let posts = state.adapter.fetch_feed_items(feed_url, requested).await;

    let cache_control = format!("public, max-age={}", state.substack.revalidate_secs);
    (
        [(header::CACHE_CONTROL, cache_control)],
        Json(FeedResponse { posts, configured }),
    )
}

pub async fn curated_posts(State(state): State<Arc<AppState>>) -> Json<CuratedResponse> {
    Json(CuratedResponse {
        publication_url: state.substack.publication_url.clone(),
        curated_posts: state.substack.curated_posts.clone(),
    })
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
