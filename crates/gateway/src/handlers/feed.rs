//! Feed listing and score introspection handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;
use validator::{Validate, ValidationError};

use crate::AppState;
use scholarfeed_common::{
    auth::OptionalViewer,
    db::models::FeedEntry,
    db::{FeedOrdering, FeedQueryArgs, FeedView, Repository},
    errors::{AppError, Result},
    metrics,
    scoring::{self, breakdown::ScoreBreakdown, ContentSnapshot, MetricsSnapshot},
};

/// Query parameters for the feed listing
#[derive(Debug, Deserialize, Validate)]
pub struct FeedQuery {
    #[serde(default)]
    pub feed_view: FeedView,

    #[serde(default)]
    pub ordering: FeedOrdering,

    #[validate(custom(function = validate_slug))]
    pub hub_slug: Option<String>,

    pub source: Option<String>,

    pub fundraise_status: Option<String>,

    #[validate(range(min = 1))]
    pub page: Option<u64>,

    #[validate(range(min = 1, max = 100))]
    pub page_size: Option<u64>,

    /// Deployment-level cache key prefix override
    pub feed_type: Option<String>,

    /// Health-check bypass token; forces a cache miss when it matches
    pub disable_cache: Option<String>,
}

fn slug_pattern() -> &'static regex_lite::Regex {
    static SLUG_RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    SLUG_RE.get_or_init(|| {
        regex_lite::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static pattern")
    })
}

fn validate_slug(slug: &str) -> std::result::Result<(), ValidationError> {
    if slug_pattern().is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug"))
    }
}

/// One feed entry as served to clients
#[derive(Debug, Serialize)]
pub struct FeedItem {
    pub id: i64,
    pub content_type: String,
    pub content: serde_json::Value,
    pub action: String,
    pub action_date: chrono::DateTime<chrono::FixedOffset>,
    pub metrics: serde_json::Value,
    pub hot_score: i64,
    pub hot_score_v2: i64,
}

impl From<FeedEntry> for FeedItem {
    fn from(entry: FeedEntry) -> Self {
        Self {
            id: entry.id,
            content_type: entry.content_kind,
            content: entry.content,
            action: entry.action,
            action_date: entry.action_date,
            metrics: entry.metrics,
            hot_score: entry.hot_score,
            hot_score_v2: entry.hot_score_v2,
        }
    }
}

/// Paged feed response envelope
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<FeedItem>,
}

/// List the feed with filters, ranking, and the page cache applied
pub async fn list_feed(
    State(state): State<AppState>,
    OptionalViewer(viewer): OptionalViewer,
    Query(query): Query<FeedQuery>,
) -> Result<Response> {
    let started = Instant::now();

    query.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let args = FeedQueryArgs {
        view: query.feed_view,
        ordering: query.ordering,
        hub_slug: query.hub_slug,
        source: query.source,
        fundraise_status: query.fundraise_status,
        viewer,
        page: query.page.unwrap_or(1),
        page_size: query
            .page_size
            .unwrap_or(state.config.feed.default_page_size)
            .min(state.config.feed.max_page_size),
    };

    let repo = Repository::new(state.db.clone());
    let compute = || async {
        let page = repo.list_feed(&args).await?;
        let response = FeedResponse {
            count: page.total,
            page: args.page,
            page_size: args.page_size,
            results: page.entries.into_iter().map(FeedItem::from).collect(),
        };
        serde_json::to_string(&response).map_err(AppError::from)
    };

    let (body, status) = state
        .feed_cache
        .get_or_compute(
            &args,
            query.feed_type.as_deref(),
            query.disable_cache.as_deref(),
            compute,
        )
        .await?;

    let latency_ms = started.elapsed().as_millis() as u64;
    metrics::record_feed(
        started.elapsed().as_secs_f64(),
        args.view.as_str(),
        status.as_str(),
    );
    tracing::info!(
        view = args.view.as_str(),
        page = args.page,
        cache = status.as_str(),
        latency_ms,
        "Feed listing served"
    );

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response();
    response
        .headers_mut()
        .insert("SF-Cache", HeaderValue::from_static(status.as_str()));
    Ok(response)
}

/// Render the full score computation for one feed entry
pub async fn score_breakdown(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ScoreBreakdown>> {
    let repo = Repository::new(state.db.clone());

    let entry = repo
        .find_entry(id)
        .await?
        .ok_or(AppError::EntryNotFound { id })?;

    let kind = entry.kind().ok_or_else(|| AppError::Internal {
        message: format!(
            "Feed entry {} has unknown content kind '{}'",
            id, entry.content_kind
        ),
    })?;

    let content = ContentSnapshot::from_value(&entry.content);
    let metrics = MetricsSnapshot::from_value(&entry.metrics);
    let rendered = scoring::breakdown::breakdown(
        kind,
        &content,
        &metrics,
        entry.action_date.with_timezone(&Utc),
        Utc::now(),
        &state.config.scoring,
    );

    Ok(Json(rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_validation() {
        assert!(validate_slug("neuroscience").is_ok());
        assert!(validate_slug("molecular-biology-2").is_ok());
        assert!(validate_slug("Bad Slug").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_feed_query_bounds() {
        let query = FeedQuery {
            feed_view: FeedView::Latest,
            ordering: FeedOrdering::Latest,
            hub_slug: None,
            source: None,
            fundraise_status: None,
            page: Some(0),
            page_size: None,
            feed_type: None,
            disable_cache: None,
        };
        assert!(query.validate().is_err());

        let query = FeedQuery {
            page: Some(1),
            page_size: Some(500),
            ..query
        };
        assert!(query.validate().is_err());

        let query = FeedQuery {
            page_size: Some(50),
            ..query
        };
        assert!(query.validate().is_ok());
    }
}
