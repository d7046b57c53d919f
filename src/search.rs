//! Web search collaborator
//!
//! Research for a topic comes from a search provider restricted to a fixed
//! set of trusted medical domains.

mod tavily;

pub use tavily::TavilyService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Domains a search may return results from
pub const TRUSTED_DOMAINS: [&str; 6] = [
    "mayoclinic.org",
    "healthline.com",
    "webmd.com",
    "medlineplus.gov",
    "cdc.gov",
    "nih.gov",
];

pub const DEFAULT_MAX_RESULTS: u32 = 8;

/// A search invocation built by the search step and executed by the tool step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub include_domains: Vec<String>,
    pub max_results: u32,
}

impl SearchRequest {
    /// Request restricted to the trusted medical domains
    pub fn trusted(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            include_domains: TRUSTED_DOMAINS.iter().map(ToString::to_string).collect(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// A raw result as providers return it. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(String),
    #[error("search provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode search response: {0}")]
    Decode(String),
    #[error("search query is empty")]
    EmptyQuery,
    #[error("search is not configured")]
    Unavailable,
}

/// Common interface for search providers
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError>;

    /// Provider name, for logs
    fn provider(&self) -> &str;
}

#[async_trait]
impl<T: SearchService + ?Sized> SearchService for Arc<T> {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        (**self).search(request).await
    }

    fn provider(&self) -> &str {
        (**self).provider()
    }
}

/// Stand-in used when no search credential is configured. Every call fails,
/// which sends the workflow down its fallback-source path.
pub struct UnavailableSearch;

#[async_trait]
impl SearchService for UnavailableSearch {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::Unavailable)
    }

    fn provider(&self) -> &str {
        "unavailable"
    }
}
