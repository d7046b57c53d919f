//! Tavily search provider

use super::{SearchError, SearchHit, SearchRequest, SearchService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

pub struct TavilyService {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl TavilyService {
    pub fn new(api_key: String) -> Result<Self, SearchError> {
        Self::with_endpoint(api_key, TAVILY_SEARCH_URL)
    }

    pub fn with_endpoint(api_key: String, endpoint: impl Into<String>) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SearchError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: endpoint.into(),
        })
    }

    fn translate_request<'a>(&'a self, request: &'a SearchRequest) -> TavilyRequest<'a> {
        TavilyRequest {
            api_key: &self.api_key,
            query: request.query.trim(),
            search_depth: "advanced",
            max_results: request.max_results,
            include_domains: &request.include_domains,
        }
    }
}

#[async_trait]
impl SearchService for TavilyService {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.translate_request(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Http(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    SearchError::Http(format!("Connection failed: {e}"))
                } else {
                    SearchError::Http(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }

    fn provider(&self) -> &str {
        "tavily"
    }
}

fn parse_response(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: TavilyResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Decode(e.to_string()))?;
    Ok(parsed.results)
}

// Wire types

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: u32,
    include_domains: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}
