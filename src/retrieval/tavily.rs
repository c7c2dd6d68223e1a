//! Tavily search API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::retrieval::{check_status, RetrievalAdapter, RetrievalSource};

pub struct TavilyAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    max_results: usize,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl TavilyAdapter {
    pub fn new(client: Client, base_url: &str, api_key: String, max_results: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl RetrievalAdapter for TavilyAdapter {
    fn name(&self) -> &str {
        "tavily"
    }

    fn source(&self) -> RetrievalSource {
        RetrievalSource::WebSearch
    }

    async fn fetch(&self, query: &str) -> Result<Option<String>> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
        };
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status("Tavily", response).await?;
        let payload: SearchResponse = response.json().await?;
        Ok(join_contents(&payload))
    }
}

/// Page contents joined with single spaces, `None` when nothing came back
pub fn join_contents(payload: &SearchResponse) -> Option<String> {
    let contents: Vec<&str> = payload
        .results
        .iter()
        .map(|r| r.content.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if contents.is_empty() {
        None
    } else {
        Some(contents.join(" "))
    }
}
