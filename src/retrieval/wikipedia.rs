//! Wikipedia lookup: full-text page search, then the REST summary of each hit

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::prompt::clip_chars;
use crate::retrieval::{check_status, RetrievalAdapter, RetrievalSource};

pub struct WikipediaAdapter {
    client: Client,
    base_url: String,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaAdapter {
    pub fn new(client: Client, base_url: &str, top_k: usize, max_chars: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            top_k: top_k.max(1),
            max_chars,
        }
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/w/api.php?action=query&list=search&format=json&utf8=1&srlimit={}&srsearch={}",
            self.base_url,
            self.top_k,
            urlencoding::encode(query)
        );
        let response = check_status("Wikipedia", self.client.get(url).send().await?).await?;
        let payload: Value = response.json().await?;
        Ok(parse_search_titles(&payload, self.top_k))
    }

    async fn summary(&self, title: &str) -> Result<Option<(String, String)>> {
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url,
            urlencoding::encode(&title.replace(' ', "_"))
        );
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status("Wikipedia", response).await?;
        let payload: Value = response.json().await?;
        Ok(parse_summary(&payload))
    }
}

#[async_trait]
impl RetrievalAdapter for WikipediaAdapter {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn source(&self) -> RetrievalSource {
        RetrievalSource::Encyclopedia
    }

    async fn fetch(&self, query: &str) -> Result<Option<String>> {
        let titles = self.search_titles(query).await?;
        debug!(count = titles.len(), "wikipedia titles");

        let mut pages = Vec::new();
        for title in titles {
            if let Some((title, extract)) = self.summary(&title).await? {
                pages.push(format!("Page: {}\nSummary: {}", title, extract));
            }
        }

        if pages.is_empty() {
            return Ok(None);
        }

        let (text, _) = clip_chars(&pages.join("\n\n"), self.max_chars);
        Ok(Some(text))
    }
}

/// Titles from a `list=search` response, in rank order
pub fn parse_search_titles(payload: &Value, limit: usize) -> Vec<String> {
    payload
        .pointer("/query/search")
        .and_then(|v| v.as_array())
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("title").and_then(|t| t.as_str()))
                .filter(|t| !t.is_empty())
                .take(limit)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `(title, extract)` from a page-summary response; disambiguation pages and
/// empty extracts are skipped
pub fn parse_summary(payload: &Value) -> Option<(String, String)> {
    if payload.get("type").and_then(|v| v.as_str()) == Some("disambiguation") {
        return None;
    }
    let title = payload.get("title").and_then(|v| v.as_str())?.to_string();
    let extract = payload.get("extract").and_then(|v| v.as_str())?.trim();
    if extract.is_empty() {
        return None;
    }
    Some((title, extract.to_string()))
}
