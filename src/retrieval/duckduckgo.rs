//! DuckDuckGo instant-answer search

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;
use crate::retrieval::{check_status, RetrievalAdapter, RetrievalSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
}

/// Web search over the DuckDuckGo instant-answer API.
///
/// This is not a full web search. For most queries the API returns no
/// abstract and only a handful of `RelatedTopics` entries, so hits are
/// topic one-liners rather than page snippets. Set `TAVILY_API_KEY` for
/// real web results.
pub struct DuckDuckGoAdapter {
    client: Client,
    base_url: String,
    result_count: usize,
}

impl DuckDuckGoAdapter {
    pub fn new(client: Client, base_url: &str, result_count: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            result_count: result_count.max(1),
        }
    }

    /// Ordered `{title, snippet}` hits for a query
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = format!(
            "{}/?q={}&format=json&no_redirect=1&no_html=1",
            self.base_url,
            urlencoding::encode(query)
        );
        let response = check_status("DuckDuckGo", self.client.get(url).send().await?).await?;
        // The API answers with `application/x-javascript`, so decode by hand.
        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)?;
        Ok(parse_hits(&payload, self.result_count))
    }
}

#[async_trait]
impl RetrievalAdapter for DuckDuckGoAdapter {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn source(&self) -> RetrievalSource {
        RetrievalSource::WebSearch
    }

    async fn fetch(&self, query: &str) -> Result<Option<String>> {
        let hits = self.search(query).await?;
        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(format_hits(&hits)))
    }
}

pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("Title: {}\nSnippet: {}", h.title, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abstract first, then results and related topics (nested groups flattened)
pub fn parse_hits(payload: &Value, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = payload
        .get("AbstractText")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !abstract_text.is_empty() {
        let heading = payload
            .get("Heading")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| abstract_text.split(" - ").next().unwrap_or(abstract_text));
        hits.push(SearchHit {
            title: heading.to_string(),
            snippet: abstract_text.to_string(),
        });
    }

    for key in ["Results", "RelatedTopics"] {
        if let Some(items) = payload.get(key).and_then(|v| v.as_array()) {
            collect_topics(items, &mut hits);
        }
    }

    hits.truncate(limit);
    hits
}

fn collect_topics(items: &[Value], hits: &mut Vec<SearchHit>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            collect_topics(topics, hits);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() {
            continue;
        }
        hits.push(SearchHit {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            snippet: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::http_client;
    use serde_json::json;
    use std::time::Duration;

    fn sample() -> Value {
        json!({
            "Heading": "Mitochondrion",
            "AbstractText": "A mitochondrion is an organelle found in most cells.",
            "Results": [],
            "RelatedTopics": [
                {"Text": "Cellular respiration - The process cells use to make ATP.", "FirstURL": "u1"},
                {"Name": "Biology", "Topics": [
                    {"Text": "Organelle - A specialized subunit within a cell.", "FirstURL": "u2"},
                    {"Text": "", "FirstURL": "u3"}
                ]},
                {"Text": "ATP synthase - An enzyme.", "FirstURL": "u4"}
            ]
        })
    }

    #[test]
    fn test_parse_hits_order_and_limit() {
        let hits = parse_hits(&sample(), 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Mitochondrion");
        assert_eq!(hits[1].title, "Cellular respiration");
        assert_eq!(hits[2].title, "Organelle");
    }

    #[test]
    fn test_parse_hits_empty_payload() {
        assert!(parse_hits(&json!({"AbstractText": "", "RelatedTopics": []}), 3).is_empty());
    }

    #[test]
    fn test_parse_hits_related_topics_only() {
        let payload = json!({
            "Heading": "",
            "AbstractText": "",
            "Results": [],
            "RelatedTopics": [
                {"Text": "Photosynthesis - Process used by plants to convert light.", "FirstURL": "u1"},
                {"Text": "Chlorophyll - A green pigment.", "FirstURL": "u2"}
            ]
        });
        let hits = parse_hits(&payload, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Photosynthesis");
        assert_eq!(hits[1].snippet, "Chlorophyll - A green pigment.");
    }

    #[test]
    fn test_format_hits() {
        let hits = vec![
            SearchHit { title: "A".to_string(), snippet: "first".to_string() },
            SearchHit { title: "B".to_string(), snippet: "second".to_string() },
        ];
        assert_eq!(format_hits(&hits), "Title: A\nSnippet: first\nTitle: B\nSnippet: second");
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_sentinel() {
        let client = http_client(Duration::from_secs(2)).unwrap();
        let adapter = DuckDuckGoAdapter::new(client, "http://127.0.0.1:9", 3);
        let result = adapter.lookup("mitochondria").await;
        assert!(!result.found);
        assert_eq!(result.text, RetrievalSource::WebSearch.sentinel());
    }
}
