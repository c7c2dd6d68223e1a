//! Retrieval adapters
//!
//! Each adapter wraps one external lookup service behind `lookup`, which
//! never fails: provider errors and empty answers become a sentinel result.
//!
//! Adapters:
//! - Wikipedia: page search + REST summaries (encyclopedia)
//! - DuckDuckGo: instant-answer API (web search)
//! - Tavily: search API, needs `TAVILY_API_KEY` (web search)
//! - Knowledge base: local vector index (vector index)

pub mod duckduckgo;
pub mod knowledge_base;
pub mod tavily;
pub mod wikipedia;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cli::Config;
use crate::credentials::Credentials;
use crate::errors::{Result, TutorError};

pub use duckduckgo::DuckDuckGoAdapter;
pub use knowledge_base::KnowledgeBaseAdapter;
pub use tavily::TavilyAdapter;
pub use wikipedia::WikipediaAdapter;

/// Kind of service a result came from; the declaration order is the
/// order results appear in an assembled prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Encyclopedia,
    WebSearch,
    VectorIndex,
}

impl RetrievalSource {
    /// Label printed in front of this source's block
    pub fn label(&self) -> &'static str {
        match self {
            RetrievalSource::Encyclopedia => "Wikipedia",
            RetrievalSource::WebSearch => "Web Search Results",
            RetrievalSource::VectorIndex => "Knowledge Base",
        }
    }

    /// Fixed placeholder used when a lookup yields nothing
    pub fn sentinel(&self) -> &'static str {
        match self {
            RetrievalSource::Encyclopedia => "No relevant information found on Wikipedia.",
            RetrievalSource::WebSearch => "No relevant web search results found.",
            RetrievalSource::VectorIndex => "No relevant passages found in the knowledge base.",
        }
    }
}

/// Configurable retrieval providers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Wikipedia,
    Duckduckgo,
    Tavily,
}

/// One adapter's answer for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub source: RetrievalSource,
    pub text: String,
    pub found: bool,
}

impl RetrievalResult {
    pub fn found(source: RetrievalSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            found: true,
        }
    }

    pub fn not_found(source: RetrievalSource) -> Self {
        Self {
            source,
            text: source.sentinel().to_string(),
            found: false,
        }
    }
}

/// A single external lookup service.
///
/// Implementors provide the fallible `fetch`; callers use `lookup`, which is
/// total and performs exactly one attempt.
#[async_trait]
pub trait RetrievalAdapter: Send + Sync {
    /// Human-readable adapter name for logs and `/sources`
    fn name(&self) -> &str;

    fn source(&self) -> RetrievalSource;

    /// Query the provider. `Ok(None)` means the provider had nothing.
    async fn fetch(&self, query: &str) -> Result<Option<String>>;

    async fn lookup(&self, query: &str) -> RetrievalResult {
        match self.fetch(query).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                debug!(adapter = self.name(), chars = text.len(), "lookup succeeded");
                RetrievalResult::found(self.source(), text)
            }
            Ok(_) => {
                debug!(adapter = self.name(), "lookup returned nothing");
                RetrievalResult::not_found(self.source())
            }
            Err(e) => {
                warn!(adapter = self.name(), error = %e, "lookup failed");
                RetrievalResult::not_found(self.source())
            }
        }
    }
}

/// HTTP client shared by the retrieval adapters
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tutorbuddy/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(TutorError::Http)
}

/// Turn a non-2xx response into an error carrying the provider name
pub(crate) async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(TutorError::Generic(format!(
        "{} returned HTTP {}: {}",
        provider, status, body
    )))
}

/// Build the web adapters named in the configuration, in configuration order
pub fn build_adapters(
    config: &Config,
    credentials: &Credentials,
) -> Result<Vec<Box<dyn RetrievalAdapter>>> {
    let client = http_client(config.retrieval_timeout())?;
    let retrieval = &config.retrieval;

    let mut adapters: Vec<Box<dyn RetrievalAdapter>> = Vec::new();
    for provider in &retrieval.sources {
        match provider {
            Provider::Wikipedia => adapters.push(Box::new(WikipediaAdapter::new(
                client.clone(),
                &retrieval.wikipedia_url,
                retrieval.wikipedia_top_k,
                retrieval.wikipedia_max_chars,
            ))),
            Provider::Duckduckgo => adapters.push(Box::new(DuckDuckGoAdapter::new(
                client.clone(),
                &retrieval.duckduckgo_url,
                retrieval.result_count,
            ))),
            Provider::Tavily => {
                let key = credentials.tavily_key.clone().ok_or_else(|| {
                    TutorError::MissingCredential {
                        var: "TAVILY_API_KEY".to_string(),
                        purpose: "Tavily search".to_string(),
                    }
                })?;
                adapters.push(Box::new(TavilyAdapter::new(
                    client.clone(),
                    &retrieval.tavily_url,
                    key,
                    retrieval.result_count,
                )))
            }
        }
    }

    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Option<String>>);

    #[async_trait]
    impl RetrievalAdapter for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn source(&self) -> RetrievalSource {
            RetrievalSource::Encyclopedia
        }

        async fn fetch(&self, _query: &str) -> Result<Option<String>> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(TutorError::Generic(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let adapter = Fixed(Ok(Some("Paris is the capital of France.".to_string())));
        let result = adapter.lookup("capital of France").await;
        assert!(result.found);
        assert_eq!(result.text, "Paris is the capital of France.");
    }

    #[tokio::test]
    async fn test_lookup_error_becomes_sentinel() {
        let adapter = Fixed(Err(TutorError::Generic("connection reset".to_string())));
        let result = adapter.lookup("anything").await;
        assert!(!result.found);
        assert_eq!(result.text, RetrievalSource::Encyclopedia.sentinel());
    }

    #[tokio::test]
    async fn test_lookup_blank_becomes_sentinel() {
        let adapter = Fixed(Ok(Some("  \n".to_string())));
        let result = adapter.lookup("anything").await;
        assert!(!result.found);

        let adapter = Fixed(Ok(None));
        assert!(!adapter.lookup("anything").await.found);
    }

    #[test]
    fn test_source_order() {
        let mut sources = vec![
            RetrievalSource::VectorIndex,
            RetrievalSource::WebSearch,
            RetrievalSource::Encyclopedia,
        ];
        sources.sort();
        assert_eq!(
            sources,
            vec![
                RetrievalSource::Encyclopedia,
                RetrievalSource::WebSearch,
                RetrievalSource::VectorIndex
            ]
        );
    }

    #[test]
    fn test_build_adapters_default_order() {
        let config = Config::default();
        let adapters = build_adapters(&config, &Credentials::default()).unwrap();
        let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["wikipedia", "duckduckgo"]);
    }

    #[test]
    fn test_build_adapters_tavily_needs_key() {
        let mut config = Config::default();
        config.retrieval.sources = vec![Provider::Tavily];
        assert!(matches!(
            build_adapters(&config, &Credentials::default()),
            Err(TutorError::MissingCredential { .. })
        ));
    }
}
