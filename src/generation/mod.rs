//! Text generation
//!
//! One outbound call per request, either blocking (full text) or streamed
//! (finite, single-consumer token stream). No automatic retry: transport and
//! API failures go straight back to the caller.

pub mod client;
pub mod sse;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::errors::Result;

pub use client::{HfInferenceClient, DEFAULT_INFERENCE_URL, DEFAULT_MODEL};

/// Incremental text fragments of one generation
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            stream: true,
        }
    }
}

impl GenerationParams {
    pub fn blocking(self) -> Self {
        Self { stream: false, ..self }
    }
}

/// Output of `Generator::run`
pub enum Generation {
    Complete(String),
    Streamed(TokenStream),
}

impl Generation {
    /// Drain into the full text
    pub async fn collect(self) -> Result<String> {
        self.for_each_token(|_| {}).await
    }

    /// Hand every fragment to `on_token` as it arrives and return the full
    /// text. A blocking result is delivered as a single fragment.
    pub async fn for_each_token<F>(self, mut on_token: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        match self {
            Generation::Complete(text) => {
                on_token(&text);
                Ok(text)
            }
            Generation::Streamed(mut stream) => {
                let mut text = String::new();
                while let Some(token) = stream.next().await {
                    let token = token?;
                    on_token(&token);
                    text.push_str(&token);
                }
                Ok(text)
            }
        }
    }
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            Generation::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// A remote text-generation service
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TokenStream>;

    /// Dispatch on `params.stream`
    async fn run(&self, prompt: &str, params: &GenerationParams) -> Result<Generation> {
        if params.stream {
            Ok(Generation::Streamed(self.generate_stream(prompt, params).await?))
        } else {
            Ok(Generation::Complete(self.generate(prompt, params).await?))
        }
    }
}
