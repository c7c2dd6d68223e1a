//! API keys read once from the process environment
//!
//! Keys are resolved at startup and handed to the clients that need them.
//! A missing required key aborts before any network call is made.

use crate::errors::{Result, TutorError};

pub const INFERENCE_TOKEN_VARS: &[&str] = &["HUGGINGFACEHUB_API_TOKEN", "huggingfacehub_api_token"];
pub const TAVILY_KEY_VARS: &[&str] = &["TAVILY_API_KEY"];
pub const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "Gemini_api_key"];
pub const EMBEDDING_KEY_VARS: &[&str] = &["HF_EMBEDDING_API_KEY", "embedding_api_key"];

/// Which services a command is about to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub inference: bool,
    pub tavily: bool,
    pub vision: bool,
    pub embedding: bool,
}

/// Resolved API keys
#[derive(Clone, Default)]
pub struct Credentials {
    pub inference_token: Option<String>,
    pub tavily_key: Option<String>,
    pub gemini_key: Option<String>,
    pub embedding_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("inference_token", &mask(&self.inference_token))
            .field("tavily_key", &mask(&self.tavily_key))
            .field("gemini_key", &mask(&self.gemini_key))
            .field("embedding_key", &mask(&self.embedding_key))
            .finish()
    }
}

impl Credentials {
    /// Read keys from the real process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read keys through an arbitrary lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let inference_token = first(INFERENCE_TOKEN_VARS);
        let embedding_key = first(EMBEDDING_KEY_VARS).or_else(|| inference_token.clone());

        Self {
            inference_token,
            tavily_key: first(TAVILY_KEY_VARS),
            gemini_key: first(GEMINI_KEY_VARS),
            embedding_key,
        }
    }

    /// Fail on the first required key that is missing
    pub fn require(&self, needs: Requirements) -> Result<()> {
        let checks = [
            (needs.inference, &self.inference_token, INFERENCE_TOKEN_VARS[0], "text generation"),
            (needs.tavily, &self.tavily_key, TAVILY_KEY_VARS[0], "Tavily search"),
            (needs.vision, &self.gemini_key, GEMINI_KEY_VARS[0], "image captioning"),
            (needs.embedding, &self.embedding_key, EMBEDDING_KEY_VARS[0], "embeddings"),
        ];

        for (needed, value, var, purpose) in checks {
            if needed && value.is_none() {
                return Err(TutorError::MissingCredential {
                    var: var.to_string(),
                    purpose: purpose.to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn inference_token(&self) -> Result<&str> {
        self.inference_token.as_deref().ok_or_else(|| TutorError::MissingCredential {
            var: INFERENCE_TOKEN_VARS[0].to_string(),
            purpose: "text generation".to_string(),
        })
    }
}
