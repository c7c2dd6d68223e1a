//! Prompt assembly for retrieval-augmented answers
//!
//! The assembler is a pure function of the query, the ordered retrieval
//! results and the configured limits.
//!
//! Truncation policy:
//! - each found result is cut to `max_source_chars`
//! - found results share a `max_context_chars` budget, in order
//! - a found result arriving after the budget is spent is left out
//! - sentinel texts, the query and the instruction are never cut and do
//!   not count against the budget

use serde::{Deserialize, Serialize};

use crate::cli::config::PromptLimits;
use crate::retrieval::{RetrievalResult, RetrievalSource};

pub const CONTEXT_HEADER: &str = "Based on the following information:";
pub const INSTRUCTION: &str =
    "Provide a comprehensive and accurate answer, combining the above information with your own knowledge:";
pub const TRUNCATION_MARKER: &str = " [truncated]";

/// A prompt built for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDocument {
    pub text: String,
    /// Whether any retrieved text was shortened
    pub truncated: bool,
}

impl std::fmt::Display for PromptDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    limits: PromptLimits,
}

impl PromptAssembler {
    pub fn new() -> Self {
        Self::with_limits(PromptLimits::default())
    }

    pub fn with_limits(limits: PromptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PromptLimits {
        &self.limits
    }

    pub fn assemble(&self, query: &str, results: &[RetrievalResult]) -> PromptDocument {
        let mut budget = self.limits.max_context_chars;
        let mut truncated = false;
        let mut blocks = Vec::with_capacity(results.len());

        for result in results {
            if !result.found {
                blocks.push(format_block(result.source, &result.text));
                continue;
            }

            let limit = self.limits.max_source_chars.min(budget);
            if limit == 0 {
                truncated = true;
                continue;
            }
            let (text, cut) = clip_chars(&result.text, limit);
            truncated |= cut;
            budget -= result.text.chars().count().min(limit);
            blocks.push(format_block(result.source, &text));
        }

        let mut prompt = String::new();
        if !blocks.is_empty() {
            prompt.push_str(CONTEXT_HEADER);
            prompt.push_str("\n\n");
            for block in &blocks {
                prompt.push_str(block);
                prompt.push_str("\n\n");
            }
        }
        prompt.push_str("User question: ");
        prompt.push_str(query);
        prompt.push_str("\n\n");
        prompt.push_str(INSTRUCTION);

        PromptDocument {
            text: prompt,
            truncated,
        }
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn format_block(source: RetrievalSource, text: &str) -> String {
    match source {
        RetrievalSource::Encyclopedia => format!("{}: '{}'", source.label(), text),
        _ => format!("{}:\n{}", source.label(), text),
    }
}

/// Cut `text` to at most `max` characters on a char boundary, appending
/// the truncation marker when something was removed
pub fn clip_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        None => (text.to_string(), false),
        Some((byte_idx, _)) => {
            let mut clipped = text[..byte_idx].trim_end().to_string();
            clipped.push_str(TRUNCATION_MARKER);
            (clipped, true)
        }
    }
}
