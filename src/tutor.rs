//! Image tutor
//!
//! Two flows built on the generator, the crawler and the captioner:
//! - `process_query`: keyword extraction → crawl one image → caption
//! - `explain_image`: caption a local image → classroom explanation

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{Result, TutorError};
use crate::generation::{GenerationParams, Generator};
use crate::images::{ImageCrawler, MinSize};
use crate::vision::{Caption, Captioner, CAPTION_INSTRUCTION, SIMPLE_CAPTION_INSTRUCTION};

const EXPLANATION_TEMPLATE: &str = "You are a friendly and knowledgeable teacher explaining an image to a 10th-grade student.
Given the following image caption, provide an educational and engaging explanation of what the image might depict:

Caption: {caption}

Please explain the image in a way that's easy for a 10th-grade student to understand. Your explanation should:

1. Identify the main subject of the image and its significance.
2. Relate the image to a possible topic or subject they might be studying in school (e.g., biology, history, literature, maths etc.).
3. Explain any scientific, historical, or cultural concepts relevant to the image.
4. Use simple language and avoid jargon, but introduce new vocabulary when appropriate.
5. Include an interesting fact or two related to the subject of the image.
6. Encourage critical thinking by asking a thought-provoking question at the end.

Remember to be enthusiastic and make the explanation engaging for a young learner!

Explanation:";

pub fn keyword_prompt(query: &str) -> String {
    format!(
        "Extract the main (correctly spelled) keyword for image search from this query: '{}'. Return only the keyword, nothing else.",
        query
    )
}

pub fn explanation_prompt(caption: &str) -> String {
    EXPLANATION_TEMPLATE.replace("{caption}", caption)
}

/// Outcome of an image query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TutorReply {
    Found {
        keyword: String,
        image: PathBuf,
        caption: String,
    },
    CaptionFailed {
        keyword: String,
        image: PathBuf,
        reason: String,
    },
    /// The crawl itself failed
    NoImages { keyword: String },
    /// The crawl finished but left no usable file
    NoSuitableImage { keyword: String },
}

impl std::fmt::Display for TutorReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TutorReply::Found { keyword, image, caption } => write!(
                f,
                "I found an image for '{}'!\n\nImage: {}\n\nHere's what I see: {}",
                keyword,
                image.display(),
                caption
            ),
            TutorReply::CaptionFailed { keyword, reason, .. } => write!(
                f,
                "I found an image for '{}', but I couldn't generate a caption for it. Here's what happened: {}",
                keyword, reason
            ),
            TutorReply::NoImages { keyword } => write!(
                f,
                "I'm sorry, I couldn't find any images for '{}'. Could you try a different query?",
                keyword
            ),
            TutorReply::NoSuitableImage { keyword } => write!(
                f,
                "I'm sorry, I couldn't find any suitable images for '{}'. Could you try a different query?",
                keyword
            ),
        }
    }
}

/// Caption plus explanation of a local image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExplanation {
    pub caption: Caption,
    /// Absent when captioning did not produce text
    pub explanation: Option<String>,
}

impl std::fmt::Display for ImageExplanation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.explanation {
            Some(explanation) => write!(f, "Caption: {}\n\nExplanation: {}", self.caption, explanation),
            None => write!(f, "{}", self.caption),
        }
    }
}

pub struct ImageTutor {
    generator: Arc<dyn Generator>,
    crawler: Arc<dyn ImageCrawler>,
    captioner: Arc<dyn Captioner>,
    params: GenerationParams,
    min_size: MinSize,
    max_images: usize,
}

impl ImageTutor {
    pub fn new(
        generator: Arc<dyn Generator>,
        crawler: Arc<dyn ImageCrawler>,
        captioner: Arc<dyn Captioner>,
        params: GenerationParams,
        min_size: MinSize,
    ) -> Self {
        Self {
            generator,
            crawler,
            captioner,
            params: params.blocking(),
            min_size,
            max_images: 1,
        }
    }

    /// Download up to `max_images` candidates per query; the first stored one is captioned
    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images.max(1);
        self
    }

    /// Ask the model for a single search keyword
    pub async fn extract_keyword(&self, query: &str) -> Result<String> {
        let reply = self.generator.generate(&keyword_prompt(query), &self.params).await?;
        let keyword = clean_keyword(&reply);
        Ok(if keyword.is_empty() { query.trim().to_string() } else { keyword })
    }

    pub async fn process_query(&self, query: &str) -> Result<TutorReply> {
        if query.trim().is_empty() {
            return Err(TutorError::EmptyQuery);
        }

        let keyword = self.extract_keyword(query).await?;
        info!(keyword = %keyword, "searching images");

        let stored = match self.crawler.crawl(&keyword, self.max_images, self.min_size).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "image download failed");
                return Ok(TutorReply::NoImages { keyword });
            }
        };

        let Some(image) = stored.into_iter().next() else {
            return Ok(TutorReply::NoSuitableImage { keyword });
        };

        match self.captioner.caption_file(&image, CAPTION_INSTRUCTION).await {
            Caption::Text(caption) => Ok(TutorReply::Found { keyword, image, caption }),
            other => Ok(TutorReply::CaptionFailed {
                keyword,
                image,
                reason: other.to_string(),
            }),
        }
    }

    pub async fn explain_image(&self, path: &Path) -> Result<ImageExplanation> {
        if !path.is_file() {
            return Err(TutorError::Generic(format!("Image not found: {}", path.display())));
        }

        let caption = self.captioner.caption_file(path, SIMPLE_CAPTION_INSTRUCTION).await;
        let Caption::Text(text) = &caption else {
            return Ok(ImageExplanation { caption, explanation: None });
        };

        let explanation = self
            .generator
            .generate(&explanation_prompt(text), &self.params)
            .await?;
        Ok(ImageExplanation {
            caption,
            explanation: Some(explanation.trim().to_string()),
        })
    }
}

/// First line of a model reply, without quotes or trailing punctuation
fn clean_keyword(reply: &str) -> String {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let line = line.strip_prefix("Keyword:").unwrap_or(line);
    line.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
        .trim()
        .to_string()
}
