//! Image captioning
//!
//! `caption` is total: safety refusals and service errors come back as
//! `Caption::Blocked` / `Caption::Failed` values rendered as explanatory text.

pub mod gemini;

use async_trait::async_trait;
use std::path::Path;

pub use gemini::GeminiCaptioner;

/// Instruction used by the image tutor
pub const CAPTION_INSTRUCTION: &str = "Generate a detailed caption for the image, explaining what is happening in the scene. The caption should be easy to understand and informative. Make sure to use LATEX for Mathematical and Numerical equations.";

/// Shorter instruction used when explaining a given image
pub const SIMPLE_CAPTION_INSTRUCTION: &str = "Provide a detailed caption for this image.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caption {
    Text(String),
    /// Refused on safety grounds; carries the reported ratings
    Blocked(String),
    Failed(String),
}

impl std::fmt::Display for Caption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Caption::Text(text) => f.write_str(text),
            Caption::Blocked(detail) => {
                write!(f, "Caption generation blocked due to safety concerns: {}", detail)
            }
            Caption::Failed(detail) => write!(f, "Caption generation failed: {}", detail),
        }
    }
}

#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image: &[u8], mime_type: &str, instruction: &str) -> Caption;

    /// Read an image from disk and caption it
    async fn caption_file(&self, path: &Path, instruction: &str) -> Caption {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return Caption::Failed(format!("{}: {}", path.display(), e)),
        };
        let mime_type = mime_for(path, &bytes);
        self.caption(&bytes, mime_type, instruction).await
    }
}

/// MIME type from content, falling back to the extension
pub fn mime_for(path: &Path, bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .or_else(|_| image::ImageFormat::from_path(path))
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg")
}
