//! Image crawling
//!
//! Downloads search-result images for a keyword into `<root>/<keyword>/`,
//! named `000001.<ext>`, `000002.<ext>`, ... in result order.
//! - Format detected from content, not from the URL
//! - Images smaller than the minimum size are discarded
//! - A failed download skips to the next result

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::errors::{Result, TutorError};

pub const DEFAULT_SEARCH_URL: &str = "https://www.bing.com/images/async";

/// Minimum accepted (width, height) in pixels
pub type MinSize = (u32, u32);

#[async_trait]
pub trait ImageCrawler: Send + Sync {
    /// Download up to `max_num` images and return the stored paths in
    /// result order; an empty result is not an error
    async fn crawl(&self, keyword: &str, max_num: usize, min_size: MinSize) -> Result<Vec<PathBuf>>;
}

pub struct BingImageCrawler {
    client: Client,
    search_url: String,
    root_dir: PathBuf,
}

impl BingImageCrawler {
    pub fn new(client: Client, search_url: &str, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            search_url: search_url.to_string(),
            root_dir: root_dir.into(),
        }
    }

    /// Directory that images for `keyword` are written to
    pub fn keyword_dir(&self, keyword: &str) -> PathBuf {
        self.root_dir.join(sanitize_keyword(keyword))
    }

    async fn search(&self, keyword: &str, count: usize) -> Result<Vec<String>> {
        let count = (count.max(1) * 4).to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", keyword),
                ("first", "0"),
                ("count", count.as_str()),
                ("adlt", "moderate"),
            ])
            .send()
            .await
            .map_err(|e| TutorError::Crawl(format!("Image search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(TutorError::Crawl(format!(
                "Image search returned HTTP {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| TutorError::Crawl(format!("Failed to read search page: {}", e)))?;
        Ok(extract_image_urls(&html))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageCrawler for BingImageCrawler {
    async fn crawl(&self, keyword: &str, max_num: usize, min_size: MinSize) -> Result<Vec<PathBuf>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(TutorError::EmptyQuery);
        }

        let dir = self.keyword_dir(keyword);
        tokio::fs::create_dir_all(&dir).await?;

        let urls = self.search(keyword, max_num).await?;
        info!(keyword, candidates = urls.len(), "image search complete");

        let mut saved = Vec::new();
        for url in urls {
            if saved.len() >= max_num {
                break;
            }
            let bytes = match self.download(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(url = %url, error = %e, "download failed");
                    continue;
                }
            };
            match store_image(&dir, saved.len() + 1, &bytes, min_size) {
                Ok(Some(path)) => saved.push(path),
                Ok(None) => debug!(url = %url, "image rejected"),
                Err(e) => warn!(url = %url, error = %e, "could not store image"),
            }
        }

        Ok(saved)
    }
}

fn murl_pattern() -> &'static Regex {
    static MURL: OnceLock<Regex> = OnceLock::new();
    MURL.get_or_init(|| {
        Regex::new(r#"murl(?:&quot;|")\s*:\s*(?:&quot;|")(.*?)(?:&quot;|")"#)
            .expect("valid murl pattern")
    })
}

/// Original-image URLs from a Bing results page, in page order, deduplicated
pub fn extract_image_urls(html: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for caps in murl_pattern().captures_iter(html) {
        let url = caps[1].replace("&amp;", "&");
        if url.starts_with("http") && !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Path-safe directory name for a keyword
pub fn sanitize_keyword(keyword: &str) -> String {
    let cleaned: String = keyword
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write `bytes` as image number `index` if it decodes and meets `min_size`.
///
/// Returns `Ok(None)` for unrecognised or undersized images.
pub fn store_image(dir: &Path, index: usize, bytes: &[u8], min_size: MinSize) -> Result<Option<PathBuf>> {
    let Ok(format) = image::guess_format(bytes) else {
        return Ok(None);
    };
    let ext = format.extensions_str().first().copied().unwrap_or("img");
    let path = dir.join(format!("{:06}.{}", index, ext));
    std::fs::write(&path, bytes)?;

    match image::image_dimensions(&path) {
        Ok((width, height)) if width >= min_size.0 && height >= min_size.1 => Ok(Some(path)),
        _ => {
            std::fs::remove_file(&path)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_extract_image_urls() {
        let html = r#"<a class="iusc" m="{&quot;cid&quot;:&quot;1&quot;,&quot;murl&quot;:&quot;https://upload.example.org/cell.jpg&quot;,&quot;turl&quot;:&quot;https://tse.example/th&quot;}">
            <a class="iusc" m="{&quot;murl&quot;:&quot;https://img.example.com/a.png?w=1&amp;h=2&quot;}">
            <a class="iusc" m="{&quot;murl&quot;:&quot;https://upload.example.org/cell.jpg&quot;}">"#;
        assert_eq!(
            extract_image_urls(html),
            vec![
                "https://upload.example.org/cell.jpg".to_string(),
                "https://img.example.com/a.png?w=1&h=2".to_string(),
            ]
        );
        assert!(extract_image_urls("<html>no results</html>").is_empty());
    }

    #[test]
    fn test_extract_unescaped_json() {
        let html = r#"{"murl":"https://a.example/x.gif","purl":"https://a.example"}"#;
        assert_eq!(extract_image_urls(html), vec!["https://a.example/x.gif".to_string()]);
    }

    #[test]
    fn test_sanitize_keyword() {
        assert_eq!(sanitize_keyword("Mitochondria"), "Mitochondria");
        assert_eq!(sanitize_keyword("AC/DC"), "AC_DC");
        assert_eq!(sanitize_keyword(".."), "_");
    }

    #[test]
    fn test_store_image_names_and_filters() {
        let dir = tempfile::tempdir().unwrap();

        let path = store_image(dir.path(), 1, &png(200, 150), (100, 100)).unwrap().unwrap();
        assert_eq!(path, dir.path().join("000001.png"));
        assert!(path.is_file());

        assert!(store_image(dir.path(), 2, &png(50, 300), (100, 100)).unwrap().is_none());
        assert!(!dir.path().join("000002.png").exists());

        assert!(store_image(dir.path(), 2, b"<html>not an image</html>", (1, 1)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_search_errors() {
        let root = tempfile::tempdir().unwrap();
        let client = Client::builder().timeout(Duration::from_secs(2)).build().unwrap();
        let crawler = BingImageCrawler::new(client, "http://127.0.0.1:9/images", root.path());

        let result = crawler.crawl("mitochondria", 1, (100, 100)).await;
        assert!(matches!(result, Err(TutorError::Crawl(_))));
        assert!(crawler.keyword_dir("mitochondria").is_dir());
    }
}
