//! Hugging Face inference streaming client
//!
//! Wraps the hosted text-generation endpoint:
//! - Endpoint: POST {base_url}/{model}
//! - Auth: bearer token
//! - Blocking: `[{"generated_text": ...}]`
//! - Streaming: server-sent events, one token per `data:` line

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Result, TutorError};
use crate::generation::sse::{parse_token, SseDecoder};
use crate::generation::{GenerationParams, Generator, TokenStream};

/// Default inference API endpoint
pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

/// Default model
pub const DEFAULT_MODEL: &str = "mistralai/Mixtral-8x7B-Instruct-v0.1";

/// Request timeout (120 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Hosted text-generation client
#[derive(Debug, Clone)]
pub struct HfInferenceClient {
    client: Client,
    base_url: String,
    model: String,
    token: String,
}

impl HfInferenceClient {
    /// Create client with default endpoint and model
    pub fn new(token: String) -> Result<Self> {
        Self::with_config(DEFAULT_INFERENCE_URL, DEFAULT_MODEL, token, REQUEST_TIMEOUT)
    }

    /// Create client with custom configuration
    pub fn with_config(base_url: &str, model: &str, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TutorError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            token,
        })
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }

    async fn send(&self, prompt: &str, params: &GenerationParams, stream: bool) -> Result<reqwest::Response> {
        let request = GenerateRequest::new(prompt, params, stream);
        debug!(model = %self.model, stream, prompt_chars = prompt.len(), "sending generation request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| TutorError::InferenceApi(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TutorError::InferenceApi(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl Generator for HfInferenceClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let response = self.send(prompt, params, false).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| TutorError::InferenceApi(format!("Failed to parse response: {}", e)))?;
        parse_generated_text(&payload)
    }

    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TokenStream> {
        let response = self.send(prompt, params, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TutorError::StreamingError(e.to_string())));
        Ok(decode_token_stream(bytes))
    }
}

/// Inference API generate request
#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    do_sample: bool,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Clone, Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, params: &GenerationParams, stream: bool) -> Self {
        // The endpoint rejects temperature 0; greedy decoding is do_sample=false.
        let sample = params.temperature > 0.0;
        Self {
            inputs: prompt,
            parameters: GenerateParameters {
                temperature: sample.then_some(params.temperature),
                do_sample: sample,
                max_new_tokens: params.max_tokens,
                return_full_text: false,
            },
            stream,
            options: RequestOptions { wait_for_model: true },
        }
    }
}

/// Extract the text of a blocking response
pub fn parse_generated_text(payload: &Value) -> Result<String> {
    if let Some(error) = payload.get("error").and_then(|v| v.as_str()) {
        return Err(TutorError::InferenceApi(error.to_string()));
    }

    let item = match payload {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    item.and_then(|v| v.get("generated_text"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| TutorError::InferenceApi(format!("Unexpected response shape: {}", payload)))
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn a raw SSE byte stream into a token stream
pub fn decode_token_stream<S>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<bytes::Bytes>> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::try_unfold(state, next_token))
}

async fn next_token<S>(mut state: DecodeState<S>) -> Result<Option<(String, DecodeState<S>)>>
where
    S: Stream<Item = Result<bytes::Bytes>> + Send + 'static,
{
    loop {
        if let Some(token) = state.pending.pop_front() {
            return Ok(Some((token, state)));
        }
        if state.finished {
            return Ok(None);
        }

        match state.bytes.next().await {
            Some(chunk) => {
                for data in state.decoder.push(&chunk?)? {
                    if let Some(token) = parse_token(&data)? {
                        state.pending.push_back(token);
                    }
                }
            }
            None => {
                state.finished = true;
                if let Some(data) = state.decoder.finish() {
                    if let Some(token) = parse_token(&data)? {
                        state.pending.push_back(token);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use serde_json::json;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        let items: Vec<Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        stream::iter(items)
    }

    async fn drain(mut tokens: TokenStream) -> Result<Vec<String>> {
        let mut out = Vec::new();
        while let Some(token) = tokens.next().await {
            out.push(token?);
        }
        Ok(out)
    }

    #[test]
    fn test_client_creation() {
        let client = HfInferenceClient::new("hf_test".to_string()).unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_INFERENCE_URL);
    }

    #[test]
    fn test_client_with_config() {
        let client = HfInferenceClient::with_config(
            "http://localhost:8080/",
            "mistralai/Mistral-7B-Instruct-v0.3",
            "hf_test".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.endpoint(), "http://localhost:8080/mistralai/Mistral-7B-Instruct-v0.3");
    }

    #[test]
    fn test_request_body() {
        let params = GenerationParams { temperature: 0.8, max_tokens: 512, stream: true };
        let body = serde_json::to_value(GenerateRequest::new("hi", &params, true)).unwrap();
        assert_eq!(body["inputs"], "hi");
        assert_eq!(body["stream"], true);
        assert_eq!(body["parameters"]["max_new_tokens"], 512);
        assert_eq!(body["parameters"]["return_full_text"], false);
        assert!(body["parameters"]["temperature"].is_number());
    }

    #[test]
    fn test_request_body_greedy() {
        let params = GenerationParams { temperature: 0.0, max_tokens: 16, stream: false };
        let body = serde_json::to_value(GenerateRequest::new("hi", &params, false)).unwrap();
        assert!(body["parameters"].get("temperature").is_none());
        assert_eq!(body["parameters"]["do_sample"], false);
    }

    #[test]
    fn test_parse_generated_text() {
        let payload = json!([{"generated_text": " Paris."}]);
        assert_eq!(parse_generated_text(&payload).unwrap(), " Paris.");

        let payload = json!({"generated_text": "Rome."});
        assert_eq!(parse_generated_text(&payload).unwrap(), "Rome.");
    }

    #[test]
    fn test_parse_generated_text_error() {
        let payload = json!({"error": "Model is currently loading"});
        assert!(matches!(
            parse_generated_text(&payload),
            Err(TutorError::InferenceApi(ref m)) if m.contains("loading")
        ));
        assert!(parse_generated_text(&json!([])).is_err());
    }

    #[tokio::test]
    async fn test_decode_tokens_across_chunks() {
        let bytes = chunks(&[
            "data: {\"token\":{\"text\":\" Paris\",\"special\":false}}\n\ndata: {\"tok",
            "en\":{\"text\":\" is\",\"special\":false}}\n\n",
            "data: {\"token\":{\"text\":\"</s>\",\"special\":true},\"generated_text\":\" Paris is\"}\n\n",
        ]);
        let tokens = drain(decode_token_stream(bytes)).await.unwrap();
        assert_eq!(tokens, vec![" Paris", " is"]);
    }

    #[tokio::test]
    async fn test_decode_trailing_line_without_newline() {
        let bytes = chunks(&["data: {\"token\":{\"text\":\"end\",\"special\":false}}"]);
        let tokens = drain(decode_token_stream(bytes)).await.unwrap();
        assert_eq!(tokens, vec!["end"]);
    }

    #[tokio::test]
    async fn test_decode_transport_error() {
        let items: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"token\":{\"text\":\"a\",\"special\":false}}\n")),
            Err(TutorError::StreamingError("reset".to_string())),
        ];
        let mut tokens = decode_token_stream(stream::iter(items));
        assert_eq!(tokens.next().await.unwrap().unwrap(), "a");
        assert!(tokens.next().await.unwrap().is_err());
        assert!(tokens.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors() {
        let client = HfInferenceClient::with_config(
            "http://127.0.0.1:9",
            DEFAULT_MODEL,
            "hf_test".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let result = client.generate("hello", &GenerationParams::default()).await;
        assert!(matches!(result, Err(TutorError::InferenceApi(_))));
    }
}
