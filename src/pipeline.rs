//! Retrieval-augmented answer pipeline
//!
//! Linear sequence per query: retrieve → assemble → generate → log.
//! - Adapters are called one after another, each exactly once
//! - Results are ordered by source before assembly
//! - Generation errors propagate; retrieval errors never do

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{Result, TutorError};
use crate::generation::{GenerationParams, Generator, TokenStream};
use crate::prompt::{PromptAssembler, PromptDocument};
use crate::retrieval::{RetrievalAdapter, RetrievalResult};
use crate::session::{Role, SessionLog};

/// Result of a blocking end-to-end run
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Original query
    pub query: String,
    /// Prompt sent to the generator
    pub prompt: PromptDocument,
    /// One result per configured adapter, in source order
    pub results: Vec<RetrievalResult>,
    /// Generated text
    pub response: String,
}

/// End-to-end pipeline with explicitly injected collaborators
pub struct TutorPipeline {
    adapters: Vec<Box<dyn RetrievalAdapter>>,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
    params: GenerationParams,
}

impl TutorPipeline {
    /// Create new pipeline
    pub fn new(
        adapters: Vec<Box<dyn RetrievalAdapter>>,
        assembler: PromptAssembler,
        generator: Arc<dyn Generator>,
        params: GenerationParams,
    ) -> Self {
        Self {
            adapters,
            assembler,
            generator,
            params,
        }
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Toggle streamed generation for later turns
    pub fn set_stream(&mut self, stream: bool) {
        self.params.stream = stream;
    }

    /// Run every adapter once, then order results by source
    pub async fn retrieve(&self, query: &str) -> Vec<RetrievalResult> {
        let mut results = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            results.push(adapter.lookup(query).await);
        }
        // stable: same-source adapters keep configuration order
        results.sort_by_key(|r| r.source);
        results
    }

    /// Validate the query, retrieve and assemble its prompt
    pub async fn prepare(&self, query: &str) -> Result<PromptDocument> {
        let (_, prompt) = self.gather(query).await?;
        Ok(prompt)
    }

    /// Full blocking run
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let (results, prompt) = self.gather(query).await?;
        let response = self
            .generator
            .generate(&prompt.text, &self.params.blocking())
            .await?;

        Ok(Answer {
            query: query.trim().to_string(),
            prompt,
            results,
            response,
        })
    }

    /// Prepare the prompt and open a token stream for it
    pub async fn answer_stream(&self, query: &str) -> Result<(PromptDocument, TokenStream)> {
        let (_, prompt) = self.gather(query).await?;
        let stream_params = GenerationParams {
            stream: true,
            ..self.params
        };
        let tokens = self
            .generator
            .generate_stream(&prompt.text, &stream_params)
            .await?;
        Ok((prompt, tokens))
    }

    /// One interactive turn.
    ///
    /// The user message is logged before generation; the assistant message
    /// only when generation completes.
    pub async fn respond<F>(&self, session: &mut SessionLog, query: &str, on_token: F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let query = validate(query)?;
        session.append(Role::User, query);

        let results = self.retrieve(query).await;
        let prompt = self.assembler.assemble(query, &results);

        let text = self
            .generator
            .run(&prompt.text, &self.params)
            .await?
            .for_each_token(on_token)
            .await?;

        session.append(Role::Assistant, text.clone());
        info!(session = %session.id(), messages = session.len(), "turn complete");
        Ok(text)
    }

    async fn gather(&self, query: &str) -> Result<(Vec<RetrievalResult>, PromptDocument)> {
        let query = validate(query)?;
        let results = self.retrieve(query).await;
        let prompt = self.assembler.assemble(query, &results);
        debug!(
            sources = results.len(),
            found = results.iter().filter(|r| r.found).count(),
            prompt_chars = prompt.text.len(),
            truncated = prompt.truncated,
            "prompt assembled"
        );
        Ok((results, prompt))
    }
}

fn validate(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TutorError::EmptyQuery);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::INSTRUCTION;
    use crate::retrieval::RetrievalSource;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubAdapter {
        name: &'static str,
        source: RetrievalSource,
        reply: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl StubAdapter {
        fn boxed(
            name: &'static str,
            source: RetrievalSource,
            reply: Option<&'static str>,
            calls: &Arc<AtomicUsize>,
        ) -> Box<dyn RetrievalAdapter> {
            Box::new(Self { name, source, reply, calls: Arc::clone(calls) })
        }
    }

    #[async_trait]
    impl RetrievalAdapter for StubAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn source(&self) -> RetrievalSource {
            self.source
        }

        async fn fetch(&self, _query: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(text) => Ok(Some(text.to_string())),
                None => Err(TutorError::Generic("service unavailable".to_string())),
            }
        }
    }

    /// Returns the prompt unchanged, streamed word by word
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok(prompt.to_string())
        }

        async fn generate_stream(&self, prompt: &str, _params: &GenerationParams) -> Result<TokenStream> {
            let tokens: Vec<Result<String>> =
                prompt.split_inclusive(' ').map(|t| Ok(t.to_string())).collect();
            Ok(Box::pin(stream::iter(tokens)))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Err(TutorError::InferenceApi("HTTP 503: overloaded".to_string()))
        }

        async fn generate_stream(&self, _prompt: &str, _params: &GenerationParams) -> Result<TokenStream> {
            Err(TutorError::InferenceApi("HTTP 503: overloaded".to_string()))
        }
    }

    fn pipeline(adapters: Vec<Box<dyn RetrievalAdapter>>, generator: Arc<dyn Generator>) -> TutorPipeline {
        TutorPipeline::new(adapters, PromptAssembler::new(), generator, GenerationParams::default())
    }

    #[tokio::test]
    async fn test_answer_contains_context_and_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = vec![StubAdapter::boxed(
            "wikipedia",
            RetrievalSource::Encyclopedia,
            Some("Paris is the capital of France."),
            &calls,
        )];
        let answer = pipeline(adapters, Arc::new(EchoGenerator))
            .answer("capital of France")
            .await
            .unwrap();

        assert!(answer.response.contains("Paris is the capital of France."));
        assert!(answer.response.contains("capital of France"));
        assert_eq!(answer.results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_adapters_fail() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = vec![
            StubAdapter::boxed("wikipedia", RetrievalSource::Encyclopedia, None, &calls),
            StubAdapter::boxed("duckduckgo", RetrievalSource::WebSearch, None, &calls),
        ];
        let prompt = pipeline(adapters, Arc::new(EchoGenerator))
            .prepare("what is osmosis?")
            .await
            .unwrap();

        let expected = format!(
            "Based on the following information:\n\n\
             Wikipedia: '{}'\n\n\
             Web Search Results:\n{}\n\n\
             User question: what is osmosis?\n\n{}",
            RetrievalSource::Encyclopedia.sentinel(),
            RetrievalSource::WebSearch.sentinel(),
            INSTRUCTION
        );
        assert_eq!(prompt.text, expected);
        assert!(!prompt.text.contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_results_ordered_by_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = vec![
            StubAdapter::boxed("tavily", RetrievalSource::WebSearch, Some("tavily text"), &calls),
            StubAdapter::boxed("wikipedia", RetrievalSource::Encyclopedia, Some("wiki text"), &calls),
            StubAdapter::boxed("duckduckgo", RetrievalSource::WebSearch, Some("ddg text"), &calls),
        ];
        let results = pipeline(adapters, Arc::new(EchoGenerator)).retrieve("q").await;

        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["wiki text", "tavily text", "ddg text"]);
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_retrieval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = vec![StubAdapter::boxed("wikipedia", RetrievalSource::Encyclopedia, Some("x"), &calls)];
        let pipeline = pipeline(adapters, Arc::new(EchoGenerator));
        let mut session = SessionLog::new();

        assert!(matches!(pipeline.answer("   ").await, Err(TutorError::EmptyQuery)));
        assert!(matches!(
            pipeline.respond(&mut session, "", |_| {}).await,
            Err(TutorError::EmptyQuery)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_respond_logs_both_turns() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = vec![StubAdapter::boxed("wikipedia", RetrievalSource::Encyclopedia, Some("x"), &calls)];
        let pipeline = pipeline(adapters, Arc::new(EchoGenerator));
        let mut session = SessionLog::new();

        let mut streamed = String::new();
        let text = pipeline
            .respond(&mut session, "first question", |t| streamed.push_str(t))
            .await
            .unwrap();
        pipeline.respond(&mut session, "second question", |_| {}).await.unwrap();

        assert_eq!(streamed, text);
        let roles: Vec<_> = session.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.iter().nth(2).unwrap().content(), "second question");
    }

    #[tokio::test]
    async fn test_respond_failure_keeps_user_message() {
        let pipeline = pipeline(Vec::new(), Arc::new(FailingGenerator));
        let mut session = SessionLog::new();

        let result = pipeline.respond(&mut session, "hello", |_| {}).await;
        assert!(matches!(result, Err(TutorError::InferenceApi(_))));
        assert_eq!(session.len(), 1);
        assert_eq!(session.last().unwrap().role(), Role::User);
    }

    #[tokio::test]
    async fn test_stream_matches_blocking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = vec![StubAdapter::boxed("wikipedia", RetrievalSource::Encyclopedia, Some("Paris."), &calls)];
        let pipeline = pipeline(adapters, Arc::new(EchoGenerator));

        let blocking = pipeline.answer("capital of France").await.unwrap().response;
        let (_, mut tokens) = pipeline.answer_stream("capital of France").await.unwrap();
        let mut streamed = String::new();
        while let Some(token) = tokens.next().await {
            streamed.push_str(&token.unwrap());
        }
        assert_eq!(streamed, blocking);
    }

    #[test]
    fn test_set_stream() {
        let mut pipeline = pipeline(Vec::new(), Arc::new(EchoGenerator));
        assert!(pipeline.params().stream);
        pipeline.set_stream(false);
        assert!(!pipeline.params().stream);
        assert!(pipeline.adapter_names().is_empty());
    }
}
