//! Component wiring shared by the CLI commands and the REPL
//!
//! Every client is built here from the configuration and the resolved
//! credentials, then handed to the component that uses it.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::Config;
use crate::coder::{CodeAssistant, PythonVerifier};
use crate::credentials::{Credentials, EMBEDDING_KEY_VARS, GEMINI_KEY_VARS};
use crate::errors::{Result, TutorError};
use crate::generation::{GenerationParams, HfInferenceClient};
use crate::images::BingImageCrawler;
use crate::prompt::PromptAssembler;
use crate::retrieval::{build_adapters, http_client, KnowledgeBaseAdapter};
use crate::pipeline::TutorPipeline;
use crate::tutor::ImageTutor;
use crate::vector::{self, HfEmbeddingClient, TextSplitter, VectorIndex};
use crate::vision::GeminiCaptioner;

/// Sampling parameters from configuration
pub fn generation_params(config: &Config) -> GenerationParams {
    GenerationParams {
        temperature: config.inference.temperature,
        max_tokens: config.inference.max_tokens,
        stream: config.inference.stream,
    }
}

pub fn build_generator(config: &Config, credentials: &Credentials) -> Result<Arc<HfInferenceClient>> {
    let client = HfInferenceClient::with_config(
        &config.inference.base_url,
        &config.inference.model,
        credentials.inference_token()?.to_string(),
        config.inference_timeout(),
    )?;
    Ok(Arc::new(client))
}

pub fn build_embedder(config: &Config, credentials: &Credentials) -> Result<HfEmbeddingClient> {
    let key = credentials
        .embedding_key
        .clone()
        .ok_or_else(|| TutorError::MissingCredential {
            var: EMBEDDING_KEY_VARS[0].to_string(),
            purpose: "embeddings".to_string(),
        })?;
    HfEmbeddingClient::new(
        &config.embedding.base_url,
        &config.embedding.model,
        key,
        config.retrieval_timeout(),
    )
}

/// Full question-answering pipeline; `index` adds the knowledge-base source
pub fn build_pipeline(
    config: &Config,
    credentials: &Credentials,
    index: Option<&Path>,
) -> Result<TutorPipeline> {
    let generator = build_generator(config, credentials)?;
    let mut adapters = build_adapters(config, credentials)?;

    if let Some(path) = index {
        let loaded = VectorIndex::load(path)?;
        if loaded.model != config.embedding.model {
            warn!(
                index_model = %loaded.model,
                configured = %config.embedding.model,
                "index was built with a different embedding model"
            );
        }
        info!(path = %path.display(), chunks = loaded.len(), "knowledge base loaded");
        adapters.push(Box::new(KnowledgeBaseAdapter::new(
            Arc::new(loaded),
            Arc::new(build_embedder(config, credentials)?),
            config.embedding.top_k,
        )));
    }

    Ok(TutorPipeline::new(
        adapters,
        PromptAssembler::with_limits(config.prompt.clone()),
        generator,
        generation_params(config),
    ))
}

pub fn build_coder(config: &Config, credentials: &Credentials) -> Result<CodeAssistant> {
    let verifier = PythonVerifier::new(
        config.coder.python.clone(),
        std::time::Duration::from_secs(config.coder.timeout_secs),
    );
    Ok(CodeAssistant::new(
        build_generator(config, credentials)?,
        Arc::new(verifier),
        generation_params(config),
        config.coder.max_attempts,
    ))
}

pub fn build_tutor(config: &Config, credentials: &Credentials) -> Result<ImageTutor> {
    let key = credentials
        .gemini_key
        .clone()
        .ok_or_else(|| TutorError::MissingCredential {
            var: GEMINI_KEY_VARS[0].to_string(),
            purpose: "image captioning".to_string(),
        })?;

    let captioner = GeminiCaptioner::new(
        &config.vision.base_url,
        &config.vision.model,
        key,
        std::time::Duration::from_secs(config.vision.timeout_secs),
    )?;
    let crawler = BingImageCrawler::new(
        http_client(config.retrieval_timeout())?,
        &config.images.search_url,
        config.image_root(),
    );

    Ok(ImageTutor::new(
        build_generator(config, credentials)?,
        Arc::new(crawler),
        Arc::new(captioner),
        generation_params(config),
        (config.images.min_width, config.images.min_height),
    )
    .with_max_images(config.images.max_num))
}

/// Split, embed and save a text file as a knowledge-base index.
///
/// Returns the number of chunks written.
pub async fn build_index(
    config: &Config,
    credentials: &Credentials,
    file: &Path,
    out: &Path,
) -> Result<usize> {
    let text = tokio::fs::read_to_string(file).await?;
    let embedder = build_embedder(config, credentials)?;
    let splitter = TextSplitter::new(config.embedding.chunk_size, config.embedding.chunk_overlap);

    let mut index = VectorIndex::new(config.embedding.model.clone());
    let source = file.display().to_string();
    let chunks = vector::ingest(&mut index, &text, &source, &splitter, &embedder).await?;
    index.save(out)?;
    Ok(chunks)
}
