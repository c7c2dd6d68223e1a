//! TutorBuddy - retrieval-augmented study assistant
//!
//! Answers questions with a hosted LLM, grounding each answer in
//! Wikipedia, web search and an optional local knowledge base.
//!
//! # Architecture
//!
//! - **retrieval**: one adapter per external source, failures become sentinels
//! - **prompt**: deterministic prompt assembly with truncation limits
//! - **generation**: blocking and streamed text generation
//! - **pipeline**: retrieve, assemble, generate, record
//! - **coder / tutor**: code generation and repair, image search and captioning
//! - **repl**: interactive chat front end

pub mod errors;
pub use errors::{Result, TutorError};

pub mod cli;
pub mod credentials;
pub mod logging;

pub mod generation;
pub mod prompt;
pub mod retrieval;
pub mod vector;

pub mod pipeline;
pub mod session;

pub mod coder;
pub mod images;
pub mod tutor;
pub mod vision;

pub mod execution;
pub mod repl;
