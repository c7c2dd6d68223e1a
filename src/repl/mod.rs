//! REPL (Read-Eval-Print Loop) for interactive study sessions
//!
//! One question per line. Each question runs the full pipeline and is
//! recorded in the session log together with its answer.
//! - `quit` or `/exit` ends the session
//! - Ctrl-C cancels the current line, Ctrl-D exits
//! - A failed answer is reported and the loop continues

pub mod commands;
pub mod display;
pub mod input;

use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

use crate::pipeline::TutorPipeline;
use crate::repl::commands::{is_command, is_quit, CommandHandler};
pub use crate::repl::display::DisplayManager;
use crate::repl::input::{InputHandler, Line};
use crate::session::SessionLog;

/// REPL session coordinator
pub struct ReplSession {
    input_handler: InputHandler,
    command_handler: CommandHandler,
    display_manager: DisplayManager,
    log: SessionLog,
}

impl ReplSession {
    /// Create new REPL session
    pub fn new(show_progress: bool) -> Result<Self> {
        Ok(Self::assemble(InputHandler::new()?, show_progress))
    }

    /// Create REPL session with persistent input history
    pub fn with_history(history_path: PathBuf, show_progress: bool) -> Result<Self> {
        Ok(Self::assemble(InputHandler::with_history(history_path)?, show_progress))
    }

    fn assemble(input_handler: InputHandler, show_progress: bool) -> Self {
        ReplSession {
            input_handler,
            command_handler: CommandHandler::new(),
            display_manager: DisplayManager::new(show_progress),
            log: SessionLog::new(),
        }
    }

    /// Show welcome banner
    pub fn show_welcome(&self, version: &str, model: &str, sources: &[&str]) {
        self.display_manager.show_banner(version, model, sources);
    }

    /// Handle one line of input
    ///
    /// Returns true if session should continue, false to exit
    pub async fn handle_input(&mut self, input: &str, pipeline: &mut TutorPipeline) -> Result<bool> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(true);
        }

        if is_quit(input) || is_command(input) {
            let command = self.command_handler.parse(input);
            return self
                .command_handler
                .execute(command, &self.log, pipeline, &self.display_manager);
        }

        let Self { display_manager, log, .. } = self;
        display_manager.start_spinner("Searching sources...");
        let result = pipeline
            .respond(log, input, |token| display_manager.stream_token(token))
            .await;
        display_manager.finish_spinner();

        match result {
            Ok(_) => display_manager.end_response(),
            Err(e) => {
                println!();
                display_manager.show_error(&format!("Could not answer: {}", e));
            }
        }

        Ok(true)
    }

    /// Run until the user exits
    pub async fn run(&mut self, pipeline: &mut TutorPipeline) -> Result<()> {
        loop {
            match self.input_handler.read_line()? {
                Line::Text(input) => {
                    if !self.handle_input(&input, pipeline).await? {
                        break;
                    }
                }
                Line::Interrupted => println!("\nType quit to leave"),
                Line::Eof => break,
            }
        }

        debug!(session = %self.log.id(), messages = self.log.len(), "session finished");
        self.input_handler.save_history()?;
        Ok(())
    }

    /// Session log (read only)
    pub fn log(&self) -> &SessionLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Result as TutorResult, TutorError};
    use crate::generation::{GenerationParams, Generator, TokenStream};
    use crate::prompt::PromptAssembler;
    use crate::session::Role;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Arc;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> TutorResult<String> {
            Ok(prompt.to_string())
        }

        async fn generate_stream(&self, prompt: &str, _params: &GenerationParams) -> TutorResult<TokenStream> {
            let tokens: Vec<TutorResult<String>> = vec![Ok(prompt.to_string())];
            Ok(Box::pin(stream::iter(tokens)))
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl Generator for DownGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> TutorResult<String> {
            Err(TutorError::InferenceApi("HTTP 500".to_string()))
        }

        async fn generate_stream(&self, _prompt: &str, _params: &GenerationParams) -> TutorResult<TokenStream> {
            Err(TutorError::InferenceApi("HTTP 500".to_string()))
        }
    }

    fn pipeline(generator: Arc<dyn Generator>) -> TutorPipeline {
        TutorPipeline::new(Vec::new(), PromptAssembler::new(), generator, GenerationParams::default())
    }

    #[tokio::test]
    async fn test_quit_ends_session() {
        let mut repl = ReplSession::new(false).unwrap();
        let mut pipeline = pipeline(Arc::new(EchoGenerator));

        assert!(!repl.handle_input("quit", &mut pipeline).await.unwrap());
        assert!(!repl.handle_input("/exit", &mut pipeline).await.unwrap());
        assert!(repl.log().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_ignored() {
        let mut repl = ReplSession::new(false).unwrap();
        let mut pipeline = pipeline(Arc::new(EchoGenerator));
        assert!(repl.handle_input("   ", &mut pipeline).await.unwrap());
        assert!(repl.log().is_empty());
    }

    #[tokio::test]
    async fn test_question_is_logged() {
        let mut repl = ReplSession::new(false).unwrap();
        let mut pipeline = pipeline(Arc::new(EchoGenerator));

        assert!(repl.handle_input("capital of France", &mut pipeline).await.unwrap());
        let roles: Vec<_> = repl.log().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert!(repl.log().last().unwrap().content().contains("User question: capital of France"));
    }

    #[tokio::test]
    async fn test_generation_error_continues() {
        let mut repl = ReplSession::new(false).unwrap();
        let mut pipeline = pipeline(Arc::new(DownGenerator));

        assert!(repl.handle_input("capital of France", &mut pipeline).await.unwrap());
        assert!(repl.handle_input("and Italy?", &mut pipeline).await.unwrap());
        assert_eq!(repl.log().len(), 2);
        assert!(repl.log().iter().all(|m| m.role() == Role::User));
    }

    #[tokio::test]
    async fn test_stream_command_toggles_pipeline() {
        let mut repl = ReplSession::new(false).unwrap();
        let mut pipeline = pipeline(Arc::new(EchoGenerator));

        assert!(repl.handle_input("/stream off", &mut pipeline).await.unwrap());
        assert!(!pipeline.params().stream);
        assert!(repl.handle_input("/stream", &mut pipeline).await.unwrap());
        assert!(pipeline.params().stream);
    }
}
