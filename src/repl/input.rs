//! Line input for the study REPL
//!
//! Wraps a rustyline editor. Questions are kept in a history file so they
//! can be recalled in later sessions; `quit` is never stored.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::History;
use rustyline::DefaultEditor;
use std::path::PathBuf;

use crate::repl::commands::is_quit;

pub const PROMPT: &str = ">tutorbuddy: ";

/// One read from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Trimmed text, possibly empty
    Text(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D or closed stdin
    Eof,
}

pub struct InputHandler {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
    prompt: String,
}

impl InputHandler {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("Failed to open line editor")?;
        Ok(Self {
            editor,
            history_path: None,
            prompt: PROMPT.to_string(),
        })
    }

    /// Editor preloaded from `history_file`; a missing or unreadable file starts empty
    pub fn with_history(history_file: PathBuf) -> Result<Self> {
        let mut handler = Self::new()?;
        if history_file.is_file() {
            let _ = handler.editor.load_history(&history_file);
        }
        handler.history_path = Some(history_file);
        Ok(handler)
    }

    pub fn read_line(&mut self) -> Result<Line> {
        match self.editor.readline(&self.prompt) {
            Ok(raw) => {
                let line = raw.trim().to_string();
                self.remember(&line);
                Ok(Line::Text(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(err) => Err(err).context("Failed to read input"),
        }
    }

    fn remember(&mut self, line: &str) {
        if !line.is_empty() && !is_quit(line) {
            let _ = self.editor.add_history_entry(line);
        }
    }

    /// Write the history file, creating its directory on first use
    pub fn save_history(&mut self) -> Result<()> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.editor
            .save_history(path)
            .with_context(|| format!("Failed to save history to {}", path.display()))
    }

    pub fn history_len(&self) -> usize {
        self.editor.history().len()
    }
}
