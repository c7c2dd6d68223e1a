//! Display manager for terminal output
//!
//! Spinner while sources are queried, token-by-token answer output and
//! color-coded status lines. Everything goes to stdout; logs go to stderr.

use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

use crate::retrieval::RetrievalResult;

/// Spinner refresh interval (10 FPS)
const TICK: Duration = Duration::from_millis(100);

pub struct DisplayManager {
    spinner: Option<ProgressBar>,
    show_progress: bool,
}

impl DisplayManager {
    /// Create new display manager
    pub fn new(show_progress: bool) -> Self {
        DisplayManager {
            spinner: None,
            show_progress,
        }
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, model: &str, sources: &[&str]) {
        let width = 64;
        let rule = "=".repeat(width).cyan();
        let title = format!("  TutorBuddy {} - Interactive Study Helper", version);
        let sources = if sources.is_empty() {
            "none".to_string()
        } else {
            sources.join(", ")
        };
        let info = format!("  Model: {} | Sources: {}", model, sources);

        println!("\n{}", rule);
        println!("{}", title.bold().cyan());
        println!("{}", info.dimmed());
        println!("{}\n", rule);
        println!(
            "Ask a question (or {} for commands, {} to leave)\n",
            "/help".green(),
            "quit".green()
        );
    }

    /// Start a spinner with a message; no-op when progress is hidden
    pub fn start_spinner(&mut self, message: &str) {
        self.finish_spinner();
        if !self.show_progress {
            return;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(TICK);
        self.spinner = Some(pb);
    }

    /// Remove the spinner if one is running
    pub fn finish_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.spinner.is_some()
    }

    /// Display streaming tokens
    pub fn stream_token(&mut self, token: &str) {
        self.finish_spinner();
        print!("{}", token);
        let _ = io::stdout().flush();
    }

    /// Close a streamed answer
    pub fn end_response(&self) {
        println!("\n");
    }

    /// Print retrieved context, one block per source
    pub fn show_context(&self, results: &[RetrievalResult]) {
        for result in results {
            let marker = if result.found { "✓".green() } else { "✗".red() };
            println!("{} {}", marker, result.source.label().bold());
            println!("{}\n", result.text.dimmed());
        }
    }

    /// Display a complete result block
    pub fn show_result(&self, title: &str, body: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "=".repeat(60).cyan());
        println!("{}\n", body);
    }

    /// Display error message
    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    /// Display warning message
    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    /// Clear screen
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        self.finish_spinner();
    }
}
