//! Command handler for REPL built-in commands
//!
//! Built-ins start with `/`. The bare word `quit` (any case) also ends the
//! session, matching the classic prompt loop.

use anyhow::Result;
use colored::*;

use crate::pipeline::TutorPipeline;
use crate::repl::display::DisplayManager;
use crate::session::{Role, SessionLog};

/// Default number of messages shown by `/history`
const DEFAULT_HISTORY: usize = 10;

/// REPL command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History { limit: Option<usize> },
    /// `None` flips the current setting
    Stream { enable: Option<bool> },
    Sources,
    Clear,
    Exit,
    Unknown { input: String },
}

/// Parses and runs built-in commands
#[derive(Debug, Default)]
pub struct CommandHandler;

impl CommandHandler {
    /// Create new command handler
    pub fn new() -> Self {
        CommandHandler
    }

    /// Parse input string into a command
    pub fn parse(&self, input: &str) -> Command {
        let trimmed = input.trim();

        if is_quit(trimmed) {
            return Command::Exit;
        }

        let Some(body) = trimmed.strip_prefix('/') else {
            return Command::Unknown { input: input.to_string() };
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        let Some(name) = parts.first() else {
            return Command::Unknown { input: input.to_string() };
        };

        match name.to_lowercase().as_str() {
            "help" | "h" => Command::Help,
            "exit" | "quit" | "q" => Command::Exit,
            "history" => {
                let limit = parts.get(1).and_then(|s| s.parse().ok());
                Command::History { limit }
            }
            "stream" => {
                let enable = parts.get(1).and_then(|s| match s.to_lowercase().as_str() {
                    "on" | "1" | "true" => Some(true),
                    "off" | "0" | "false" => Some(false),
                    _ => None,
                });
                Command::Stream { enable }
            }
            "sources" => Command::Sources,
            "clear" | "cls" => Command::Clear,
            _ => Command::Unknown { input: input.to_string() },
        }
    }

    /// Execute a command
    ///
    /// Returns true if REPL should continue, false if should exit
    pub fn execute(
        &self,
        command: Command,
        log: &SessionLog,
        pipeline: &mut TutorPipeline,
        display: &DisplayManager,
    ) -> Result<bool> {
        match command {
            Command::Help => {
                self.show_help();
                Ok(true)
            }
            Command::Exit => {
                println!("{}", "Goodbye!".green());
                Ok(false)
            }
            Command::History { limit } => {
                let history = format_history(log, limit.unwrap_or(DEFAULT_HISTORY));
                if history.is_empty() {
                    println!("{}", "No messages in this session yet.".yellow());
                } else {
                    println!("\n{}", "Conversation History:".bold().cyan());
                    println!("{}", "=".repeat(60).cyan());
                    println!("{}", history);
                }
                Ok(true)
            }
            Command::Stream { enable } => {
                let enable = enable.unwrap_or(!pipeline.params().stream);
                pipeline.set_stream(enable);
                let status = if enable { "enabled" } else { "disabled" };
                println!("{}", format!("Streaming {}", status).cyan());
                Ok(true)
            }
            Command::Sources => {
                let names = pipeline.adapter_names();
                if names.is_empty() {
                    println!("{}", "No retrieval sources configured.".yellow());
                } else {
                    println!("\n{}", "Retrieval Sources:".bold().cyan());
                    for (i, name) in names.iter().enumerate() {
                        println!("  {}. {}", (i + 1).to_string().cyan(), name);
                    }
                    println!();
                }
                Ok(true)
            }
            Command::Clear => {
                display.clear_screen()?;
                Ok(true)
            }
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
                Ok(true)
            }
        }
    }

    /// Display help information
    fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let commands = [
            ("/help, /h", "Show this help message"),
            ("/history [n]", "Show last n messages (default: 10)"),
            ("/stream [on|off]", "Toggle token streaming"),
            ("/sources", "List retrieval sources"),
            ("/clear, /cls", "Clear screen"),
            ("/exit, quit", "Exit"),
        ];

        for (cmd, desc) in commands {
            println!("  {:<20} {}", cmd.green(), desc);
        }

        println!("\n{}", "Usage:".bold());
        println!("  - Type your question directly (no / prefix)");
        println!("  - Use {} for input history", "UP/DOWN arrows".cyan());
        println!("  - Press {} or type {} to exit", "Ctrl-D".cyan(), "quit".cyan());
        println!();
    }
}

/// Check if input is a command (starts with /)
pub fn is_command(input: &str) -> bool {
    input.trim().starts_with('/')
}

/// The bare `quit` word, any case
pub fn is_quit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("quit")
}

/// Last `limit` messages, one line each, numbered from session start
pub fn format_history(log: &SessionLog, limit: usize) -> String {
    let recent = log.recent(limit);
    let offset = log.len() - recent.len();

    recent
        .iter()
        .enumerate()
        .map(|(i, message)| {
            let who = match message.role() {
                Role::User => "you",
                Role::Assistant => "tutor",
            };
            let first_line = message.content().lines().next().unwrap_or("");
            format!(
                "  {:>3}. [{}] {}: {}",
                offset + i + 1,
                message.timestamp().format("%H:%M:%S"),
                who,
                first_line
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
