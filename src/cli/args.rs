//! Command-line argument parsing for TutorBuddy
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::config::Config;
use crate::credentials::Requirements;
use crate::retrieval::Provider;

/// TutorBuddy - retrieval-augmented study helper on hosted models
#[derive(Parser, Debug)]
#[command(name = "tutorbuddy")]
#[command(version)]
#[command(about = "Answer study questions with a hosted LLM plus Wikipedia and web search", long_about = None)]
pub struct Args {
    /// Inference model (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Retrieval sources, comma separated (overrides config)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub sources: Option<Vec<Provider>>,

    /// Saved knowledge-base index to search as an extra source
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,

    /// Wait for the full answer instead of streaming tokens
    #[arg(long)]
    pub no_stream: bool,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand (interactive chat when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start interactive chat
    Chat,

    /// Answer a single question
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
    },

    /// Generate code from a request, or test and fix given code
    Code {
        /// Request text, code, or a path to a code file
        #[arg(value_name = "INPUT")]
        input: String,

        /// Treat input as code to test and repair
        #[arg(long)]
        repair: bool,

        /// Maximum verification attempts in repair mode
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Find an image for a topic and caption it
    Image {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Caption and explain a local image
    Explain {
        #[arg(value_name = "IMAGE_PATH")]
        path: PathBuf,
    },

    /// Build a knowledge-base index from a text file
    Index {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Where to write the index
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Verbosity from flags, `default` when no flag is given
    pub fn verbosity(&self, default: Verbosity) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => default,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to run; chat when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat)
    }

    /// Apply command-line overrides on top of file configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.inference.model = model.clone();
        }
        if let Some(sources) = &self.sources {
            config.retrieval.sources = sources.clone();
        }
        if self.no_stream {
            config.inference.stream = false;
        }
        if let Some(Commands::Code { max_attempts: Some(n), .. }) = &self.command {
            config.coder.max_attempts = *n;
        }
    }

    /// Credentials the selected command needs before it may start
    pub fn requirements(&self, config: &Config) -> Requirements {
        let retrieval = Requirements {
            inference: true,
            tavily: config.retrieval.sources.contains(&Provider::Tavily),
            vision: false,
            embedding: self.index.is_some(),
        };

        match self.command() {
            Commands::Chat | Commands::Ask { .. } => retrieval,
            Commands::Code { .. } => Requirements {
                inference: true,
                ..Requirements::default()
            },
            Commands::Image { .. } | Commands::Explain { .. } => Requirements {
                inference: true,
                vision: true,
                ..Requirements::default()
            },
            Commands::Index { .. } => Requirements {
                embedding: true,
                ..Requirements::default()
            },
            Commands::Config => Requirements::default(),
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quiet" => Some(Verbosity::Quiet),
            "normal" => Some(Verbosity::Normal),
            "verbose" => Some(Verbosity::Verbose),
            "very_verbose" => Some(Verbosity::VeryVerbose),
            _ => None,
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should print the retrieved context before answers
    pub fn show_context(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
