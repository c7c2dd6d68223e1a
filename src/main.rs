//! TutorBuddy - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use std::path::Path;
use tracing::{debug, info};

use tutorbuddy::{
    cli::{Args, Commands, Config, Verbosity},
    coder::{CoderMode, CoderOutcome},
    credentials::Credentials,
    execution,
    logging,
    repl::{display::DisplayManager, ReplSession},
    TutorError,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    let default_verbosity =
        Verbosity::parse(&config.telemetry.default_verbosity).unwrap_or(Verbosity::Normal);
    let verbosity = args.verbosity(default_verbosity);
    if !config.telemetry.color_output {
        colored::control::set_override(false);
    }
    logging::init(verbosity, config.telemetry.color_output);

    let credentials = Credentials::from_env();
    if let Err(e) = credentials.require(args.requirements(&config)) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let TutorError::MissingCredential { var, .. } = &e {
            eprintln!("\nSet it with: export {}=<your key>", var);
        }
        std::process::exit(2);
    }
    debug!(?credentials, command = ?args.command(), "startup complete");

    let show_progress = verbosity.show_progress() && config.telemetry.show_progress_bars;

    match args.command() {
        Commands::Chat => run_chat(&args, &config, &credentials, show_progress).await?,
        Commands::Ask { question } => {
            run_ask(&args, &config, &credentials, &question, verbosity, show_progress).await?
        }
        Commands::Code { input, repair, .. } => {
            run_code(&config, &credentials, &input, repair, show_progress).await?
        }
        Commands::Image { query } => run_image(&config, &credentials, &query, show_progress).await?,
        Commands::Explain { path } => {
            run_explain(&config, &credentials, &path, show_progress).await?
        }
        Commands::Index { file, out } => run_index(&config, &credentials, &file, &out).await?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}

async fn run_chat(
    args: &Args,
    config: &Config,
    credentials: &Credentials,
    show_progress: bool,
) -> Result<()> {
    let mut pipeline = execution::build_pipeline(config, credentials, args.index.as_deref())?;
    let mut session = ReplSession::with_history(config.history_file(), show_progress)?;

    session.show_welcome(
        env!("CARGO_PKG_VERSION"),
        &config.inference.model,
        &pipeline.adapter_names(),
    );
    session.run(&mut pipeline).await?;

    info!(messages = session.log().len(), "chat closed");
    Ok(())
}

async fn run_ask(
    args: &Args,
    config: &Config,
    credentials: &Credentials,
    question: &str,
    verbosity: Verbosity,
    show_progress: bool,
) -> Result<()> {
    let pipeline = execution::build_pipeline(config, credentials, args.index.as_deref())?;
    let mut display = DisplayManager::new(show_progress);
    display.start_spinner("Searching sources...");

    if !pipeline.params().stream {
        let answer = pipeline.answer(question).await;
        display.finish_spinner();
        let answer = answer?;
        if verbosity.show_context() {
            display.show_context(&answer.results);
        }
        println!("{}", answer.response.trim());
        return Ok(());
    }

    let streamed = pipeline.answer_stream(question).await;
    display.finish_spinner();
    let (prompt, mut tokens) = streamed?;
    if verbosity.show_context() {
        display.show_result("Prompt", &prompt.text);
    }

    while let Some(token) = tokens.next().await {
        display.stream_token(&token?);
    }
    display.end_response();
    Ok(())
}

async fn run_code(
    config: &Config,
    credentials: &Credentials,
    input: &str,
    repair: bool,
    show_progress: bool,
) -> Result<()> {
    let source = if Path::new(input).is_file() {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {}", input))?
    } else {
        input.to_string()
    };
    let mode = if repair { CoderMode::Repair } else { CoderMode::Generate };

    let coder = execution::build_coder(config, credentials)?;
    let mut display = DisplayManager::new(show_progress);
    display.start_spinner(match mode {
        CoderMode::Generate => "Generating code...",
        CoderMode::Repair => "Testing code...",
    });
    let outcome = coder.run(&source, mode).await;
    display.finish_spinner();

    let outcome = outcome?;
    if let CoderOutcome::Exhausted { attempts, .. } = &outcome {
        display.show_warning(&format!("No passing version after {} attempts", attempts));
    }
    println!("{}", outcome);
    Ok(())
}

async fn run_image(
    config: &Config,
    credentials: &Credentials,
    query: &str,
    show_progress: bool,
) -> Result<()> {
    let tutor = execution::build_tutor(config, credentials)?;
    let mut display = DisplayManager::new(show_progress);
    display.start_spinner("Looking for an image...");
    let reply = tutor.process_query(query).await;
    display.finish_spinner();

    println!("{}", reply?);
    Ok(())
}

async fn run_explain(
    config: &Config,
    credentials: &Credentials,
    path: &Path,
    show_progress: bool,
) -> Result<()> {
    let tutor = execution::build_tutor(config, credentials)?;
    let mut display = DisplayManager::new(show_progress);
    display.start_spinner("Reading the image...");
    let explanation = tutor.explain_image(path).await;
    display.finish_spinner();

    println!("{}", explanation?);
    Ok(())
}

async fn run_index(config: &Config, credentials: &Credentials, file: &Path, out: &Path) -> Result<()> {
    let chunks = execution::build_index(config, credentials, file, out).await?;
    println!(
        "{} Indexed {} chunks from {} into {}",
        "✓".green(),
        chunks,
        file.display(),
        out.display()
    );
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "TutorBuddy Configuration".bold());
    println!();
    print!("{}", config.to_toml()?);
    println!();
    Ok(())
}
