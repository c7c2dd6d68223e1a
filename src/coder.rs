//! Code assistant
//!
//! Two caller-selected modes:
//! - Generate: one generation call turns a request into code
//! - Repair: verify → fix loop, bounded by `max_attempts` verifications
//!
//! Verification runs the code with a local interpreter in a scratch
//! directory, with a timeout.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{Result, TutorError};
use crate::generation::{GenerationParams, Generator};

/// What the caller wants done with the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderMode {
    /// Input is a natural-language request
    Generate,
    /// Input is code to test and fix
    Repair,
}

/// Terminal result of a coder run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoderOutcome {
    Generated {
        code: String,
    },
    Repaired {
        code: String,
        explanation: String,
        attempts: u32,
    },
    /// No passing version within the attempt budget
    Exhausted {
        code: String,
        last_error: String,
        attempts: u32,
    },
}

impl std::fmt::Display for CoderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoderOutcome::Generated { code } => write!(f, "Generated Code:\n{}", code),
            CoderOutcome::Repaired { code, explanation, .. } => {
                write!(f, "Corrected Code:\n{}\n\nExplanation:\n{}", code, explanation)
            }
            CoderOutcome::Exhausted { code, last_error, attempts } => write!(
                f,
                "Could not fix the code after {} attempts.\n\nLast Code:\n{}\n\nLast Error:\n{}",
                attempts, code, last_error
            ),
        }
    }
}

/// Outcome of running a piece of code once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Passed,
    Failed(String),
}

/// Runs code and reports whether it succeeded
#[async_trait]
pub trait CodeVerifier: Send + Sync {
    /// `Err` only when the check itself could not run
    async fn verify(&self, code: &str) -> Result<Verification>;
}

/// Executes code with a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonVerifier {
    python: String,
    timeout: Duration,
}

impl PythonVerifier {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CodeVerifier for PythonVerifier {
    async fn verify(&self, code: &str) -> Result<Verification> {
        let dir = tempfile::tempdir()?;
        let script: PathBuf = dir.path().join("generated_code.py");
        tokio::fs::write(&script, code).await?;

        let mut cmd = Command::new(&self.python);
        cmd.arg(&script).current_dir(dir.path()).kill_on_drop(true);

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(Verification::Passed),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let message = if stderr.is_empty() {
                    format!(
                        "Process exited with code {}",
                        output.status.code().unwrap_or(-1)
                    )
                } else {
                    stderr
                };
                Ok(Verification::Failed(message))
            }
            Ok(Err(e)) => Err(TutorError::Generic(format!(
                "Failed to run {}: {}",
                self.python, e
            ))),
            Err(_) => Ok(Verification::Failed(format!(
                "Execution timed out after {}s",
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

pub struct CodeAssistant {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn CodeVerifier>,
    params: GenerationParams,
    max_attempts: u32,
}

impl CodeAssistant {
    /// Create new assistant; at least one verification is always made
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn CodeVerifier>,
        params: GenerationParams,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            verifier,
            params: params.blocking(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run(&self, input: &str, mode: CoderMode) -> Result<CoderOutcome> {
        if input.trim().is_empty() {
            return Err(TutorError::EmptyQuery);
        }
        match mode {
            CoderMode::Generate => self.generate(input).await,
            CoderMode::Repair => self.repair(input).await,
        }
    }

    async fn generate(&self, request: &str) -> Result<CoderOutcome> {
        let response = self.generator.generate(request, &self.params).await?;
        Ok(CoderOutcome::Generated {
            code: extract_code(&response),
        })
    }

    async fn repair(&self, code: &str) -> Result<CoderOutcome> {
        let mut code = code.to_string();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.verifier.verify(&code).await? {
                Verification::Passed => {
                    info!(attempts, "code verified");
                    let explanation = self
                        .generator
                        .generate(&explain_prompt(&code), &self.params)
                        .await?;
                    return Ok(CoderOutcome::Repaired {
                        code,
                        explanation: explanation.trim().to_string(),
                        attempts,
                    });
                }
                Verification::Failed(error) => {
                    if attempts >= self.max_attempts {
                        warn!(attempts, "giving up on repair");
                        return Ok(CoderOutcome::Exhausted {
                            code,
                            last_error: error,
                            attempts,
                        });
                    }
                    debug!(attempts, error = %error, "verification failed, requesting fix");
                    let fixed = self
                        .generator
                        .generate(&fix_prompt(&code, &error), &self.params)
                        .await?;
                    code = extract_code(&fixed);
                }
            }
        }
    }
}

pub fn explain_prompt(code: &str) -> String {
    format!("Explain the following Python code:\n{}", code)
}

pub fn fix_prompt(code: &str, error: &str) -> String {
    format!("Fix the following Python code:\n{}\nError message: {}", code, error)
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("valid fence pattern")
    })
}

/// Take the first fenced block of a model reply, or the whole reply
pub fn extract_code(response: &str) -> String {
    let body = fence_pattern().captures(response).and_then(|c| c.get(1));
    match body {
        Some(body) => body.as_str().trim_end().to_string(),
        None => response.trim().to_string(),
    }
}
