//! Tracing subscriber setup
//!
//! Logs go to stderr so they never interleave with streamed answers on stdout.
//! `RUST_LOG` wins over the verbosity flags when set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::Verbosity;

/// Default filter directive for a verbosity level
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "tutorbuddy=info,warn",
        Verbosity::VeryVerbose => "tutorbuddy=debug,info",
    }
}

pub fn init(verbosity: Verbosity, color: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(color)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding hosts) is not an error for us.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_parse() {
        for v in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::VeryVerbose,
        ] {
            assert!(EnvFilter::try_new(default_directive(v)).is_ok());
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Verbosity::Normal, false);
        init(Verbosity::Verbose, false);
    }
}
