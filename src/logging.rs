//! Tracing setup for the `arxiv-text` binary.
//!
//! The filter is read from `ARXIV_TEXT_LOG` (`EnvFilter` syntax, e.g.
//! `ARXIV_TEXT_LOG=arxiv_text=debug`) and defaults to `info`.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "ARXIV_TEXT_LOG";

pub fn init() {
    init_with_default("info");
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_with_default(default_level: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init_with_default("debug");
        init();
        tracing::info!("logging initialised");
    }
}
