use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::Config;

/// Used when `RUST_LOG` isn't set. Keeps the mongodb driver's own events
/// quiet while still recording every scanned server.
const DEFAULT_DIRECTIVES: &str = "warn,mcrangescan=info";

const LOG_FILE_PREFIX: &str = "mcrangescan.log";

/// Console output is done with `println!`, so the only sink here is the
/// rolling file log (when `logging_dir` is set).
pub fn init_tracing(config: &Config) {
    let Some(logging_dir) = &config.logging_dir else {
        return;
    };

    let file_appender = tracing_appender::rolling::daily(logging_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file_appender)
                .with_filter(LevelFilter::DEBUG),
        )
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
