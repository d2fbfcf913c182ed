use std::sync::Once;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Env var consulted before `RUST_LOG` for the log filter.
const LOG_ENV: &str = "SQUAWK_LOG";

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `SQUAWK_LOG`, then `RUST_LOG`, then `info`
/// (`debug` when `verbose` is set). Only the first call has any effect.
pub fn init_logging(verbose: bool, no_color: bool) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = std::env::var(LOG_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .map_or_else(
                |_| {
                    if verbose {
                        EnvFilter::new("debug")
                    } else {
                        EnvFilter::new("info")
                    }
                },
                |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
            );

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(!no_color)
            .with_thread_names(true)
            .finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to set global default subscriber: {}", err);
        }
    });
}
