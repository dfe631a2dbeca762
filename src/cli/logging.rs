//! Tracing setup for the binary
//!
//! Filter precedence: `DEPGRAPH_LOG`, then `--verbose`, then the
//! configured `[logging] level`. `DEPGRAPH_LOG_FORMAT=json` switches to
//! JSON lines. Logs always go to stderr so stdout stays parseable.

use std::env;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(verbose: bool, configured_level: &str) {
    let filter = EnvFilter::try_from_env("DEPGRAPH_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("depgraph=debug,info")
        } else {
            EnvFilter::try_new(configured_level).unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    });

    let format = env::var("DEPGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Already installed when embedded; keep the existing subscriber
    let _ = match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
}
