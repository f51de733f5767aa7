//! Tracing subscriber setup. RUST_LOG wins over the configured filter.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_filter).unwrap_or_else(|e| {
            eprintln!("Invalid log filter {default_filter:?} ({e}), defaulting to info");
            EnvFilter::new("info")
        })
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter)
        .init();
}
