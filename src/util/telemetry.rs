use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Console-only tracing registry for the overlay runner.
///
/// An embedded viewer client has no OTLP collector to ship spans to, so this
/// stops at an `EnvFilter` plus an fmt layer.
#[derive(Debug)]
pub struct Telemetry {
    filter: String,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            filter: String::from("bitsboard=debug,info"),
        }
    }

    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }

    pub fn register(self) {
        Registry::default()
            .with(EnvFilter::new(self.filter))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true),
            )
            .init();
    }
}
