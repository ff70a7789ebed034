//! Log subscriber for the binary and embedding desktop processes

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::paths::env;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl LogFormat {
    /// `SIGNBRIDGE_LOG_JSON=1` selects JSON.
    pub fn from_env() -> Self {
        match std::env::var(env::LOG_JSON) {
            Ok(value) if value.trim() == "1" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the stderr subscriber; `RUST_LOG` filters. A second call is a no-op.
pub fn init_logging() {
    init_logging_as(LogFormat::from_env());
}

pub fn init_logging_as(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_logging_as(LogFormat::Pretty);
        init_logging_as(LogFormat::Json);
        tracing::info!("still logging");
    }
}
