/*!
 * Logging setup for the SDN bridge.
 *
 * Wraps `tracing-subscriber` so every binary installs the same formatter.
 * `RUST_LOG` always wins over the configured level.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize logging at `info`
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize logging from the `[logging]` configuration section
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init_with_filter(&config.level)
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "sdn_devices=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a span for a long-lived component such as the reader or writer loop
///
/// # Arguments
///
/// * `name` - The name of the component
/// * `id` - An optional ID for the component instance, e.g. the port it drives
pub fn component_span(name: &str, id: Option<&str>) -> Span {
    match id {
        Some(id) => tracing::info_span!("component", name = %name, id = %id),
        None => tracing::info_span!("component", name = %name),
    }
}

/// Create a span for a single operation of a component
pub fn operation_span(name: &str, component: &str) -> Span {
    tracing::info_span!("operation", name = %name, component = %component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails() {
        // Only the first global subscriber wins; the second call must report it.
        let _ = init_with_filter("debug");
        assert!(init().is_err());
    }

    #[test]
    fn test_spans_without_subscriber_interest() {
        let span = component_span("writer", Some("tcp://localhost:4000"));
        let _entered = span.enter();
        let op = operation_span("send", "writer");
        drop(op);
    }
}
