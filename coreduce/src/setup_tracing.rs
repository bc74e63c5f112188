use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const ENV_DEBUG: &str = "COREDUCE_DEBUG";

/// How log lines are rendered on stderr. Stdout carries the operator output and stays clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// Flattened JSON at info level.
    Json,
    /// Human readable text at debug level.
    Text,
}

impl LogFormat {
    /// `COREDUCE_DEBUG=true` (any case) selects text, everything else JSON.
    fn from_debug_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(v) if v.eq_ignore_ascii_case("true") => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }

    fn default_level(self) -> Level {
        match self {
            LogFormat::Json => Level::INFO,
            LogFormat::Text => Level::DEBUG,
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer().with_writer(std::io::stderr);
        match self {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.with_ansi(false).json().flatten_event(true).boxed(),
        }
    }
}

/// Logs a panic as one error event, with the location as fields so it can be filtered on.
fn report_panic(panic_info: &PanicHookInfo<'_>) {
    let payload = panic_info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>");

    // empty unless RUST_BACKTRACE or RUST_LIB_BACKTRACE is set
    let backtrace = Backtrace::capture();
    let backtrace = (backtrace.status() == BacktraceStatus::Captured).then_some(backtrace);

    match (panic_info.location(), backtrace) {
        (Some(location), None) => tracing::error!(
            file = location.file(),
            line = location.line(),
            column = location.column(),
            "Panicked: {payload}"
        ),
        (Some(location), Some(backtrace)) => tracing::error!(
            file = location.file(),
            line = location.line(),
            column = location.column(),
            %backtrace,
            "Panicked: {payload}"
        ),
        (None, backtrace) => tracing::error!(?backtrace, "Panicked: {payload}"),
    }
}

/// Installs the global subscriber and the panic hook. `RUST_LOG` overrides the default level
/// picked by [LogFormat].
pub fn register() {
    let format = LogFormat::from_debug_flag(std::env::var(ENV_DEBUG).ok().as_deref());

    let filter = EnvFilter::builder()
        .with_default_directive(format.default_level().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(format.layer())
        .with(filter)
        .init();

    std::panic::set_hook(Box::new(report_panic));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_debug_flag() {
        assert_eq!(LogFormat::from_debug_flag(None), LogFormat::Json);
        assert_eq!(LogFormat::from_debug_flag(Some("false")), LogFormat::Json);
        assert_eq!(LogFormat::from_debug_flag(Some("1")), LogFormat::Json);
        assert_eq!(LogFormat::from_debug_flag(Some("true")), LogFormat::Text);
        assert_eq!(LogFormat::from_debug_flag(Some("TRUE")), LogFormat::Text);
    }

    #[test]
    fn test_default_level() {
        assert_eq!(LogFormat::Json.default_level(), Level::INFO);
        assert_eq!(LogFormat::Text.default_level(), Level::DEBUG);
    }
}
