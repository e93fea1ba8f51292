//! Tracing subscriber installation.

use tracing_subscriber::EnvFilter;

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Pretty,
}

impl LogFormat {
    /// Parse `json` / `pretty` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// Format named by `LOG_FORMAT`, JSON when unset or unrecognized.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        lookup("LOG_FORMAT")
            .and_then(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Returns whether this call installed it.
pub fn init(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Job spans carry the queue name; keep them on every line.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init().is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[test]
    fn format_comes_from_log_format_key() {
        let pretty = LogFormat::from_lookup(|key| (key == "LOG_FORMAT").then(|| "pretty".to_string()));
        assert_eq!(pretty, LogFormat::Pretty);
        assert_eq!(LogFormat::from_lookup(|_| None), LogFormat::Json);
        assert_eq!(
            LogFormat::from_lookup(|_| Some("xml".to_string())),
            LogFormat::Json
        );
    }

    #[test]
    fn second_init_is_a_noop() {
        init(LogFormat::Pretty);
        assert!(!init(LogFormat::Json));
    }
}
