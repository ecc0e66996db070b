//! Logging initialization for scanrelay-daemon.
//!
//! Builds the global `tracing-subscriber` from the `[general]` section.
//! Every scan, provider and breaker log line carries structured fields
//! (`scan_id`, `provider`, `status`), so the JSON format is the one to ship
//! to a log store; `pretty` is meant for a terminal.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use scanrelay_core::config::GeneralConfig;

/// Dependency targets that are capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "metrics_exporter_prometheus"];

/// Output format of the daemon's log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Filter from `RUST_LOG` when set, otherwise from `general.log_level`
/// with chatty dependencies held at `warn`.
pub fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    QUIET_TARGETS
        .iter()
        .fold(EnvFilter::new(log_level), |filter, target| {
            match format!("{target}=warn").parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            }
        })
}

/// Install the global tracing subscriber.
///
/// Call once, before the orchestrator is built.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let registry = tracing_subscriber::registry().with(build_filter(&config.log_level));

    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialize {:?} tracing subscriber: {}", format, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parses_known_values() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("JSON".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }

    #[test]
    fn test_filter_quiets_dependencies() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let rendered = build_filter("debug").to_string();
        assert!(rendered.contains("hyper=warn"));
        assert!(rendered.contains("debug"));
    }
}
