//! CLI argument definitions for scanrelay-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use scanrelay_core::config::ScanrelayConfig;

/// scanrelay scan orchestration daemon.
///
/// Runs the continuation tracker and the stuck-job remediator, and exposes
/// the admin surface for breakers, budgets and SLOs.
#[derive(Parser, Debug)]
#[command(name = "scanrelay-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to scanrelay.toml configuration file.
    #[arg(short, long, default_value = "/etc/scanrelay/scanrelay.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of a loaded configuration.
    ///
    /// The caller is expected to re-run `validate()` afterwards.
    pub fn apply_overrides(&self, config: &mut ScanrelayConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = DaemonCli::parse_from(["scanrelay-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/scanrelay/scanrelay.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let cli = DaemonCli::parse_from([
            "scanrelay-daemon",
            "--config",
            "/tmp/scanrelay.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        let mut config = ScanrelayConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert!(cli.validate);
        assert!(config.validate().is_ok());
    }
}
