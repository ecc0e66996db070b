//! Prometheus metrics HTTP server.
//!
//! Installs the `metrics-exporter-prometheus` recorder with its built-in
//! HTTP listener. Provider call latency and scan completion time are
//! exported as real histograms using the bucket layouts from
//! `scanrelay_core::metrics`; every other histogram stays a summary.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use scanrelay_core::config::MetricsConfig;
use scanrelay_core::metrics as m;

/// Scrape address derived from `[metrics]`.
///
/// The exporter serves a single fixed path, so any other `endpoint` is a
/// configuration error rather than something silently ignored.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "metrics endpoint '{}' is not served, the exporter only answers on '/metrics'",
            config.endpoint
        ));
    }

    let raw = format!("{}:{}", config.listen_addr, config.port);
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address '{}': {}", raw, e))
}

/// Prometheus builder with the daemon's histogram buckets applied.
fn builder(addr: SocketAddr) -> Result<PrometheusBuilder> {
    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::PROVIDER_CALL_DURATION_SECONDS.to_owned()),
            &m::PROVIDER_CALL_DURATION_BUCKETS,
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(m::SCAN_COMPLETION_SECONDS.to_owned()),
                &m::SCAN_COMPLETION_BUCKETS,
            )
        })
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?;
    Ok(builder)
}

/// Install the global metrics recorder and start the scrape listener.
///
/// Call once per process; a second call fails because the global
/// recorder is already set.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    builder(addr)?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder on {}: {}", addr, e))?;
    m::describe_all();

    tracing::info!(listen_addr = %addr, path = %config.endpoint, "Prometheus metrics endpoint active");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_from_defaults() {
        let addr = listen_addr(&MetricsConfig::default()).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9464");
    }

    #[test]
    fn test_custom_endpoint_is_rejected() {
        let config = MetricsConfig {
            endpoint: "/prom".to_owned(),
            ..MetricsConfig::default()
        };
        let err = listen_addr(&config).unwrap_err();
        assert!(err.to_string().contains("'/prom'"));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let config = MetricsConfig {
            listen_addr: "not-an-ip".to_owned(),
            ..MetricsConfig::default()
        };
        let err = listen_addr(&config).unwrap_err();
        assert!(err.to_string().contains("invalid metrics listen address 'not-an-ip:9464'"));
    }

    #[test]
    fn test_builder_accepts_histogram_buckets() {
        let addr = listen_addr(&MetricsConfig::default()).unwrap();
        assert!(builder(addr).is_ok());
    }
}
