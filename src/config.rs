//! Recognized configuration options and their loading.
//!
//! Configuration loading itself is an external collaborator per the
//! specification (not a core component to redesign); what lives here is the
//! minimal surface needed to start the process: CLI flags via `clap`, with
//! an optional TOML file merged underneath (CLI always wins).

use crate::error::MetricsError;
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

fn default_port() -> u16 {
    8125
}
fn default_namespace() -> String {
    "stats".to_string()
}
fn default_forwarded_namespace() -> String {
    "stats.forwarded".to_string()
}
fn default_flush_interval_ms() -> u64 {
    10_000
}
fn default_clear() -> bool {
    true
}
fn default_percentiles() -> Vec<f64> {
    vec![90.0]
}
fn default_pool_size() -> usize {
    crate::bufferpool::DEFAULT_POOL_SIZE
}
fn default_buffer_capacity() -> usize {
    crate::bufferpool::DEFAULT_BUFFER_CAPACITY
}

/// Fully-resolved runtime configuration, covering the recognized options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// UDP ingress port.
    pub port: u16,
    /// Upstream Graphite `host:port`.
    pub graphite_addr: Option<SocketAddr>,
    /// Emission prefix for the main aggregator.
    pub namespace: String,
    /// Emission prefix for the forwarded-upstream aggregator.
    pub forwarded_namespace: String,
    /// Flush window length in milliseconds; shared by all three flush tasks.
    pub flush_interval_ms: u64,
    /// Gauge/set carryover switch.
    pub clear_stats_between_flushes: bool,
    /// If set, this leaf forwards counters to the given upstream address.
    pub forwarding_addr: Option<SocketAddr>,
    /// If set, this instance accepts forwarded counters on the given address.
    pub forwarder_listen_addr: Option<SocketAddr>,
    /// Percentiles emitted per timer, as `upper_<p>` series.
    pub percentiles: Vec<f64>,
    /// Buffer pool cardinality.
    pub buffer_pool_size: usize,
    /// Per-buffer capacity in bytes.
    pub buffer_capacity: usize,

    /// Accepted for compatibility with the recognized options surface;
    /// the debug tap itself is an external collaborator and not
    /// implemented by this build.
    pub debug_port: Option<u16>,
    /// Accepted, not implemented: OS-level metric probes.
    pub os_stats: bool,
    /// Accepted, not implemented: periodic script runners.
    pub scripts: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            graphite_addr: None,
            namespace: default_namespace(),
            forwarded_namespace: default_forwarded_namespace(),
            flush_interval_ms: default_flush_interval_ms(),
            clear_stats_between_flushes: default_clear(),
            forwarding_addr: None,
            forwarder_listen_addr: None,
            percentiles: default_percentiles(),
            buffer_pool_size: default_pool_size(),
            buffer_capacity: default_buffer_capacity(),
            debug_port: None,
            os_stats: false,
            scripts: Vec::new(),
        }
    }
}

impl MetricsConfig {
    /// The flush window as a [`Duration`].
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    fn validate(&self) -> Result<(), MetricsError> {
        if self.graphite_addr.is_none() {
            return Err(MetricsError::Config(
                "graphite_addr is required".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(MetricsError::Config(
                "flush_interval_ms must be non-zero".to_string(),
            ));
        }
        for p in &self.percentiles {
            if !(*p > 0.0 && *p < 100.0) {
                return Err(MetricsError::Config(format!(
                    "percentile {p} is outside (0, 100)"
                )));
            }
        }
        Ok(())
    }
}

/// Command-line surface. A `--config` file, if given, is parsed as TOML and
/// used to fill in anything not also passed on the command line.
#[derive(Debug, Parser)]
#[command(name = "gost-metrics", about = "Statsd-compatible metrics aggregator")]
pub struct Cli {
    /// Optional TOML config file merged underneath CLI flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// UDP ingress port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Upstream Graphite host:port.
    #[arg(long)]
    pub graphite_addr: Option<SocketAddr>,

    /// Emission prefix for the main aggregator.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Emission prefix for the forwarded-upstream aggregator.
    #[arg(long)]
    pub forwarded_namespace: Option<String>,

    /// Flush window length in milliseconds.
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,

    /// Whether gauges/sets are cleared between flushes.
    #[arg(long)]
    pub clear_stats_between_flushes: Option<bool>,

    /// Enable leaf forwarding to this upstream address.
    #[arg(long)]
    pub forwarding_addr: Option<SocketAddr>,

    /// Enable upstream forwarding, listening on this address.
    #[arg(long)]
    pub forwarder_listen_addr: Option<SocketAddr>,
}

impl Cli {
    /// Loads and validates configuration: start from the optional TOML
    /// file, then overlay any flags explicitly passed on the CLI.
    ///
    /// # Errors
    /// Returns [`MetricsError::Config`] if the file can't be read/parsed,
    /// or if the merged configuration fails validation (e.g. no
    /// `graphite_addr`). Configuration failure at startup is always fatal.
    pub fn load(self) -> Result<MetricsConfig, MetricsError> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| MetricsError::Config(format!("reading {path:?}: {e}")))?;
                toml::from_str(&text)
                    .map_err(|e| MetricsError::Config(format!("parsing {path:?}: {e}")))?
            }
            None => MetricsConfig::default(),
        };

        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = self.graphite_addr {
            config.graphite_addr = Some(v);
        }
        if let Some(v) = self.namespace {
            config.namespace = v;
        }
        if let Some(v) = self.forwarded_namespace {
            config.forwarded_namespace = v;
        }
        if let Some(v) = self.flush_interval_ms {
            config.flush_interval_ms = v;
        }
        if let Some(v) = self.clear_stats_between_flushes {
            config.clear_stats_between_flushes = v;
        }
        if let Some(v) = self.forwarding_addr {
            config.forwarding_addr = Some(v);
        }
        if let Some(v) = self.forwarder_listen_addr {
            config.forwarder_listen_addr = Some(v);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = MetricsConfig::default();
        assert_eq!(config.port, 8125);
        assert_eq!(config.namespace, "stats");
        assert!(config.clear_stats_between_flushes);
    }

    #[test]
    fn validation_requires_graphite_addr() {
        let config = MetricsConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_percentile() {
        let mut config = MetricsConfig {
            graphite_addr: Some("127.0.0.1:2003".parse().unwrap()),
            ..MetricsConfig::default()
        };
        config.percentiles = vec![100.0];
        assert!(config.validate().is_err());
    }
}
