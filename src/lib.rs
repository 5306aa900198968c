//! # gost-metrics
//!
//! A statsd-compatible metrics aggregator: UDP ingest, typed in-memory
//! aggregation (counters, gauges, timers, sets), Graphite-format egress over
//! a persistent auto-reconnecting TCP link, and an optional two-tier
//! counter-forwarding topology for fleets that want one upstream rollup.
//!
//! ## Quick start
//!
//! ```no_run
//! use gost_metrics::config::{Cli, MetricsConfig};
//! use clap::Parser;
//!
//! let config: MetricsConfig = Cli::parse().load().expect("invalid configuration");
//! gost_metrics::server::run(config).expect("server exited");
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod aggregate;
pub mod bufferpool;
pub mod config;
pub mod error;
pub mod forward;
pub mod graphite;
pub mod meta;
pub mod net;
pub mod parser;
pub mod receiver;
pub mod server;
pub mod stat;

pub use error::{MetricResult, MetricsError};
pub use stat::{Stat, StatType};
