//! Top-level wiring: turns a [`MetricsConfig`] into the full
//! set of running threads — UDP receiver, worker pool, main aggregator,
//! optional forwarding leaf, optional forwarding upstream — and blocks on
//! the receive loop for the life of the process.

use crate::aggregate::{task, Inbound};
use crate::bufferpool::BufferPool;
use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::forward::{leaf, upstream};
use crate::graphite;
use crate::net::spawn_writer;
use crate::receiver;
use crossbeam::channel::{bounded, never, unbounded, Sender};
use std::net::UdpSocket;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Bounded outbound queue depth, in flush windows, ahead of each
/// [`crate::net::PersistentConn`] writer (the documented choice for
/// the open backpressure question).
const OUTBOUND_QUEUE_CAPACITY: usize = 8;

/// Synthetic per-window distinct-metric-count name for the main aggregator,
/// analogous to [`crate::forward::leaf::DISTINCT_LEAF_METRICS_FLUSHED`] — a
/// fixed role literal, not derived from the configurable namespace.
const DISTINCT_MAIN_METRICS_FLUSHED: &str = "distinct_metrics_flushed";
/// Synthetic per-window distinct-metric-count name for the forwarded-upstream
/// aggregator.
const DISTINCT_FORWARDED_METRICS_FLUSHED: &str = "distinct_forwarded_metrics_flushed";

/// Starts every component described by `config` and blocks until the UDP
/// receive loop exits (a fatal socket error is the only expected
/// exit path).
///
/// # Errors
/// Returns [`MetricsError::StdIo`] if the UDP socket can't be bound, or if
/// `receiver::run` exits with an error.
pub fn run(config: MetricsConfig) -> Result<(), MetricsError> {
    let graphite_addr = config
        .graphite_addr
        .ok_or_else(|| MetricsError::Config("graphite_addr is required".to_string()))?;

    let pool = BufferPool::new(config.buffer_pool_size, config.buffer_capacity);
    let flush_interval = config.flush_interval();

    let (graphite_tx, graphite_rx) = bounded::<Vec<u8>>(OUTBOUND_QUEUE_CAPACITY);
    spawn_writer(graphite_addr, graphite_rx, never());

    let (main_tx, main_rx) = unbounded::<Inbound>();
    spawn_main_aggregator(
        main_rx,
        never(),
        flush_interval,
        config.percentiles.clone(),
        config.clear_stats_between_flushes,
        config.namespace.clone(),
        DISTINCT_MAIN_METRICS_FLUSHED,
        graphite_tx.clone(),
    );

    let leaf_tx = config.forwarding_addr.map(|forwarding_addr| {
        let (leaf_tx, leaf_rx) = unbounded::<Inbound>();
        let (forward_tx, forward_rx) = bounded::<Vec<u8>>(OUTBOUND_QUEUE_CAPACITY);
        spawn_writer(forwarding_addr, forward_rx, never());
        std::thread::spawn(move || {
            leaf::run(&leaf_rx, &never(), flush_interval, &forward_tx);
        });
        leaf_tx
    });

    if let Some(forwarder_listen_addr) = config.forwarder_listen_addr {
        let (forwarded_tx, forwarded_rx) = unbounded::<Inbound>();
        spawn_main_aggregator(
            forwarded_rx,
            never(),
            flush_interval,
            config.percentiles.clone(),
            true, // forwarded-upstream store is always fully cleared
            config.forwarded_namespace.clone(),
            DISTINCT_FORWARDED_METRICS_FLUSHED,
            graphite_tx.clone(),
        );
        let main_tx_for_upstream = main_tx.clone();
        std::thread::spawn(move || {
            if let Err(err) = upstream::run(forwarder_listen_addr, forwarded_tx, main_tx_for_upstream) {
                tracing::error!("forwarding upstream listener exited: {err}");
            }
        });
    }

    let socket = UdpSocket::bind(("0.0.0.0", config.port))?;
    info!("listening for statsd datagrams on {}", socket.local_addr()?);
    let worker_count = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
    receiver::run(&socket, &pool, &main_tx, leaf_tx.as_ref(), worker_count)
}

#[allow(clippy::too_many_arguments)]
fn spawn_main_aggregator(
    inbound_rx: crossbeam::channel::Receiver<Inbound>,
    shutdown_rx: crossbeam::channel::Receiver<()>,
    flush_interval: std::time::Duration,
    percentiles: Vec<f64>,
    clear: bool,
    namespace: String,
    distinct_metric_name: &'static str,
    outbound_tx: Sender<Vec<u8>>,
) {
    std::thread::spawn(move || {
        task::run(
            &inbound_rx,
            &shutdown_rx,
            flush_interval,
            &percentiles,
            clear,
            |snapshot| {
                let timestamp = unix_timestamp();
                let payload = graphite::render(
                    &snapshot,
                    &namespace,
                    timestamp,
                    flush_interval.as_secs_f64(),
                    distinct_metric_name,
                );
                if outbound_tx.send(payload.into_bytes()).is_err() {
                    tracing::error!("graphite writer gone, dropping a flush payload");
                }
            },
        );
    });
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
