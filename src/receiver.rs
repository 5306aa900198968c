//! UDP ingest: receive on a single thread, parse on a
//! worker pool, and route each decoded stat to the main aggregator or, for
//! forward-marked counters, to the forwarding leaf.
//!
//! Follows a "never block the hot path" discipline: `recv_from` never does
//! any parsing itself, handing each filled [`Buffer`] to a fixed worker
//! pool over a bounded `crossbeam` channel instead.

use crate::aggregate::Inbound;
use crate::bufferpool::{Buffer, BufferPool};
use crate::error::MetricsError;
use crate::meta;
use crate::parser;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::net::UdpSocket;
use tracing::warn;

/// Runs the UDP receive loop to completion. Only returns on a socket error;
/// a process is expected to treat that as fatal.
///
/// `leaf_tx` is `None` when this instance has no `forwarding_addr`
/// configured, in which case forward-marked counters are folded into the
/// main aggregator instead of being dropped.
///
/// # Errors
/// Returns [`MetricsError::StdIo`] if `recv_from` fails.
pub fn run(
    socket: &UdpSocket,
    pool: &BufferPool,
    main_tx: &Sender<Inbound>,
    leaf_tx: Option<&Sender<Inbound>>,
    worker_count: usize,
) -> Result<(), MetricsError> {
    let (job_tx, job_rx) = bounded::<Buffer>(worker_count.max(1) * 2);
    for _ in 0..worker_count.max(1) {
        let job_rx = job_rx.clone();
        let main_tx = main_tx.clone();
        let leaf_tx = leaf_tx.cloned();
        std::thread::spawn(move || worker_loop(&job_rx, &main_tx, leaf_tx.as_ref()));
    }

    loop {
        let mut buf = pool.acquire();
        match socket.recv_from(buf.as_mut_slice()) {
            Ok((len, _peer)) => {
                if len >= buf.capacity() {
                    let _ = main_tx.send(Inbound::Stat(meta::increment(meta::UDP_MESSAGE_TOO_LARGE)));
                    continue;
                }
                buf.set_filled(len);
                let _ = main_tx.send(Inbound::Stat(meta::increment(meta::PACKETS_RECEIVED)));
                if job_tx.send(buf).is_err() {
                    return Ok(());
                }
            }
            Err(err) => {
                warn!("udp recv_from failed: {err}");
                return Err(err.into());
            }
        }
    }
}

fn worker_loop(job_rx: &Receiver<Buffer>, main_tx: &Sender<Inbound>, leaf_tx: Option<&Sender<Inbound>>) {
    while let Ok(buf) = job_rx.recv() {
        for line in parser::split_lines(buf.filled()) {
            route(line, main_tx, leaf_tx);
        }
    }
}

fn route(line: &str, main_tx: &Sender<Inbound>, leaf_tx: Option<&Sender<Inbound>>) {
    match parser::parse_message(line) {
        Ok(stat) if stat.forward => {
            let target = leaf_tx.unwrap_or(main_tx);
            let _ = target.send(Inbound::Stat(stat));
        }
        Ok(stat) => {
            let _ = main_tx.send(Inbound::Stat(stat));
        }
        Err(MetricsError::BadMetricTypeForForwarding(_)) => {
            let _ = main_tx.send(Inbound::Stat(meta::increment(
                meta::BAD_METRIC_TYPE_FOR_FORWARDING,
            )));
        }
        Err(_) => {
            let _ = main_tx.send(Inbound::Stat(meta::increment(meta::BAD_MESSAGE)));
        }
    }
}
