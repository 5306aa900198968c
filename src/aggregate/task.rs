//! The aggregator control loop: a select between "new
//! stat" (or "merged bundle") and "flush tick", run once per role (main,
//! forwarding-leaf, forwarded-upstream).
//!
//! A `crossbeam::select!` between a `crossbeam::channel::tick(flush_interval)`
//! and an inbound channel, looping until a shutdown signal arrives.

use super::store::{FlushSnapshot, MetricStore};
use crate::error::MetricsError;
use crate::stat::Stat;
use crossbeam::channel::{tick, Receiver};
use crossbeam::select;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// What an aggregator task can receive besides the flush tick.
pub enum Inbound {
    /// A single parsed stat, destined for one of the four accumulators.
    Stat(Stat),
    /// A forwarded leaf's counter bundle, merged additively.
    Merge(HashMap<String, f64>),
}

fn apply(store: &mut MetricStore, inbound: Inbound) -> Result<(), MetricsError> {
    match inbound {
        Inbound::Stat(stat) => match stat.kind {
            crate::stat::StatType::Counter => store.record_counter(&stat.name, stat.value),
            crate::stat::StatType::Gauge => store.record_gauge(&stat.name, stat.value),
            crate::stat::StatType::Timer => store.record_timer(&stat.name, stat.value),
            crate::stat::StatType::Set => store.record_set(&stat.name, stat.value),
        },
        Inbound::Merge(bundle) => store.merge_counters(bundle),
    }
}

/// Runs one aggregator role to completion (until `shutdown` fires or
/// `inbound`'s senders are all dropped).
///
/// `on_flush` is called synchronously with each window's reduction, in
/// window order ("flush payloads for one store are delivered to
/// the outbound writer in window order") — the caller is expected to hand
/// the snapshot to an outbound queue without blocking the aggregator for
/// long, since the next tick will fire regardless.
pub fn run(
    inbound: &Receiver<Inbound>,
    shutdown: &Receiver<()>,
    flush_interval: Duration,
    percentiles: &[f64],
    clear: bool,
    mut on_flush: impl FnMut(FlushSnapshot),
) {
    let mut store = MetricStore::new();
    let ticker = tick(flush_interval);

    loop {
        select! {
            recv(inbound) -> msg => {
                match msg {
                    Ok(inbound) => {
                        if let Err(err) = apply(&mut store, inbound) {
                            warn!("dropping stat: {err}");
                        }
                    }
                    Err(_) => return,
                }
            }
            recv(ticker) -> _ => {
                let snapshot = store.flush(percentiles, clear);
                on_flush(snapshot);
            }
            recv(shutdown) -> _ => return,
        }
    }
}
