//! The forwarding leaf: a counter-only aggregator whose flushes
//! are binary frames handed to a dedicated [`PersistentConn`] writer,
//! instead of Graphite text lines.

use super::frame;
use crate::aggregate::{task, Inbound};
use crate::stat::StatType;
use crossbeam::channel::{Receiver, Sender};
use std::collections::HashMap;
use std::time::Duration;
use tracing::error;

/// Meta-metric name for the leaf's per-window distinct-counter count,
/// folded into the forwarded frame itself (the leaf's own synthetic metric,
/// applied to the leaf role).
pub const DISTINCT_LEAF_METRICS_FLUSHED: &str = "distinct_leaf_metrics_flushed";

/// Runs the leaf aggregator to completion. Only counters are ever routed
/// here by the classifier; the leaf store is always fully
/// cleared every flush regardless of `clear_stats_between_flushes` (spec
/// §4.3: "the leaf store is always cleared").
pub fn run(inbound: &Receiver<Inbound>, shutdown: &Receiver<()>, flush_interval: Duration, outbound: &Sender<Vec<u8>>) {
    task::run(inbound, shutdown, flush_interval, &[], true, |snapshot| {
        let mut bundle: HashMap<String, f64> = snapshot.counters.into_iter().collect();
        bundle.insert(
            DISTINCT_LEAF_METRICS_FLUSHED.to_string(),
            snapshot.distinct_metrics as f64,
        );
        match frame::encode(&bundle) {
            Ok(payload) => {
                if outbound.send(payload).is_err() {
                    error!("forwarding sender gone, dropping leaf flush");
                }
            }
            Err(err) => error!("failed to encode forwarding frame: {err}"),
        }
    });
}

/// Returns `true` if `kind` is eligible for leaf forwarding (only counters
/// can be forwarded; the `forward` flag may be set only on
/// counters").
#[must_use]
pub fn is_forwardable(kind: StatType) -> bool {
    matches!(kind, StatType::Counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_counters_are_forwardable() {
        assert!(is_forwardable(StatType::Counter));
        assert!(!is_forwardable(StatType::Gauge));
        assert!(!is_forwardable(StatType::Timer));
        assert!(!is_forwardable(StatType::Set));
    }

    #[test]
    fn leaf_flush_encodes_a_frame_with_distinct_count() {
        use crate::stat::Stat;
        use crossbeam::channel::{bounded, unbounded};

        let (stat_tx, stat_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (outbound_tx, outbound_rx) = unbounded();

        for _ in 0..5 {
            stat_tx
                .send(Inbound::Stat(Stat::counter("hits".into(), 1.0, 1.0, true)))
                .unwrap();
        }

        let handle = std::thread::spawn(move || {
            run(&stat_rx, &shutdown_rx, Duration::from_millis(15), &outbound_tx);
        });

        let frame_bytes = outbound_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let mut cursor = std::io::Cursor::new(frame_bytes);
        let bundle = frame::decode_one(&mut cursor).unwrap().unwrap();
        assert_eq!(bundle["hits"], 5.0);
        assert_eq!(bundle[DISTINCT_LEAF_METRICS_FLUSHED], 1.0);

        drop(stat_tx);
        shutdown_tx.send(()).ok();
        handle.join().unwrap();
    }
}
