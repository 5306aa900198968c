//! End-to-end scenarios exercising the real receive -> aggregate -> emit
//! pipeline, wired the way `server::run` wires it but with each flush
//! routed back to the test instead of over a real TCP link.
//!
//! Style: spawn a background thread driving the system under test, collect
//! output on a channel, assert with a bounded timeout.

use crossbeam::channel::{bounded, never, unbounded, Receiver};
use gost_metrics::aggregate::{task, FlushSnapshot, Inbound};
use gost_metrics::bufferpool::BufferPool;
use gost_metrics::forward::{frame, leaf, upstream};
use gost_metrics::{receiver, stat::Stat};
use std::net::UdpSocket;
use std::time::Duration;

const FLUSH_INTERVAL: Duration = Duration::from_millis(40);
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Starts a main aggregator on an unbounded inbound channel, returning the
/// inbound sender and a channel that receives one [`FlushSnapshot`] per
/// flush tick.
fn spawn_aggregator() -> (crossbeam::channel::Sender<Inbound>, Receiver<FlushSnapshot>) {
    let (inbound_tx, inbound_rx) = unbounded();
    let (flush_tx, flush_rx) = unbounded();
    std::thread::spawn(move || {
        task::run(&inbound_rx, &never(), FLUSH_INTERVAL, &[90.0], true, |snap| {
            let _ = flush_tx.send(snap);
        });
    });
    (inbound_tx, flush_rx)
}

/// Starts the UDP receiver on an ephemeral port, wired to `main_tx` (and
/// optionally `leaf_tx`), and returns the bound address.
fn spawn_receiver(main_tx: crossbeam::channel::Sender<Inbound>, leaf_tx: Option<crossbeam::channel::Sender<Inbound>>) -> std::net::SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind udp ingress");
    let addr = socket.local_addr().expect("local addr");
    let pool = BufferPool::new(16, 1024);
    std::thread::spawn(move || {
        let _ = receiver::run(&socket, &pool, &main_tx, leaf_tx.as_ref(), 2);
    });
    addr
}

fn send_lines(addr: std::net::SocketAddr, lines: &[&str]) {
    let sender = UdpSocket::bind("127.0.0.1:0").expect("bind udp test sender");
    for line in lines {
        sender.send_to(line.as_bytes(), addr).expect("send datagram");
    }
}

fn next_non_empty_flush(flush_rx: &Receiver<FlushSnapshot>) -> FlushSnapshot {
    loop {
        let snap = flush_rx.recv_timeout(RECV_TIMEOUT).expect("a flush arrives");
        if !snap.counters.is_empty() || !snap.gauges.is_empty() || !snap.timers.is_empty() || !snap.sets.is_empty() {
            return snap;
        }
    }
}

/// Sums counters named in `targets` across flush windows until every one
/// reaches its target or `RECV_TIMEOUT` elapses, returning the observed
/// totals keyed by name. A single pass so multiple counters sent together
/// (e.g. a meta-counter alongside the stat that triggered it) are seen
/// from the same windows rather than racing separate drains of the channel.
fn accumulate_counters(flush_rx: &Receiver<FlushSnapshot>, targets: &[(&str, f64)]) -> std::collections::HashMap<String, f64> {
    let deadline = std::time::Instant::now() + RECV_TIMEOUT;
    let mut totals: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    let done = |totals: &std::collections::HashMap<String, f64>| {
        targets
            .iter()
            .all(|(name, target)| totals.get(*name).copied().unwrap_or(0.0) >= *target)
    };
    while std::time::Instant::now() < deadline && !done(&totals) {
        if let Ok(snap) = flush_rx.recv_timeout(Duration::from_millis(500)) {
            for (n, v) in snap.counters {
                *totals.entry(n).or_insert(0.0) += v;
            }
        }
    }
    totals
}

fn accumulate_counter(flush_rx: &Receiver<FlushSnapshot>, name: &str, target: f64) -> f64 {
    accumulate_counters(flush_rx, &[(name, target)])
        .get(name)
        .copied()
        .unwrap_or(0.0)
}

#[test]
fn basic_counter_sums_across_a_window() {
    let (main_tx, flush_rx) = spawn_aggregator();
    let addr = spawn_receiver(main_tx, None);

    send_lines(addr, &["hits:1|c", "hits:1|c", "hits:1|c"]);

    let total = accumulate_counter(&flush_rx, "hits", 3.0);
    assert!((total - 3.0).abs() < 1e-9, "expected 3.0, saw {total}");
}

#[test]
fn sampled_counter_applies_correction_once() {
    let (main_tx, flush_rx) = spawn_aggregator();
    let addr = spawn_receiver(main_tx, None);

    send_lines(addr, &["hits:1|c|@0.1"]);

    let total = accumulate_counter(&flush_rx, "hits", 10.0);
    assert!((total - 10.0).abs() < 1e-9, "expected 10.0, saw {total}");
}

#[test]
fn gauge_carries_over_to_the_next_window_when_not_cleared() {
    let (inbound_tx, inbound_rx) = unbounded();
    let (flush_tx, flush_rx) = unbounded();
    std::thread::spawn(move || {
        task::run(&inbound_rx, &never(), FLUSH_INTERVAL, &[90.0], false, |snap| {
            let _ = flush_tx.send(snap);
        });
    });

    inbound_tx.send(Inbound::Stat(Stat::gauge("temp".to_string(), 72.0))).unwrap();

    let first = next_non_empty_flush(&flush_rx);
    assert_eq!(first.gauges, vec![("temp".to_string(), 72.0)]);

    let second = next_non_empty_flush(&flush_rx);
    assert_eq!(second.gauges, vec![("temp".to_string(), 72.0)]);
}

#[test]
fn timer_reduction_reports_exact_min_max_mean() {
    let (main_tx, flush_rx) = spawn_aggregator();
    let addr = spawn_receiver(main_tx, None);

    send_lines(addr, &["latency:10|ms", "latency:20|ms", "latency:30|ms"]);

    let snap = next_non_empty_flush(&flush_rx);
    let (name, timer) = &snap.timers[0];
    assert_eq!(name, "latency");
    assert_eq!(timer.count, 3);
    assert!((timer.min - 10.0).abs() < 1e-6);
    assert!((timer.max - 30.0).abs() < 1e-6);
    assert!((timer.mean - 20.0).abs() < 1e-6);
}

#[test]
fn set_reports_exact_distinct_cardinality() {
    let (main_tx, flush_rx) = spawn_aggregator();
    let addr = spawn_receiver(main_tx, None);

    send_lines(addr, &["uniques:1|s", "uniques:2|s", "uniques:1|s"]);

    let snap = next_non_empty_flush(&flush_rx);
    assert_eq!(snap.sets, vec![("uniques".to_string(), 2)]);
}

#[test]
fn forwarded_counters_are_merged_upstream() {
    // Leaf side: a counter-only aggregator whose flushes go out as binary
    // frames over a TCP link to the upstream listener. Every leaf flush
    // also carries the `distinct_leaf_metrics_flushed` meta-counter, so
    // this asserts on the forwarded `hits` total rather than on the full
    // merged counter set.
    let (leaf_tx, leaf_rx) = unbounded();
    let (forward_tx, forward_rx) = bounded::<Vec<u8>>(16);
    std::thread::spawn(move || {
        leaf::run(&leaf_rx, &never(), FLUSH_INTERVAL, &forward_tx);
    });

    let upstream_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind upstream");
    let upstream_addr = upstream_listener.local_addr().expect("upstream addr");
    drop(upstream_listener);

    let (merge_tx, merge_flush_rx) = spawn_aggregator();
    let (main_tx, _main_rx) = unbounded();
    let main_tx_for_upstream = main_tx.clone();
    std::thread::spawn(move || {
        let _ = upstream::run(upstream_addr, merge_tx, main_tx_for_upstream);
    });
    std::thread::sleep(Duration::from_millis(100)); // let the listener bind

    gost_metrics::net::spawn_writer(upstream_addr, forward_rx, never());

    let addr = spawn_receiver(main_tx, Some(leaf_tx));
    send_lines(addr, &["f|hits:1|c", "f|hits:1|c"]);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let mut total_hits = 0.0_f64;
    while std::time::Instant::now() < deadline && total_hits < 2.0 {
        if let Ok(snap) = merge_flush_rx.recv_timeout(Duration::from_millis(500)) {
            for (name, value) in snap.counters {
                if name == "hits" {
                    total_hits += value;
                }
            }
        }
    }
    assert!((total_hits - 2.0).abs() < 1e-9, "expected 2.0 forwarded hits, saw {total_hits}");
}

#[test]
fn malformed_and_oversized_datagrams_are_counted_not_dropped_silently() {
    let (main_tx, flush_rx) = spawn_aggregator();
    let addr = spawn_receiver(main_tx, None);

    send_lines(addr, &["not-a-valid-statsd-line"]);

    let totals = accumulate_counters(&flush_rx, &[("errors.bad_message", 1.0), ("packets_received", 1.0)]);
    assert!((totals.get("errors.bad_message").copied().unwrap_or(0.0) - 1.0).abs() < 1e-9);
    assert!((totals.get("packets_received").copied().unwrap_or(0.0) - 1.0).abs() < 1e-9);
}

#[test]
fn frame_round_trip_survives_a_real_socket() {
    use std::collections::HashMap;
    use std::io::Write;

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        frame::decode_one(&mut stream).unwrap().unwrap()
    });

    let mut bundle = HashMap::new();
    bundle.insert("forwarded.hits".to_string(), 42.0);
    let payload = frame::encode(&bundle).unwrap();

    let mut client = std::net::TcpStream::connect(addr).unwrap();
    client.write_all(&payload).unwrap();
    drop(client);

    let decoded = server.join().unwrap();
    assert_eq!(decoded["forwarded.hits"], 42.0);
}
