//! Graphite line-protocol emitter.
//!
//! Grounded on `other_examples`' `qoollo-bob` graphite exporter
//! (`flush_counters`/`flush_gauges`/`flush_times`): build one `String`
//! payload per flush tick by appending `path value timestamp\n` lines, then
//! hand the whole payload to the sender in one write.

use crate::aggregate::FlushSnapshot;
use itoa::Buffer as IntBuffer;

/// Renders one flush window's snapshot as a single Graphite payload.
///
/// All series in the payload share `timestamp` (the flush instant, not a
/// per-sample time). `flush_interval_secs` is used to derive
/// each counter's `.rate` series from its `.count` sum.
#[must_use]
pub fn render(
    snapshot: &FlushSnapshot,
    namespace: &str,
    timestamp: u64,
    flush_interval_secs: f64,
    distinct_metric_name: &str,
) -> String {
    let mut out = String::new();
    let mut int_buf = IntBuffer::new();

    for (name, sum) in &snapshot.counters {
        push_line(&mut out, namespace, name, "count", *sum, timestamp);
        let rate = if flush_interval_secs > 0.0 {
            sum / flush_interval_secs
        } else {
            0.0
        };
        push_line(&mut out, namespace, name, "rate", rate, timestamp);
    }

    for (name, value) in &snapshot.gauges {
        push_line(&mut out, namespace, name, "", *value, timestamp);
    }

    for (name, timer) in &snapshot.timers {
        push_int_line(&mut out, &mut int_buf, namespace, name, "count", timer.count, timestamp);
        push_line(&mut out, namespace, name, "mean", timer.mean, timestamp);
        push_line(&mut out, namespace, name, "min", timer.min, timestamp);
        push_line(&mut out, namespace, name, "max", timer.max, timestamp);
        for (p, v) in &timer.upper {
            let suffix = format!("upper_{}", format_percentile(*p));
            push_line(&mut out, namespace, name, &suffix, *v, timestamp);
        }
    }

    for (name, cardinality) in &snapshot.sets {
        push_int_line(&mut out, &mut int_buf, namespace, name, "count", *cardinality as u64, timestamp);
    }

    push_line(
        &mut out,
        namespace,
        distinct_metric_name,
        "",
        snapshot.distinct_metrics as f64,
        timestamp,
    );

    out
}

fn format_percentile(p: f64) -> String {
    // 90 -> "90", 99.9 -> "99_9": a fixed-suffix convention generalized
    // from `.99percentile` to an arbitrary percentile.
    let mut s = format!("{p}");
    if let Some(dot) = s.find('.') {
        s.replace_range(dot..dot + 1, "_");
    }
    s
}

fn push_line(out: &mut String, namespace: &str, name: &str, suffix: &str, value: f64, ts: u64) {
    if suffix.is_empty() {
        out.push_str(&format!("{namespace}.{name} {value} {ts}\n"));
    } else {
        out.push_str(&format!("{namespace}.{name}.{suffix} {value} {ts}\n"));
    }
}

/// Like [`push_line`], but for genuinely-integer series (counts,
/// cardinalities): formats through a reusable `itoa` buffer instead of
/// going through `f64`'s `Display` impl.
fn push_int_line(
    out: &mut String,
    buf: &mut IntBuffer,
    namespace: &str,
    name: &str,
    suffix: &str,
    value: u64,
    ts: u64,
) {
    out.push_str(namespace);
    out.push('.');
    out.push_str(name);
    if !suffix.is_empty() {
        out.push('.');
        out.push_str(suffix);
    }
    out.push(' ');
    out.push_str(buf.format(value));
    out.push(' ');
    let mut ts_buf = IntBuffer::new();
    out.push_str(ts_buf.format(ts));
    out.push('\n');
}
