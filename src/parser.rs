//! Statsd wire parsing and forwarding classification.
//!
//! Grammar: `<name>:<value>|<type>[|@<sample_rate>]`, type tokens
//! `c`/`g`/`ms`/`s`. A leading `f|` on the name marks the stat as a
//! forwarding candidate and is only valid on counters.

use crate::error::MetricsError;
use crate::stat::Stat;

const FORWARD_PREFIX: &str = "f|";

/// Splits a buffer into newline-delimited messages, trimming a trailing
/// `\r` on each line and skipping empty lines. Mirrors the split discipline
/// of line-oriented statsd receivers: a message never spans a newline.
pub fn split_lines(buf: &[u8]) -> impl Iterator<Item = &str> {
    buf.split(|&b| b == b'\n').filter_map(|line| {
        let line = if line.last() == Some(&b'\r') {
            &line[..line.len() - 1]
        } else {
            line
        };
        if line.is_empty() {
            return None;
        }
        std::str::from_utf8(line).ok()
    })
}

/// Parses and classifies one non-empty statsd message.
///
/// # Errors
/// Returns [`MetricsError::BadMessage`] if the line does not match the
/// grammar, and [`MetricsError::BadMetricTypeForForwarding`] if the `f|`
/// marker is present on anything but a counter.
pub fn parse_message(line: &str) -> Result<Stat, MetricsError> {
    let (forward, rest) = match line.strip_prefix(FORWARD_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    let (name, rest) = rest
        .split_once(':')
        .ok_or_else(|| MetricsError::BadMessage(line.to_string()))?;
    if name.is_empty() {
        return Err(MetricsError::BadMessage(line.to_string()));
    }

    let mut parts = rest.split('|');
    let value_str = parts
        .next()
        .ok_or_else(|| MetricsError::BadMessage(line.to_string()))?;
    let type_tag = parts
        .next()
        .ok_or_else(|| MetricsError::BadMessage(line.to_string()))?;

    let value: f64 = value_str
        .parse()
        .map_err(|_| MetricsError::BadMessage(line.to_string()))?;

    let mut sample_rate = 1.0_f64;
    for extra in parts {
        if let Some(rate_str) = extra.strip_prefix('@') {
            sample_rate = rate_str
                .parse()
                .map_err(|_| MetricsError::BadMessage(line.to_string()))?;
            if !(sample_rate > 0.0 && sample_rate <= 1.0) {
                return Err(MetricsError::BadMessage(line.to_string()));
            }
        }
    }

    let name = name.to_string();
    let stat = match type_tag {
        "c" => Stat::counter(name, value, sample_rate, forward),
        "g" => {
            if forward {
                return Err(MetricsError::BadMetricTypeForForwarding(line.to_string()));
            }
            Stat::gauge(name, value)
        }
        "ms" => {
            if forward {
                return Err(MetricsError::BadMetricTypeForForwarding(line.to_string()));
            }
            Stat::timer(name, value)
        }
        "s" => {
            if forward {
                return Err(MetricsError::BadMetricTypeForForwarding(line.to_string()));
            }
            Stat::set(name, value)
        }
        _ => return Err(MetricsError::BadMessage(line.to_string())),
    };

    Ok(stat)
}
