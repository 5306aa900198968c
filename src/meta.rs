//! Meta-stats: internal error and volume counters,
//! routed back through the main aggregator's inbound channel as ordinary
//! counter [`Stat`]s rather than a separate reporting path.

use crate::stat::Stat;

/// A statsd line failed to parse.
pub const BAD_MESSAGE: &str = "errors.bad_message";
/// The `f|` forwarding marker was set on a non-counter metric.
pub const BAD_METRIC_TYPE_FOR_FORWARDING: &str = "errors.bad_metric_type_for_forwarding";
/// An inbound UDP datagram met or exceeded the buffer pool's capacity.
pub const UDP_MESSAGE_TOO_LARGE: &str = "errors.udp_message_too_large";
/// A forwarded binary frame failed to decode on the upstream side.
pub const FORWARDED_MESSAGE_READ: &str = "errors.forwarded_message_read";
/// Count of UDP packets received, regardless of how many lines they held.
pub const PACKETS_RECEIVED: &str = "packets_received";

/// Builds a `+1` counter [`Stat`] for one of the named meta-metrics above.
#[must_use]
pub fn increment(name: &str) -> Stat {
    Stat::counter(name.to_string(), 1.0, 1.0, false)
}
