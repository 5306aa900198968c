//! The [`Stat`] value: a single decoded statsd sample.

/// The four statsd metric kinds this aggregator understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StatType {
    /// Monotonic-within-window accumulator; sample-rate corrected at ingest.
    Counter,
    /// Last-write-wins point-in-time value.
    Gauge,
    /// A sampled distribution; flushed as count/min/max/mean/percentiles.
    Timer,
    /// A set of distinct values; flushed as cardinality.
    Set,
}

/// A single decoded statsd sample, ephemeral: it exists only between the
/// parser and the aggregator it is dispatched to.
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    /// Which accumulator this sample belongs to.
    pub kind: StatType,
    /// Metric name with any forwarding prefix already stripped.
    pub name: String,
    /// Sample value, already sample-rate corrected for counters.
    pub value: f64,
    /// Sample rate in `(0, 1]`; always `1.0` for non-counters.
    pub sample_rate: f64,
    /// Whether this sample should route to the forwarding-leaf aggregator
    /// instead of the main one. Only ever `true` for counters.
    pub forward: bool,
}

impl Stat {
    /// Constructs a counter stat, applying the sample-rate correction at
    /// ingest time so later sums never double-count (spec invariant).
    #[must_use]
    pub fn counter(name: String, value: f64, sample_rate: f64, forward: bool) -> Self {
        Self {
            kind: StatType::Counter,
            name,
            value: value / sample_rate,
            sample_rate,
            forward,
        }
    }

    /// Constructs a gauge stat.
    #[must_use]
    pub fn gauge(name: String, value: f64) -> Self {
        Self {
            kind: StatType::Gauge,
            name,
            value,
            sample_rate: 1.0,
            forward: false,
        }
    }

    /// Constructs a timer stat.
    #[must_use]
    pub fn timer(name: String, value: f64) -> Self {
        Self {
            kind: StatType::Timer,
            name,
            value,
            sample_rate: 1.0,
            forward: false,
        }
    }

    /// Constructs a set stat.
    #[must_use]
    pub fn set(name: String, value: f64) -> Self {
        Self {
            kind: StatType::Set,
            name,
            value,
            sample_rate: 1.0,
            forward: false,
        }
    }
}
