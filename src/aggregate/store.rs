//! The aggregation store: four typed accumulators keyed by metric name,
//! with a well-defined flush-time reduction and clear/preserve policy
//! across flush boundaries.
//!
//! Timer percentiles use an `hdrhistogram::Histogram<u64>` paired with
//! tracked min/max, generalized to a configurable percentile list and
//! supplemented with an exact running sum/count so mean/min/max are exact
//! rather than histogram-approximated.

use crate::error::MetricsError;
use crate::stat::StatType;
use hdrhistogram::Histogram;
use std::collections::{HashMap, HashSet};

/// Values are scaled by this factor before being recorded into the integer
/// histogram, preserving millisecond sub-integer precision.
const TIMER_SCALE: f64 = 1000.0;
const TIMER_SIG_FIG: u8 = 3;

/// Per-metric timer accumulator: exact stats plus an `hdrhistogram` for
/// percentiles.
pub struct TimerAccumulator {
    histogram: Histogram<u64>,
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl TimerAccumulator {
    fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            histogram: Histogram::new_with_bounds(1, u64::MAX, TIMER_SIG_FIG)?,
            sum: 0.0,
            count: 0,
            min: f64::MAX,
            max: f64::MIN,
        })
    }

    fn record(&mut self, value: f64) -> Result<(), MetricsError> {
        let scaled = ((value * TIMER_SCALE).round() as i64).max(1) as u64;
        self.histogram.record(scaled)?;
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    fn reset(&mut self) {
        self.histogram.reset();
        self.sum = 0.0;
        self.count = 0;
        self.min = f64::MAX;
        self.max = f64::MIN;
    }

    /// Reduces this accumulator's current contents, per the configured
    /// percentiles, without clearing it (flush clearing is the caller's job).
    #[must_use]
    pub fn snapshot(&self, percentiles: &[f64]) -> Option<TimerSnapshot> {
        if self.count == 0 {
            return None;
        }
        let upper = percentiles
            .iter()
            .map(|&p| {
                let scaled = self.histogram.value_at_quantile(p / 100.0);
                (p, scaled as f64 / TIMER_SCALE)
            })
            .collect();
        Some(TimerSnapshot {
            count: self.count,
            mean: self.sum / self.count as f64,
            min: self.min,
            max: self.max,
            upper,
        })
    }
}

/// One flushed timer's reduced values.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSnapshot {
    /// Number of samples this window.
    pub count: u64,
    /// Exact arithmetic mean.
    pub mean: f64,
    /// Exact minimum.
    pub min: f64,
    /// Exact maximum.
    pub max: f64,
    /// `(percentile, value)` pairs, in the configured order.
    pub upper: Vec<(f64, f64)>,
}

/// The reduced contents of one flush window, ready for the Graphite
/// emitter or a forwarding frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushSnapshot {
    /// `(name, sum)`. Rate is derived by the emitter from the flush interval.
    pub counters: Vec<(String, f64)>,
    /// `(name, value)`.
    pub gauges: Vec<(String, f64)>,
    /// `(name, reduction)`.
    pub timers: Vec<(String, TimerSnapshot)>,
    /// `(name, cardinality)`.
    pub sets: Vec<(String, usize)>,
    /// Count of distinct names aggregated this window, across all types.
    pub distinct_metrics: usize,
}

/// Owns the four per-type maps for one aggregator role, plus the set of
/// names already claimed this window. Exclusively owned by the task that
/// aggregates into it.
#[derive(Default)]
pub struct MetricStore {
    counters: HashMap<String, f64>,
    gauges: HashMap<String, f64>,
    timers: HashMap<String, TimerAccumulator>,
    sets: HashMap<String, HashSet<u64>>,
    /// Type each name has been recorded as so far this window. Reset on
    /// every flush, independent of whether `clear` retains gauge/set data
    /// across the boundary, so a name's type binding never outlives its
    /// window even when its carried-over value does.
    claimed_this_window: HashMap<String, StatType>,
}

impl MetricStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn type_conflict(&self, name: &str, kind: StatType) -> Result<(), MetricsError> {
        match self.claimed_this_window.get(name) {
            Some(&claimed) if claimed != kind => Err(MetricsError::TypeConflict {
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Records `name` as `kind` for the rest of this window, and drops any
    /// stale carried-over value recorded under a different type in an
    /// earlier window (a name reassigned from gauge to counter, say, should
    /// not keep emitting the old gauge value forever).
    fn claim(&mut self, name: &str, kind: StatType) {
        if self
            .claimed_this_window
            .insert(name.to_string(), kind)
            .is_none()
        {
            if kind != StatType::Counter {
                self.counters.remove(name);
            }
            if kind != StatType::Gauge {
                self.gauges.remove(name);
            }
            if kind != StatType::Timer {
                self.timers.remove(name);
            }
            if kind != StatType::Set {
                self.sets.remove(name);
            }
        }
    }

    /// Adds `value` (already sample-rate corrected) to the counter's
    /// running sum. Never double-counts: the correction already happened
    /// at ingest.
    ///
    /// # Errors
    /// Returns [`MetricsError::TypeConflict`] if `name` is already
    /// aggregating as a different type this window.
    pub fn record_counter(&mut self, name: &str, value: f64) -> Result<(), MetricsError> {
        self.type_conflict(name, StatType::Counter)?;
        self.claim(name, StatType::Counter);
        *self.counters.entry(name.to_string()).or_insert(0.0) += value;
        Ok(())
    }

    /// Overwrites the gauge's current value (last-write-wins).
    ///
    /// # Errors
    /// Returns [`MetricsError::TypeConflict`] if `name` is already
    /// aggregating as a different type this window.
    pub fn record_gauge(&mut self, name: &str, value: f64) -> Result<(), MetricsError> {
        self.type_conflict(name, StatType::Gauge)?;
        self.claim(name, StatType::Gauge);
        self.gauges.insert(name.to_string(), value);
        Ok(())
    }

    /// Records one timer sample.
    ///
    /// # Errors
    /// Returns [`MetricsError::TypeConflict`] if `name` is already
    /// aggregating as a different type this window, or a histogram error
    /// if the (scaled) value is out of the histogram's representable range.
    pub fn record_timer(&mut self, name: &str, value: f64) -> Result<(), MetricsError> {
        self.type_conflict(name, StatType::Timer)?;
        self.claim(name, StatType::Timer);
        match self.timers.get_mut(name) {
            Some(acc) => acc.record(value)?,
            None => {
                let mut acc = TimerAccumulator::new()?;
                acc.record(value)?;
                self.timers.insert(name.to_string(), acc);
            }
        }
        Ok(())
    }

    /// Adds `value` to the exact set of distinct values seen for `name`.
    ///
    /// # Errors
    /// Returns [`MetricsError::TypeConflict`] if `name` is already
    /// aggregating as a different type this window.
    pub fn record_set(&mut self, name: &str, value: f64) -> Result<(), MetricsError> {
        self.type_conflict(name, StatType::Set)?;
        self.claim(name, StatType::Set);
        self.sets
            .entry(name.to_string())
            .or_default()
            .insert(value.to_bits());
        Ok(())
    }

    /// Additively merges a forwarded leaf's counter bundle into this store
    /// (a per-name additive merge). Every key is treated
    /// as a counter; this is only ever called on the forwarded-upstream
    /// store, which never holds any other type.
    ///
    /// # Errors
    /// Returns [`MetricsError::TypeConflict`] if a forwarded name collides
    /// with a non-counter already aggregated this window.
    pub fn merge_counters(&mut self, bundle: HashMap<String, f64>) -> Result<(), MetricsError> {
        for (name, value) in bundle {
            self.record_counter(&name, value)?;
        }
        Ok(())
    }

    /// Number of distinct metric names currently aggregated, across all
    /// four types. Used for the synthetic `distinct_*_metrics_flushed`
    /// meta-metric.
    #[must_use]
    pub fn distinct_metrics(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.timers.len() + self.sets.len()
    }

    /// Reduces the store's current contents and applies the clear/preserve
    /// policy: counters and timers are always dropped; gauges
    /// and sets are dropped only when `clear` is `true`. The claimed-type
    /// set always resets here, regardless of `clear`: a name's type binding
    /// is scoped to one window even when its gauge/set value survives into
    /// the next.
    pub fn flush(&mut self, percentiles: &[f64], clear: bool) -> FlushSnapshot {
        let distinct_metrics = self.distinct_metrics();
        self.claimed_this_window.clear();

        let counters: Vec<(String, f64)> = self.counters.drain().collect();

        let timers: Vec<(String, TimerSnapshot)> = self
            .timers
            .iter()
            .filter_map(|(name, acc)| acc.snapshot(percentiles).map(|s| (name.clone(), s)))
            .collect();
        self.timers.clear();

        let (gauges, sets) = if clear {
            let gauges = self.gauges.drain().collect();
            let sets = self
                .sets
                .drain()
                .map(|(name, values)| (name, values.len()))
                .collect();
            (gauges, sets)
        } else {
            let gauges = self
                .gauges
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            let sets = self
                .sets
                .iter()
                .map(|(name, values)| (name.clone(), values.len()))
                .collect();
            (gauges, sets)
        };

        FlushSnapshot {
            counters,
            gauges,
            timers,
            sets,
            distinct_metrics,
        }
    }
}
