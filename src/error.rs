use thiserror::Error;

/// Errors that can occur while ingesting, aggregating, or shipping metrics.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// A custom error with a free-form message.
    #[error("Custom error: {0}")]
    Custom(String),

    /// An I/O error from the standard library.
    #[error("Std Io error: {0}")]
    StdIo(#[from] std::io::Error),

    /// Failed to record a value into a histogram.
    #[error("Histogram record error: {0}")]
    Histogram(#[from] hdrhistogram::errors::RecordError),

    /// Failed to create a histogram.
    #[error("Histogram creation error: {0}")]
    HistogramCreation(#[from] hdrhistogram::errors::CreationError),

    /// A statsd line did not match `<name>:<value>|<type>[|@<rate>]`.
    #[error("Malformed statsd message: {0:?}")]
    BadMessage(String),

    /// The `f|` forwarding marker was set on a non-counter stat.
    #[error("Forwarding marker set on non-counter metric {0:?}")]
    BadMetricTypeForForwarding(String),

    /// A metric name was submitted under two different types within one flush window.
    #[error("Metric {name:?} already aggregated as a different type this window")]
    TypeConflict {
        /// Name of the metric that was resubmitted under a conflicting type.
        name: String,
    },

    /// A forwarded binary frame could not be decoded.
    #[error("Forwarded frame decode error: {0}")]
    FrameDecode(String),

    /// Startup configuration could not be loaded or was invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<String> for MetricsError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for MetricsError {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}

impl From<bincode::Error> for MetricsError {
    fn from(value: bincode::Error) -> Self {
        Self::FrameDecode(value.to_string())
    }
}

/// Result type used throughout the crate.
pub type MetricResult<T> = Result<T, MetricsError>;
