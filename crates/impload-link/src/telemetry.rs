//! Link telemetry.
//!
//! Every metric the link layer records is declared here as a [`Metric`]
//! constant. Nothing is exported unless the binary installs a recorder; the
//! `metrics` macros are no-ops otherwise.
//!
//! ```rust
//! use impload_link::{metric_defs, MetricKind};
//!
//! assert_eq!(metric_defs::REQUEST_TIMEOUTS.kind, MetricKind::Counter);
//! metrics::counter!(metric_defs::REQUEST_TIMEOUTS.name).increment(1);
//! ```

use metrics::{describe_counter, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g. "impload.link.requests_sent").
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the link layer.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Frame Receiver
    // ========================================================================

    /// Checksum-valid frames published by the receiver.
    pub const FRAMES_RECEIVED: Metric = Metric::counter("impload.link.frames_received")
        .with_description("Checksum-valid frames delivered by the receiver")
        .with_unit(Unit::Count)
        .with_labels(&["transport"]);

    /// Frames dropped for a checksum mismatch.
    pub const CHECKSUM_ERRORS: Metric = Metric::counter("impload.link.checksum_errors")
        .with_description("Frames dropped because the checksum did not match")
        .with_unit(Unit::Count)
        .with_labels(&["transport"]);

    // ========================================================================
    // Transaction Engine
    // ========================================================================

    /// Requests written to the transport.
    ///
    /// Labels: dialect ("MSPv1" or "MSPv2")
    pub const REQUESTS_SENT: Metric = Metric::counter("impload.link.requests_sent")
        .with_description("Requests written to the transport")
        .with_unit(Unit::Count)
        .with_labels(&["dialect"]);

    /// Requests that got no reply in time.
    pub const REQUEST_TIMEOUTS: Metric = Metric::counter("impload.link.request_timeouts")
        .with_description("Requests that timed out waiting for a reply")
        .with_unit(Unit::Count);

    /// Frames read while waiting that answered a different command.
    pub const FRAMES_DISCARDED: Metric = Metric::counter("impload.link.frames_discarded")
        .with_description("Received frames discarded because their command did not match")
        .with_unit(Unit::Count);

    /// Time from writing a request to receiving its reply.
    pub const REQUEST_LATENCY: Metric = Metric::histogram("impload.link.request_latency_seconds")
        .with_description("Request round-trip time")
        .with_unit(Unit::Seconds);

    // ========================================================================
    // Mission Transfer
    // ========================================================================

    /// SET_WP requests the flight controller answered with an error.
    pub const WAYPOINTS_REJECTED: Metric = Metric::counter("impload.mission.waypoints_rejected")
        .with_description("Waypoints the flight controller rejected during upload")
        .with_unit(Unit::Count);

    /// All metrics, for [`describe_metrics`](super::describe_metrics).
    pub const ALL: &[&Metric] = &[
        &FRAMES_RECEIVED,
        &CHECKSUM_ERRORS,
        &REQUESTS_SENT,
        &REQUEST_TIMEOUTS,
        &FRAMES_DISCARDED,
        &REQUEST_LATENCY,
        &WAYPOINTS_REJECTED,
    ];
}

/// Describe every link metric to the installed recorder.
///
/// Call once at startup, after the recorder is installed.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
