//! Metrics infrastructure for Puter devices and hosts.
//!
//! This crate describes every metric emitted by the device protocol handler and the
//! host link. It re-exports the `metrics` crate and declares each metric as a
//! structured [`Metric`] constant so names are never retyped at call sites.
//!
//! # Example
//!
//! ```rust,ignore
//! use puter_metrics::{MetricLabels, metric_defs, describe_metrics};
//!
//! // Initialize metrics descriptions at startup
//! describe_metrics();
//!
//! let labels = MetricLabels::new("light_controller");
//! metrics::counter!(metric_defs::DEVICE_LINES.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A metric name with the metadata handed to the recorder.
///
/// Label keys are listed on each declaration in [`metric_defs`]; call sites
/// build the values with [`MetricLabels`].
#[derive(Debug, Clone)]
pub struct Metric {
    /// Name passed to the `metrics` macros.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    /// Defaults to [`Unit::Count`].
    pub unit: Unit,
}

impl Metric {
    const fn new(kind: MetricKind, name: &'static str) -> Self {
        Metric {
            name,
            kind,
            description: "",
            unit: Unit::Count,
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(MetricKind::Counter, name)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(MetricKind::Gauge, name)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(MetricKind::Histogram, name)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Register the description and unit with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, self.unit, self.description),
            MetricKind::Histogram => describe_histogram!(self.name, self.unit, self.description),
        }
    }
}

/// All metric definitions for devices and hosts.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Device Metrics
    // ========================================================================

    /// Lines accepted by the device line framer, including overflowed ones.
    ///
    /// Labels: device
    pub const DEVICE_LINES: Metric = Metric::counter("puter.device.lines")
        .with_description("Lines accepted by the device line framer");

    /// Response lines written by the device.
    ///
    /// Labels: device, outcome
    ///
    /// `outcome` is `ok` or the wire error text (`bad json`, `missing cmd`, ...).
    pub const DEVICE_RESPONSES: Metric = Metric::counter("puter.device.responses")
        .with_description("Response lines written by the device");

    /// Calls into the device-specific command handler.
    ///
    /// Labels: device
    pub const DEVICE_HANDLER_CALLS: Metric = Metric::counter("puter.device.handler_calls")
        .with_description("Commands delegated to the device handler");

    // ========================================================================
    // Host Metrics
    // ========================================================================

    /// Requests sent from the host to a device.
    ///
    /// Labels: device, result
    ///
    /// `result` is one of `ok`, `device_error`, `timeout`, `io_error`.
    pub const HOST_REQUESTS: Metric = Metric::counter("puter.host.requests")
        .with_description("Requests sent from the host to a device");

    /// Round-trip latency of a host request in seconds.
    ///
    /// Labels: device
    pub const HOST_REQUEST_LATENCY: Metric = Metric::histogram("puter.host.request_latency")
        .with_description("Round-trip latency of host requests")
        .with_unit(Unit::Seconds);

    /// Devices currently connected in the host registry.
    pub const HOST_DEVICES_ONLINE: Metric = Metric::gauge("puter.host.devices_online")
        .with_description("Devices currently connected in the host registry");

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &DEVICE_LINES,
        &DEVICE_RESPONSES,
        &DEVICE_HANDLER_CALLS,
        &HOST_REQUESTS,
        &HOST_REQUEST_LATENCY,
        &HOST_DEVICES_ONLINE,
    ];
}

/// Metric labels identifying the device a metric belongs to.
///
/// ```rust
/// use puter_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("light_controller");
/// let extended = labels.with(&[("outcome", "ok".to_string())]);
/// assert_eq!(extended.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Device identifier
    pub device: String,
}

impl MetricLabels {
    /// Creates labels for the given device.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("device", self.device.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics with the installed recorder.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus recorder serving scrapes on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
