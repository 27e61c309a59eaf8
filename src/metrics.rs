use metrics::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Handles for the service's metrics
///
/// Handles resolve against whatever recorder is installed when [`Metrics::new`]
/// runs; without one they are no-ops, which is what the tests rely on.
pub struct Metrics {
    pub captures_succeeded: Counter,
    pub captures_failed: Counter,
    pub validation_errors: Counter,
    pub timeout_errors: Counter,
    pub capture_duration: Histogram,
    pub captures_in_flight: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            captures_succeeded: register_counter!("tweet_captures_total", "outcome" => "success"),
            captures_failed: register_counter!("tweet_captures_total", "outcome" => "failure"),
            validation_errors: register_counter!("tweet_capture_validation_errors_total"),
            timeout_errors: register_counter!("tweet_capture_timeouts_total"),
            capture_duration: register_histogram!("tweet_capture_duration_seconds"),
            captures_in_flight: register_gauge!("tweet_captures_in_flight"),
        }
    }

    pub fn record_capture(&self, duration: Duration, success: bool) {
        if success {
            self.captures_succeeded.increment(1);
        } else {
            self.captures_failed.increment(1);
        }

        self.capture_duration.record(duration.as_secs_f64());
    }

    pub fn record_timeout(&self) {
        self.timeout_errors.increment(1);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.increment(1);
    }

    pub fn capture_started(&self) {
        self.captures_in_flight.increment(1.0);
    }

    pub fn capture_finished(&self) {
        self.captures_in_flight.decrement(1.0);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global Prometheus recorder; call before building [`Metrics`]
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics_without_recorder() {
        let metrics = Metrics::default();
        metrics.capture_started();
        metrics.record_capture(Duration::from_millis(1200), true);
        metrics.record_capture(Duration::from_millis(30), false);
        metrics.record_timeout();
        metrics.record_validation_error();
        metrics.capture_finished();
    }
}
