//! Reactions to the load test lifecycle.
//!
//! Observers are handed explicitly to the harness;
//! there is no global listener registry.

use std::time::Duration;

use rama::telemetry::tracing;

use crate::{cmd::run::reporter::Summary, user::FailureReason};

/// Requests slower than this are flagged as slow.
pub const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(50);

/// Throughput objective of the load test, in requests per second.
pub const TARGET_RPS: u32 = 1000;

/// What the harness is about to run.
#[derive(Debug, Clone)]
pub struct TestPlan {
    pub target: String,
    pub users: usize,
    pub spawn_rate: f64,
    pub duration: Duration,
    pub profiles: String,
}

/// Completion of a single request.
#[derive(Debug, Clone, Copy)]
pub struct RequestEvent<'a> {
    pub operation: &'static str,
    pub latency: Duration,
    pub response_size: usize,
    pub error: Option<&'a FailureReason>,
}

impl RequestEvent<'_> {
    pub fn is_slow(&self) -> bool {
        self.latency > SLOW_REQUEST_THRESHOLD
    }
}

pub trait LifecycleObserver: Send + Sync + 'static {
    fn on_test_start(&self, plan: &TestPlan);
    fn on_test_stop(&self, summary: &Summary);
    fn on_request(&self, event: &RequestEvent<'_>);
}

/// How slow requests are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SlowRequestLog {
    /// Flag slow requests but do not log them.
    #[default]
    Off,
    Debug,
    Info,
    Warn,
}

/// Prints start and stop banners to stdout
/// and logs slow requests at the configured level.
#[derive(Debug, Clone, Default)]
pub struct ConsoleObserver {
    slow_requests: SlowRequestLog,
}

impl ConsoleObserver {
    pub fn new(slow_requests: SlowRequestLog) -> Self {
        Self { slow_requests }
    }
}

const BANNER_RULE: &str = "============================================================";

impl LifecycleObserver for ConsoleObserver {
    fn on_test_start(&self, plan: &TestPlan) {
        println!("{BANNER_RULE}");
        println!("Metrics Ingestion Load Test Started");
        println!(
            "Target: {TARGET_RPS}+ RPS, Latency < {}ms",
            SLOW_REQUEST_THRESHOLD.as_millis()
        );
        println!(
            "Plan: {} users @ {} spawn/s for {:?} against {} ({})",
            plan.users, plan.spawn_rate, plan.duration, plan.target, plan.profiles,
        );
        println!("{BANNER_RULE}");
    }

    fn on_test_stop(&self, summary: &Summary) {
        println!("{BANNER_RULE}");
        println!(
            "Load Test Completed in {:.1}s ({} requests)",
            summary.elapsed.as_secs_f64(),
            summary.total,
        );
        println!("{BANNER_RULE}");
    }

    fn on_request(&self, event: &RequestEvent<'_>) {
        if !event.is_slow() {
            return;
        }

        let latency_ms = event.latency.as_millis();
        let operation = event.operation;
        match self.slow_requests {
            SlowRequestLog::Off => (),
            SlowRequestLog::Debug => {
                tracing::debug!(%operation, %latency_ms, "Slow request: {operation} - {latency_ms}ms")
            }
            SlowRequestLog::Info => {
                tracing::info!(%operation, %latency_ms, "Slow request: {operation} - {latency_ms}ms")
            }
            SlowRequestLog::Warn => {
                tracing::warn!(%operation, %latency_ms, "Slow request: {operation} - {latency_ms}ms")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn event(latency_ms: u64) -> RequestEvent<'static> {
        RequestEvent {
            operation: "send_metric",
            latency: Duration::from_millis(latency_ms),
            response_size: 0,
            error: None,
        }
    }

    #[test]
    fn slow_threshold_is_exclusive() {
        assert!(!event(50).is_slow());
        assert!(event(51).is_slow());
    }

    #[test]
    #[traced_test]
    fn slow_requests_are_silent_by_default() {
        ConsoleObserver::default().on_request(&event(120));
        assert!(!logs_contain("Slow request"));
    }

    #[test]
    #[traced_test]
    fn slow_requests_logged_when_enabled() {
        let observer = ConsoleObserver::new(SlowRequestLog::Warn);
        observer.on_request(&event(10));
        assert!(!logs_contain("Slow request"));

        observer.on_request(&event(120));
        assert!(logs_contain("Slow request: send_metric - 120ms"));
    }
}
