mod human;
mod json;

use std::time::Duration;

pub use self::{human::HumanReporter, json::JsonlReporter};

use crate::{
    config::Profile,
    observer::SLOW_REQUEST_THRESHOLD,
    user::{FailureReason, Outcome, TurnReport},
};

pub trait Reporter: Send + Sync + 'static {
    fn on_result(&mut self, ev: &RequestResultEvent);
    fn on_tick(&mut self, now: Duration);
    fn finish(&mut self, elapsed: Duration) -> Summary;
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
    total: u64,
    ok: u64,
    http_fail: u64,
    payload_fail: u64,
    transport_fail: u64,
    unchecked: u64,
    slow: u64,
    latency_sum: Duration,
    latency_max: Duration,
}

impl Counters {
    pub(super) fn apply(&mut self, ev: &RequestResultEvent) {
        self.total += 1;
        match &ev.report.outcome {
            Outcome::Success => self.ok += 1,
            Outcome::Unchecked => self.unchecked += 1,
            Outcome::Failure(FailureReason::Status(_)) => self.http_fail += 1,
            Outcome::Failure(FailureReason::Unhealthy) => self.payload_fail += 1,
            Outcome::Failure(FailureReason::Transport(_)) => self.transport_fail += 1,
        }

        let latency = ev.report.latency;
        if latency > SLOW_REQUEST_THRESHOLD {
            self.slow += 1;
        }
        self.latency_sum += latency;
        self.latency_max = self.latency_max.max(latency);
    }

    pub fn failed(&self) -> u64 {
        self.http_fail + self.payload_fail + self.transport_fail
    }

    pub fn avg_latency(&self) -> Duration {
        if self.total == 0 {
            return Duration::ZERO;
        }
        self.latency_sum.div_f64(self.total as f64)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "total": self.total,
            "ok": self.ok,
            "http_fail": self.http_fail,
            "payload_fail": self.payload_fail,
            "transport_fail": self.transport_fail,
            "unchecked": self.unchecked,
            "slow": self.slow,
            "avg_latency_ms": self.avg_latency().as_secs_f64() * 1000.,
            "max_latency_ms": self.latency_max.as_secs_f64() * 1000.,
        })
    }
}

/// Aggregate outcome of a complete run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub elapsed: Duration,
    pub total: u64,
    pub ok: u64,
    pub failed: u64,
    pub unchecked: u64,
    pub slow: u64,
    pub rps: f64,
    pub avg_latency: Duration,
    pub max_latency: Duration,
}

impl Summary {
    pub fn from_counters(c: &Counters, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            elapsed,
            total: c.total,
            ok: c.ok,
            failed: c.failed(),
            unchecked: c.unchecked,
            slow: c.slow,
            rps: if secs > 0. { c.total as f64 / secs } else { 0. },
            avg_latency: c.avg_latency(),
            max_latency: c.latency_max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RampUp,
    Steady,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::RampUp => "ramp_up",
            Phase::Steady => "steady",
        }
    }
}

#[derive(Debug)]
pub struct RequestResultEvent {
    pub ts: std::time::SystemTime,
    pub elapsed: Duration,
    pub phase: Phase,
    pub session: usize,
    pub profile: Profile,
    pub report: TurnReport,
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::user::Action;

    pub(crate) fn result_event(outcome: Outcome, latency_ms: u64) -> RequestResultEvent {
        RequestResultEvent {
            ts: std::time::SystemTime::now(),
            elapsed: Duration::ZERO,
            phase: Phase::Steady,
            session: 0,
            profile: Profile::Standard,
            report: TurnReport {
                action: Action::SendMetric,
                latency: Duration::from_millis(latency_ms),
                response_size: 2,
                outcome,
            },
        }
    }
}
