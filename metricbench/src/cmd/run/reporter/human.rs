use std::time::Duration;

use super::{Counters, Phase, Reporter, RequestResultEvent, Summary};

pub struct HumanReporter {
    interval: Duration,
    last_tick: Duration,
    interval_counts: Counters,
    total_counts: Counters,
    last_phase: Phase,
}

impl HumanReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: Duration::ZERO,
            interval_counts: Counters::default(),
            total_counts: Counters::default(),
            last_phase: Phase::RampUp,
        }
    }
}

impl Reporter for HumanReporter {
    fn on_result(&mut self, ev: &RequestResultEvent) {
        self.interval_counts.apply(ev);
        self.total_counts.apply(ev);
        self.last_phase = ev.phase;
    }

    fn on_tick(&mut self, now: Duration) {
        if now.saturating_sub(self.last_tick) < self.interval {
            return;
        }
        self.last_tick = now;

        let interval_secs = self.interval.as_secs_f64();
        let rps = if interval_secs == 0. {
            0.
        } else {
            self.interval_counts.total as f64 / interval_secs
        };

        println!(
            "t={:.1}s phase={} rps={:.1} ok={} fail={} unchecked={} slow={} avg={:.1}ms max={:.1}ms total_ok={} total_fail={}",
            now.as_secs_f64(),
            self.last_phase.as_str(),
            rps,
            self.interval_counts.ok,
            self.interval_counts.failed(),
            self.interval_counts.unchecked,
            self.interval_counts.slow,
            self.interval_counts.avg_latency().as_secs_f64() * 1000.,
            self.interval_counts.latency_max.as_secs_f64() * 1000.,
            self.total_counts.ok,
            self.total_counts.failed(),
        );

        self.interval_counts = Counters::default();
    }

    fn finish(&mut self, elapsed: Duration) -> Summary {
        let summary = Summary::from_counters(&self.total_counts, elapsed);
        let c = &self.total_counts;
        println!(
            "done total={} ok={} http_fail={} payload_fail={} transport_fail={} unchecked={} slow={} rps={:.1} avg={:.1}ms max={:.1}ms",
            c.total,
            c.ok,
            c.http_fail,
            c.payload_fail,
            c.transport_fail,
            c.unchecked,
            c.slow,
            summary.rps,
            summary.avg_latency.as_secs_f64() * 1000.,
            summary.max_latency.as_secs_f64() * 1000.,
        );
        summary
    }
}
