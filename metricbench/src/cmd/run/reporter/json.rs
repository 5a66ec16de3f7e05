use std::{io::Write, time::Duration};

use super::{Counters, Phase, Reporter, RequestResultEvent, Summary};
use crate::user::Outcome;

/// Reports as json lines: optional per request events,
/// periodic interval summaries and a final summary line.
pub struct JsonlReporter<W = std::io::Stdout> {
    interval: Duration,
    last_tick: Duration,
    interval_counts: Counters,
    total_counts: Counters,
    last_phase: Phase,
    emit_events: bool,
    out: W,
}

impl JsonlReporter {
    pub fn new(interval: Duration, emit_events: bool) -> Self {
        Self::with_writer(interval, emit_events, std::io::stdout())
    }
}

impl<W: Write + Send + Sync + 'static> JsonlReporter<W> {
    pub fn with_writer(interval: Duration, emit_events: bool, out: W) -> Self {
        Self {
            interval,
            last_tick: Duration::ZERO,
            interval_counts: Counters::default(),
            total_counts: Counters::default(),
            last_phase: Phase::RampUp,
            emit_events,
            out,
        }
    }

    fn emit(&mut self, line: serde_json::Value) {
        // best effort
        let _ = writeln!(self.out, "{line}");
    }
}

impl<W: Write + Send + Sync + 'static> Reporter for JsonlReporter<W> {
    fn on_result(&mut self, ev: &RequestResultEvent) {
        self.interval_counts.apply(ev);
        self.total_counts.apply(ev);
        self.last_phase = ev.phase;

        if self.emit_events {
            let report = &ev.report;
            let line = serde_json::json!({
                "type": "event",
                "ts": humantime::format_rfc3339_millis(ev.ts).to_string(),
                "t_ms": ev.elapsed.as_millis(),
                "phase": ev.phase.as_str(),
                "session": ev.session,
                "profile": ev.profile.as_str(),
                "action": report.action.name(),
                "latency_ms": report.latency.as_secs_f64() * 1000.,
                "response_size": report.response_size,
                "ok": report.outcome.is_success(),
                "unchecked": matches!(report.outcome, Outcome::Unchecked),
                "error": report.outcome.failure().map(|reason| reason.to_string()),
            });
            self.emit(line);
        }
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

        let line = serde_json::json!({
            "type": "summary",
            "t_ms": now.as_millis(),
            "phase": self.last_phase.as_str(),
            "interval_ms": self.interval.as_millis(),
            "rps": rps,
            "interval": self.interval_counts.to_json(),
            "total": self.total_counts.to_json(),
        });
        self.emit(line);

        self.interval_counts = Counters::default();
    }

    fn finish(&mut self, elapsed: Duration) -> Summary {
        let summary = Summary::from_counters(&self.total_counts, elapsed);
        let line = serde_json::json!({
            "type": "final",
            "elapsed_ms": elapsed.as_millis(),
            "rps": summary.rps,
            "total": self.total_counts.to_json(),
        });
        self.emit(line);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::{super::test_utils::result_event, *};
    use crate::user::FailureReason;

    fn lines(out: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn emits_events_summaries_and_final_line() {
        let mut reporter = JsonlReporter::with_writer(Duration::from_secs(1), true, Vec::new());
        reporter.on_result(&result_event(Outcome::Success, 70));
        reporter.on_result(&result_event(Outcome::Failure(FailureReason::Unhealthy), 2));
        reporter.on_tick(Duration::from_secs(1));
        let summary = reporter.finish(Duration::from_secs(1));
        assert_eq!(summary.total, 2);

        let lines = lines(&reporter.out);
        assert_eq!(lines.len(), 4);

        assert_eq!(lines[0]["type"], "event");
        assert_eq!(lines[0]["action"], "send_metric");
        assert_eq!(lines[0]["ok"], true);
        assert!(lines[0]["error"].is_null());

        assert_eq!(lines[1]["ok"], false);
        assert_eq!(lines[1]["error"], "Service unhealthy");

        assert_eq!(lines[2]["type"], "summary");
        assert_eq!(lines[2]["interval"]["total"], 2);
        assert_eq!(lines[2]["interval"]["payload_fail"], 1);
        assert_eq!(lines[2]["interval"]["slow"], 1);

        assert_eq!(lines[3]["type"], "final");
        assert_eq!(lines[3]["total"]["ok"], 1);
    }

    #[test]
    fn events_are_opt_in() {
        let mut reporter = JsonlReporter::with_writer(Duration::from_secs(1), false, Vec::new());
        reporter.on_result(&result_event(Outcome::Unchecked, 1));
        reporter.finish(Duration::from_secs(1));

        let lines = lines(&reporter.out);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["total"]["unchecked"], 1);
    }
}
