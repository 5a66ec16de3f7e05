use std::time::Duration;

use tokio::time::Instant;

use super::{Action, Outcome, PacingInterval, TurnReport, VirtualUser, drain_response};
use crate::{
    client::{Endpoint, TargetClient},
    config::Profile,
    metric::synthesize_rapid,
    random::{RandomSource, RngSource},
};

/// Stress user firing cheap metrics as fast as possible.
///
/// Responses are drained but never inspected, transport errors included.
#[derive(Debug)]
pub struct HighFrequencyUser<R = RngSource> {
    rng: R,
}

impl<R: RandomSource> HighFrequencyUser<R> {
    pub const PACING: PacingInterval =
        PacingInterval::new(Duration::from_micros(100), Duration::from_millis(1));

    pub fn on_start(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RandomSource> VirtualUser for HighFrequencyUser<R> {
    fn profile(&self) -> Profile {
        Profile::HighFrequency
    }

    fn next_wait(&mut self) -> Duration {
        Self::PACING.sample(&mut self.rng)
    }

    async fn turn(&mut self, client: &TargetClient) -> TurnReport {
        let sample = synthesize_rapid(&mut self.rng);

        let start = Instant::now();
        let result = client.post_json(Endpoint::Metrics, &sample).await;
        let response_size = drain_response(result).await;

        TurnReport {
            action: Action::RapidMetric,
            latency: start.elapsed(),
            response_size,
            outcome: Outcome::Unchecked,
        }
    }
}

#[cfg(test)]
mod tests {
    use rama::{
        Service as _,
        error::OpaqueError,
        http::{Request, Response, StatusCode, Uri},
        service::service_fn,
    };

    use super::*;
    use crate::cmd::mock::{MockTargetConfig, mock_target_client};

    #[test]
    fn pacing_stays_within_profile_range() {
        let mut user = HighFrequencyUser::on_start(RngSource::seeded(1));
        for _ in 0..1_000 {
            let wait = user.next_wait();
            assert!(wait >= Duration::from_micros(100) && wait <= Duration::from_millis(1));
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn server_errors_are_not_inspected() {
        let client = mock_target_client(MockTargetConfig {
            metrics_status: StatusCode::INTERNAL_SERVER_ERROR,
            ..Default::default()
        });

        let mut user = HighFrequencyUser::on_start(RngSource::seeded(2));
        for _ in 0..20 {
            let report = user.turn(&client).await;
            assert_eq!(report.action, Action::RapidMetric);
            assert_eq!(report.outcome, Outcome::Unchecked);
            // body is read to the end, even for an error status
            assert_eq!(report.response_size, r#"{"status":"accepted"}"#.len());
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn transport_errors_are_dropped() {
        let svc = service_fn(async |_req: Request| {
            Err::<Response, _>(OpaqueError::from_display("timeout"))
        });
        let client = TargetClient::try_new(&Uri::from_static("http://127.0.0.1:1"), svc.boxed())
            .expect("client");

        let mut user = HighFrequencyUser::on_start(RngSource::seeded(3));
        let report = user.turn(&client).await;
        assert_eq!(report.outcome, Outcome::Unchecked);
        assert_eq!(report.response_size, 0);
    }
}
