use std::time::Duration;

use rama::{graceful::ShutdownGuard, telemetry::tracing};
use tokio::{
    sync::mpsc,
    time::{Instant, sleep, sleep_until},
};

use super::{TurnReport, VirtualUser};
use crate::{client::TargetClient, config::Profile};

/// Turn report tagged with the session it came from.
#[derive(Debug)]
pub struct SessionResult {
    pub session: usize,
    pub profile: Profile,
    pub report: TurnReport,
}

/// Drive a single virtual user until the deadline passes or shutdown is requested.
///
/// Stopping only happens in between turns: an in-flight request is always
/// awaited to completion and reported. Returns the number of turns executed.
pub async fn run_session<U: VirtualUser>(
    guard: ShutdownGuard,
    mut user: U,
    client: TargetClient,
    session: usize,
    deadline: Instant,
    result_tx: mpsc::Sender<SessionResult>,
) -> usize {
    let profile = user.profile();
    tracing::debug!(%session, %profile, "virtual user session started");

    let mut turns = 0;
    while Instant::now() < deadline {
        let report = user.turn(&client).await;
        turns += 1;

        if let Err(err) = result_tx
            .send(SessionResult {
                session,
                profile,
                report,
            })
            .await
        {
            tracing::debug!(%session, "failed to send session result msg: {err}");
            break;
        }

        let wait: Duration = user.next_wait();
        tokio::select! {
            _ = guard.cancelled() => {
                tracing::debug!(%session, "exit virtual user session: guard shutdown");
                break;
            }
            _ = sleep_until(deadline) => {
                break;
            }
            _ = sleep(wait) => {}
        }
    }

    tracing::debug!(%session, %profile, %turns, "virtual user session finished");
    turns
}

#[cfg(test)]
mod tests {
    use rama::{graceful::Shutdown, http::StatusCode};
    use tokio::time;

    use super::*;
    use crate::{
        cmd::mock::{MockTargetConfig, mock_target_client},
        random::RngSource,
        user::{HighFrequencyUser, Outcome, StandardUser},
    };

    #[tokio::test(flavor = "current_thread")]
    async fn session_stops_at_deadline_and_reports_every_turn() {
        time::pause();

        let shutdown = Shutdown::no_signal();
        let client = mock_target_client(MockTargetConfig::default());
        let (tx, mut rx) = mpsc::channel(1024);

        let deadline = Instant::now() + Duration::from_millis(100);
        let turns = run_session(
            shutdown.guard(),
            StandardUser::on_start(RngSource::seeded(1)),
            client,
            3,
            deadline,
            tx,
        )
        .await;

        // at most 10ms between turns, at least 1ms
        assert!(turns >= 10, "turns = {turns}");
        assert!(turns <= 101, "turns = {turns}");

        let mut received = 0;
        while let Some(result) = rx.recv().await {
            assert_eq!(result.session, 3);
            assert_eq!(result.profile, Profile::Standard);
            assert_eq!(result.report.outcome, Outcome::Success);
            received += 1;
        }
        assert_eq!(received, turns);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn session_without_time_left_does_nothing() {
        let shutdown = Shutdown::no_signal();
        let client = mock_target_client(MockTargetConfig::default());
        let (tx, mut rx) = mpsc::channel(8);

        let turns = run_session(
            shutdown.guard(),
            HighFrequencyUser::on_start(RngSource::seeded(2)),
            client,
            0,
            Instant::now(),
            tx,
        )
        .await;

        assert_eq!(turns, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn session_stops_when_results_are_no_longer_consumed() {
        let shutdown = Shutdown::no_signal();
        let client = mock_target_client(MockTargetConfig {
            metrics_status: StatusCode::SERVICE_UNAVAILABLE,
            ..Default::default()
        });
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let turns = run_session(
            shutdown.guard(),
            HighFrequencyUser::on_start(RngSource::seeded(3)),
            client,
            0,
            Instant::now() + Duration::from_secs(60),
            tx,
        )
        .await;

        assert_eq!(turns, 1);
    }
}
