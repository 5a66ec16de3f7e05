//! Virtual user profiles and the per-session request loop.
//!
//! A virtual user owns all of its state (random source, device identity,
//! counters). Nothing is shared between sessions except the read-only
//! weight tables and the cloned [`TargetClient`].

use std::time::Duration;

use rama::{
    error::OpaqueError,
    http::{Response, StatusCode, body::util::BodyExt as _},
    telemetry::tracing,
};

use crate::{client::TargetClient, config::Profile};

mod action;
mod high_frequency;
mod outcome;
mod pacing;
mod session;
mod standard;

pub use self::{
    action::{Action, WeightTable},
    high_frequency::HighFrequencyUser,
    outcome::{FailureReason, Outcome, TurnReport, classify_health, classify_status},
    pacing::PacingInterval,
    session::{SessionResult, run_session},
    standard::StandardUser,
};

/// A simulated client issuing one traffic turn at a time.
pub trait VirtualUser: Send + 'static {
    fn profile(&self) -> Profile;

    /// Wait to apply after the turn that just finished.
    fn next_wait(&mut self) -> Duration;

    /// Pick an action, execute it against the target and classify the outcome.
    fn turn(&mut self, client: &TargetClient) -> impl Future<Output = TurnReport> + Send;
}

fn status_only(status: StatusCode, _payload: &[u8]) -> Outcome {
    classify_status(status)
}

/// Read the full response without looking at it,
/// so the connection can go back to the pool.
///
/// Returns the number of payload bytes read, `0` on any error.
async fn drain_response(result: Result<Response, OpaqueError>) -> usize {
    match result {
        Ok(resp) => resp
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes().len())
            .unwrap_or_default(),
        Err(_) => 0,
    }
}

/// Read the full response and classify it.
///
/// Returns the outcome and the size of the response payload in bytes.
async fn read_response(
    result: Result<Response, OpaqueError>,
    classify: fn(StatusCode, &[u8]) -> Outcome,
) -> (Outcome, usize) {
    let resp = match result {
        Ok(resp) => resp,
        Err(err) => {
            tracing::debug!("request failed without response: {err}");
            return (Outcome::Failure(FailureReason::Transport(err.to_string())), 0);
        }
    };

    let status = resp.status();
    match resp.into_body().collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            (classify(status, &bytes), bytes.len())
        }
        Err(err) => {
            tracing::debug!(%status, "failed to read response payload: {err}");
            (
                Outcome::Failure(FailureReason::Transport(format!(
                    "read response payload: {err}"
                ))),
                0,
            )
        }
    }
}
