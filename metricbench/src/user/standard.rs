use std::{sync::LazyLock, time::Duration};

use tokio::time::Instant;

use super::{
    Action, Outcome, PacingInterval, TurnReport, VirtualUser, WeightTable, classify_health,
    read_response, status_only,
};
use crate::{
    client::{Endpoint, TargetClient},
    config::Profile,
    metric::{DeviceId, MetricsBatch, synthesize_batch, synthesize_one},
    random::{RandomSource, RngSource},
};

/// Action mix of the standard profile: 10:2:1:1.
pub(super) static STANDARD_ACTIONS: LazyLock<WeightTable> = LazyLock::new(|| {
    WeightTable::try_new([
        (Action::SendMetric, 10),
        (Action::SendBatch, 2),
        (Action::Analyze, 1),
        (Action::HealthCheck, 1),
    ])
    .expect("create standard profile weight table")
});

/// IoT device or API client sending metrics at a steady pace.
///
/// The device identity is picked once from a fleet of 1000 devices;
/// multiple sessions may end up as the same device.
#[derive(Debug)]
pub struct StandardUser<R = RngSource> {
    rng: R,
    device_id: DeviceId,
    metrics_count: u64,
}

impl<R: RandomSource> StandardUser<R> {
    pub const PACING: PacingInterval =
        PacingInterval::new(Duration::from_millis(1), Duration::from_millis(10));

    pub const BATCH_SIZE: usize = 10;

    pub const DEVICE_FLEET_SIZE: u32 = 1000;

    /// Start a new session, assigning the device identity.
    pub fn on_start(mut rng: R) -> Self {
        let k = rng.uniform_int(1..=Self::DEVICE_FLEET_SIZE);
        Self {
            rng,
            device_id: DeviceId::numbered(k),
            metrics_count: 0,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Number of single metrics accepted by the target so far.
    pub fn metrics_count(&self) -> u64 {
        self.metrics_count
    }

    fn pick_action(&mut self) -> Action {
        STANDARD_ACTIONS.pick(&mut self.rng)
    }

    async fn send_metric(&mut self, client: &TargetClient) -> (Outcome, usize) {
        let sample = synthesize_one(&mut self.rng, Some(&self.device_id));
        let result = client.post_json(Endpoint::Metrics, &sample).await;

        let (outcome, size) = read_response(result, status_only).await;
        if outcome.is_success() {
            self.metrics_count += 1;
        }
        (outcome, size)
    }

    async fn send_batch(&mut self, client: &TargetClient) -> (Outcome, usize) {
        let batch = MetricsBatch {
            metrics: synthesize_batch(&mut self.rng, Self::BATCH_SIZE, Some(&self.device_id)),
        };
        let result = client.post_json(Endpoint::MetricsBatch, &batch).await;
        read_response(result, status_only).await
    }
}

impl<R: RandomSource> VirtualUser for StandardUser<R> {
    fn profile(&self) -> Profile {
        Profile::Standard
    }

    fn next_wait(&mut self) -> Duration {
        Self::PACING.sample(&mut self.rng)
    }

    async fn turn(&mut self, client: &TargetClient) -> TurnReport {
        let action = self.pick_action();
        let start = Instant::now();

        let (outcome, response_size) = match action {
            Action::SendMetric | Action::RapidMetric => self.send_metric(client).await,
            Action::SendBatch => self.send_batch(client).await,
            Action::Analyze => {
                let result = client.get(Endpoint::Analyze).await;
                read_response(result, status_only).await
            }
            Action::HealthCheck => {
                let result = client.get(Endpoint::Health).await;
                read_response(result, classify_health).await
            }
        };

        TurnReport {
            action,
            latency: start.elapsed(),
            response_size,
            outcome,
        }
    }
}
