use std::{sync::LazyLock, time::SystemTime};

use rand_distr::Normal;

use super::{DeviceId, MetricSample};
use crate::random::RandomSource;

/// Probability that a sample gets its values replaced by extreme ones.
pub const ANOMALY_PROBABILITY: f64 = 0.05;

/// CPU values used for anomalies. Boundary values are intended.
pub const ANOMALY_CPU_VALUES: [f64; 6] = [95.0, 98.0, 99.0, 5.0, 2.0, 1.0];

/// Request rate values used for anomalies.
pub const ANOMALY_RPS_VALUES: [f64; 4] = [1500.0, 2000.0, 50.0, 10.0];

static CPU_DIST: LazyLock<Normal<f64>> =
    LazyLock::new(|| Normal::new(50.0, 15.0).expect("create cpu normal distribution"));

static RPS_DIST: LazyLock<Normal<f64>> =
    LazyLock::new(|| Normal::new(500.0, 100.0).expect("create rps normal distribution"));

/// Synthesize a single sample stamped with the current time.
pub fn synthesize_one<R: RandomSource>(rng: &mut R, device_id: Option<&DeviceId>) -> MetricSample {
    synthesize_flagged(rng, device_id, SystemTime::now()).0
}

/// Synthesize `count` independent samples.
///
/// Each sample rolls its own anomaly chance.
/// Timestamps never go backwards within the returned batch,
/// even if the wall clock does.
pub fn synthesize_batch<R: RandomSource>(
    rng: &mut R,
    count: usize,
    device_id: Option<&DeviceId>,
) -> Vec<MetricSample> {
    let mut samples = Vec::with_capacity(count);
    let mut last = SystemTime::UNIX_EPOCH;
    for _ in 0..count {
        let now = SystemTime::now().max(last);
        last = now;
        samples.push(synthesize_flagged(rng, device_id, now).0);
    }
    samples
}

/// Cheap sample for the high frequency profile:
/// uniform values, no anomalies and no device.
pub fn synthesize_rapid<R: RandomSource>(rng: &mut R) -> MetricSample {
    let cpu = round2(rng.uniform(20.0..=80.0));
    let rps = round2(rng.uniform(200.0..=800.0));
    MetricSample::new(SystemTime::now(), cpu, rps, None)
}

/// Synthesize a sample at the given time,
/// also returning whether the anomaly override was applied.
pub(crate) fn synthesize_flagged<R: RandomSource>(
    rng: &mut R,
    device_id: Option<&DeviceId>,
    timestamp: SystemTime,
) -> (MetricSample, bool) {
    let mut cpu = rng.gauss(&CPU_DIST).clamp(0.0, 100.0);
    let mut rps = rng.gauss(&RPS_DIST).max(0.0);

    let anomalous = rng.chance(ANOMALY_PROBABILITY);
    if anomalous {
        if let Some(v) = rng.choose(&ANOMALY_CPU_VALUES) {
            cpu = *v;
        }
        if let Some(v) = rng.choose(&ANOMALY_RPS_VALUES) {
            rps = *v;
        }
    }

    (
        MetricSample::new(timestamp, round2(cpu), round2(rps), device_id.cloned()),
        anomalous,
    )
}

#[inline]
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
