use std::time::Duration;

use crate::random::RandomSource;

/// Range from which the wait between two turns of a session is drawn uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingInterval {
    min: Duration,
    max: Duration,
}

impl PacingInterval {
    /// Bounds are swapped when given in the wrong order.
    pub const fn new(min: Duration, max: Duration) -> Self {
        if min.as_nanos() <= max.as_nanos() {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[cfg(test)]
    const fn min(&self) -> Duration {
        self.min
    }

    #[cfg(test)]
    const fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: RandomSource>(&self, rng: &mut R) -> Duration {
        let secs = rng.uniform(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0)).clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RngSource;

    #[test]
    fn samples_within_bounds() {
        let pacing = PacingInterval::new(Duration::from_micros(100), Duration::from_millis(1));
        let mut rng = RngSource::seeded(1);
        for _ in 0..10_000 {
            let d = pacing.sample(&mut rng);
            assert!(d >= pacing.min() && d <= pacing.max(), "d = {d:?}");
        }
    }

    #[test]
    fn swapped_bounds_are_normalised() {
        let pacing = PacingInterval::new(Duration::from_millis(10), Duration::from_millis(1));
        assert_eq!(pacing.min(), Duration::from_millis(1));
        assert_eq!(pacing.max(), Duration::from_millis(10));
    }

    #[test]
    fn fixed_interval() {
        let pacing = PacingInterval::new(Duration::from_millis(5), Duration::from_millis(5));
        let mut rng = RngSource::seeded(2);
        assert_eq!(pacing.sample(&mut rng), Duration::from_millis(5));
    }
}
