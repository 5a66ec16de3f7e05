use super::{LoadConfig, Profile, ProfileMix};

/// High level load test scenarios.
/// Each scenario is a preset of load shape and profile mix.
#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
pub enum Scenario {
    /// A handful of standard users.
    /// Used to verify the target is reachable and behaves.
    Smoke,

    /// Standard users only.
    /// Used to validate the latency objective under a realistic mix.
    #[default]
    Baseline,

    /// Standard users mixed with high frequency users.
    /// Used to validate the throughput objective.
    Stress,
}

impl Scenario {
    /// Construct the concrete load configuration
    /// associated with this scenario.
    pub fn load_config(self) -> LoadConfig {
        match self {
            Scenario::Smoke => LoadConfig {
                users: Some(5),
                spawn_rate: Some(5.),
                duration: Some(10.),
            },

            Scenario::Baseline => {
                // ramp up over 10 seconds
                LoadConfig {
                    users: Some(100),
                    spawn_rate: Some(10.),
                    duration: Some(60.),
                }
            }

            Scenario::Stress => {
                // ramp up over 5 seconds
                LoadConfig {
                    users: Some(250),
                    spawn_rate: Some(50.),
                    duration: Some(120.),
                }
            }
        }
    }

    /// Profile mix associated with this scenario.
    pub fn profile_mix(self) -> ProfileMix {
        match self {
            Scenario::Smoke | Scenario::Baseline => ProfileMix::single(Profile::Standard),
            Scenario::Stress => ProfileMix::try_new(vec![
                (Profile::Standard, 800),
                (Profile::HighFrequency, 200),
            ])
            .expect("stress scenario profile mix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum as _;

    use super::*;

    #[test]
    fn every_scenario_is_fully_defined() {
        for scenario in Scenario::value_variants() {
            let cfg = scenario.load_config();
            assert!(cfg.users.unwrap_or_default() > 0, "{scenario:?}");
            assert!(cfg.spawn_rate.unwrap_or_default() > 0., "{scenario:?}");
            assert!(cfg.duration.unwrap_or_default() > 0., "{scenario:?}");
            assert!(scenario.profile_mix().iter().any(|(_, w)| w > 0));
        }
    }

    #[test]
    fn stress_mixes_in_high_frequency_users() {
        let profiles: Vec<_> = Scenario::Stress
            .profile_mix()
            .iter()
            .map(|(p, _)| p)
            .collect();
        assert!(profiles.contains(&Profile::HighFrequency));
    }
}
