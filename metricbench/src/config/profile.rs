use std::{fmt, str::FromStr};

use rama::error::{ErrorContext as _, OpaqueError};
use rand::distr::weighted::WeightedIndex;

use crate::random::RandomSource;

/// Virtual user profiles that can be mixed into a load test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Device sending single metrics, batches, analysis reads and health checks.
    Standard,
    /// Rapid fire-and-forget metric submission.
    HighFrequency,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Standard => "standard",
            Profile::HighFrequency => "high-frequency",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for Profile {
    type Err = OpaqueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "std" => Ok(Profile::Standard),
            "high-frequency" | "high_frequency" | "hf" | "rapid" => Ok(Profile::HighFrequency),
            other => Err(OpaqueError::from_display(format!(
                "unknown virtual user profile '{other}'"
            ))),
        }
    }
}

/// Ratio in which profiles are assigned to newly spawned sessions.
///
/// Parsed from a comma separated list of profiles,
/// each with an optional quality weight in `[0, 1]` (default `1`),
/// e.g. `standard; q=0.9, high-frequency; q=0.1`.
#[derive(Debug, Clone)]
pub struct ProfileMix {
    entries: Vec<(Profile, u16)>,
    dist: WeightedIndex<u32>,
}

impl ProfileMix {
    pub fn try_new(entries: Vec<(Profile, u16)>) -> Result<Self, OpaqueError> {
        let dist = WeightedIndex::new(entries.iter().map(|(_, w)| u32::from(*w)))
            .context("create weighted profile index (at least one positive weight required)")?;
        Ok(Self { entries, dist })
    }

    /// Only the given profile.
    pub fn single(profile: Profile) -> Self {
        Self {
            entries: vec![(profile, 1000)],
            dist: WeightedIndex::new([1000u32]).expect("single positive weight"),
        }
    }

    pub fn pick<R: RandomSource>(&self, rng: &mut R) -> Profile {
        self.entries[rng.weighted(&self.dist)].0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Profile, u16)> + '_ {
        self.entries.iter().copied()
    }
}

impl Default for ProfileMix {
    fn default() -> Self {
        Self::single(Profile::Standard)
    }
}

impl fmt::Display for ProfileMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (profile, weight)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if *weight == 1000 {
                write!(f, "{profile}")?;
            } else {
                write!(f, "{profile}; q={}", *weight as f64 / 1000.0)?;
            }
        }
        Ok(())
    }
}

impl FromStr for ProfileMix {
    type Err = OpaqueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let entries = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_weighted_profile)
            .collect::<Result<Vec<_>, _>>()?;
        Self::try_new(entries).with_context(|| format!("parse profile mix '{input}'"))
    }
}

/// Parse `profile` or `profile; q=0.5`, weight scaled to `[0, 1000]`.
fn parse_weighted_profile(s: &str) -> Result<(Profile, u16), OpaqueError> {
    let mut parts = s.split(';');
    let profile: Profile = parts.next().unwrap_or_default().parse()?;

    let weight = match parts.next() {
        None => 1000,
        Some(param) => {
            let q = param
                .trim()
                .strip_prefix("q=")
                .with_context(|| format!("expected 'q=<weight>' parameter in '{s}'"))?;
            let q: f64 = q
                .trim()
                .parse()
                .with_context(|| format!("parse quality weight in '{s}'"))?;
            (q.clamp(0.0, 1.0) * 1000.0).round() as u16
        }
    };

    if parts.next().is_some() {
        return Err(OpaqueError::from_display(format!(
            "only a single quality parameter is allowed: '{s}'"
        )));
    }

    Ok((profile, weight))
}

pub fn parse_profile_mix(input: &str) -> Result<ProfileMix, String> {
    input.parse().map_err(|err: OpaqueError| err.to_string())
}
