mod load;
mod profile;
mod scenario;

pub use self::{
    load::LoadConfig,
    profile::{Profile, ProfileMix, parse_profile_mix},
    scenario::Scenario,
};
