/// Load shape configuration.
/// This models how many virtual users are running and for how long.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct LoadConfig {
    /// Number of concurrent virtual user sessions.
    #[arg(long, short = 'u', value_name = "N")]
    pub users: Option<u32>,

    /// Sessions spawned per second while ramping up (<= 0 = all at once).
    #[arg(long, value_name = "USERS_PER_SECOND")]
    pub spawn_rate: Option<f64>,

    /// Total test duration, ramp-up included.
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,
}
