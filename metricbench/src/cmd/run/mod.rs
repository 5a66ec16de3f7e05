use std::{sync::Arc, time::Duration};

use rama::{
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::Uri,
    telemetry::tracing,
};

use clap::Args;
use tokio::{
    sync::mpsc::{self, Receiver},
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use crate::{
    client::{TargetClient, new_http_client},
    config::{LoadConfig, Profile, ProfileMix, Scenario, parse_profile_mix},
    observer::{ConsoleObserver, LifecycleObserver, RequestEvent, SlowRequestLog, TestPlan},
    random::RngSource,
    user::{HighFrequencyUser, SessionResult, StandardUser, run_session},
};

pub mod reporter;

use self::reporter::*;

#[derive(Debug, Clone, Args)]
/// run a load test against a metrics-ingestion service
pub struct RunCommand {
    /// base url of the target service, e.g. `http://127.0.0.1:8000`
    #[arg(value_name = "TARGET_URL", required = true)]
    target: Uri,

    /// report json instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    json: bool,

    #[clap(flatten)]
    config: Option<LoadConfig>,

    #[arg(long)]
    /// Scenario to run,
    /// manually defined parameters overwrite scenario parameters.
    scenario: Option<Scenario>,

    #[arg(long, value_parser = parse_profile_mix)]
    /// Virtual user profiles to mix, e.g. `standard; q=0.9, high-frequency; q=0.1`.
    ///
    /// Overwrites the profile mix of the scenario.
    profiles: Option<ProfileMix>,

    /// Seed all random sources, making the generated traffic reproducible.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Timeout applied to every request
    #[arg(long, value_name = "SECONDS", default_value_t = 10.)]
    timeout: f64,

    /// Log level used for requests exceeding the latency objective
    #[arg(long, value_name = "LEVEL", default_value_t, value_enum)]
    slow_requests: SlowRequestLog,
}

const DEFAULT_USERS: u32 = 100;
const DEFAULT_SPAWN_RATE: f64 = 10.;
const DEFAULT_DURATION: f64 = 60.;

fn request_timeout(secs: f64) -> Result<Duration, OpaqueError> {
    if !secs.is_finite() || secs <= 0. {
        return Err(OpaqueError::from_display(format!(
            "request timeout has to be a positive number of seconds: {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("request timeout out of range: {secs}"))
}

pub async fn exec(guard: ShutdownGuard, args: RunCommand) -> Result<(), OpaqueError> {
    let http_client =
        new_http_client(request_timeout(args.timeout)?).context("create HTTP(S) client")?;
    let client =
        TargetClient::try_new(&args.target, http_client).context("create target client")?;

    let profiles = match (args.profiles, args.scenario) {
        (Some(profiles), _) => {
            tracing::info!("profile mix: use overwrite: {profiles}");
            profiles
        }
        (None, Some(scenario)) => {
            let profiles = scenario.profile_mix();
            tracing::info!("profile mix: use scenario: {profiles}");
            profiles
        }
        (None, None) => {
            let profiles = ProfileMix::default();
            tracing::info!("profile mix: use default: {profiles}");
            profiles
        }
    };

    let load_cfg = merge_load_cfg(args.scenario, args.config);
    let cfg = HarnessConfig::try_new(load_cfg, profiles, args.seed)?;

    tracing::info!(
        users = %cfg.users,
        spawn_rate = %cfg.spawn_rate,
        duration = ?cfg.duration,
        seed = ?cfg.seed,
        "load config parameters ready",
    );

    const REPORT_INTERVAL: Duration = Duration::from_secs(1);

    let reporter: Box<dyn Reporter> = if args.json {
        const EMIT_EVENTS: bool = true;
        Box::new(JsonlReporter::new(REPORT_INTERVAL, EMIT_EVENTS))
    } else {
        Box::new(HumanReporter::new(REPORT_INTERVAL))
    };

    let observer = Arc::new(ConsoleObserver::new(args.slow_requests));

    let summary = Harness::new(cfg, client, observer, reporter)
        .run(guard)
        .await?;

    tracing::info!(
        total = %summary.total,
        ok = %summary.ok,
        failed = %summary.failed,
        unchecked = %summary.unchecked,
        slow = %summary.slow,
        rps = %summary.rps,
        "load test finished",
    );

    Ok(())
}

/// Fully resolved parameters of a load test run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub users: usize,
    pub spawn_rate: f64,
    pub duration: Duration,
    pub profiles: ProfileMix,
    pub seed: Option<u64>,
}

impl HarnessConfig {
    pub fn try_new(
        load: LoadConfig,
        profiles: ProfileMix,
        seed: Option<u64>,
    ) -> Result<Self, OpaqueError> {
        let users = load.users.unwrap_or(DEFAULT_USERS) as usize;
        let spawn_rate = load.spawn_rate.unwrap_or(DEFAULT_SPAWN_RATE);
        let duration = load.duration.unwrap_or(DEFAULT_DURATION);

        if !spawn_rate.is_finite() {
            return Err(OpaqueError::from_display(format!(
                "spawn rate has to be a finite number: {spawn_rate}"
            )));
        }
        if !duration.is_finite() || duration <= 0. {
            return Err(OpaqueError::from_display(format!(
                "duration has to be a positive number of seconds: {duration}"
            )));
        }

        let cfg = Self {
            users,
            spawn_rate,
            duration: Duration::try_from_secs_f64(duration)
                .with_context(|| format!("duration out of range: {duration}"))?,
            profiles,
            seed,
        };
        // the last offset is the largest one
        cfg.ramp_up()?;
        Ok(cfg)
    }

    /// Offset from the test start at which the session with the given index is spawned.
    fn spawn_offset(&self, index: usize) -> Result<Duration, OpaqueError> {
        if self.spawn_rate <= 0. || index == 0 {
            return Ok(Duration::ZERO);
        }
        let secs = index as f64 / self.spawn_rate;
        Duration::try_from_secs_f64(secs).with_context(|| {
            format!(
                "spawn offset of session {index} out of range (spawn rate: {})",
                self.spawn_rate
            )
        })
    }

    /// Time it takes to spawn all sessions.
    fn ramp_up(&self) -> Result<Duration, OpaqueError> {
        self.spawn_offset(self.users.saturating_sub(1))
    }

    fn session_rng(&self, index: usize) -> RngSource {
        RngSource::new(self.seed.map(|seed| seed.wrapping_add(index as u64)))
    }
}

/// Runs virtual user sessions against a target and reports their results.
pub struct Harness {
    cfg: HarnessConfig,
    client: TargetClient,
    observer: Arc<dyn LifecycleObserver>,
    reporter: Box<dyn Reporter>,
}

impl Harness {
    pub fn new(
        cfg: HarnessConfig,
        client: TargetClient,
        observer: Arc<dyn LifecycleObserver>,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        Self {
            cfg,
            client,
            observer,
            reporter,
        }
    }

    /// Ramp up all sessions, wait for them to finish and return the summary.
    ///
    /// Sessions stop at the configured duration or as soon as the guard is cancelled.
    pub async fn run(self, guard: ShutdownGuard) -> Result<Summary, OpaqueError> {
        let Self {
            cfg,
            client,
            observer,
            reporter,
        } = self;

        let start = Instant::now();
        let deadline = start
            .checked_add(cfg.duration)
            .with_context(|| format!("compute deadline for duration {:?}", cfg.duration))?;
        let ramp_up = cfg.ramp_up()?;

        observer.on_test_start(&TestPlan {
            target: client.base().to_owned(),
            users: cfg.users,
            spawn_rate: cfg.spawn_rate,
            duration: cfg.duration,
            profiles: cfg.profiles.to_string(),
        });

        let (result_tx, result_rx) = mpsc::channel(cfg.users.clamp(1, 1024) * 8);
        let worker = guard.spawn_task(report_worker(
            observer.clone(),
            reporter,
            result_rx,
            start,
            ramp_up,
        ));

        let mut cancelled = std::pin::pin!(guard.clone_weak().into_cancelled());
        let mut sessions: Vec<JoinHandle<usize>> = Vec::with_capacity(cfg.users);

        for index in 0..cfg.users {
            let spawn_at = match start.checked_add(cfg.spawn_offset(index)?) {
                Some(spawn_at) if spawn_at < deadline => spawn_at,
                _ => {
                    tracing::debug!(
                        %index,
                        "stop ramp up: deadline passed before all sessions were spawned"
                    );
                    break;
                }
            };
            if spawn_at > Instant::now() {
                tokio::select! {
                    _ = cancelled.as_mut() => {
                        tracing::debug!(%index, "stop ramp up: guard shutdown");
                        break;
                    }
                    _ = sleep_until(spawn_at) => {}
                }
            }

            let mut rng = cfg.session_rng(index);
            let profile = cfg.profiles.pick(&mut rng);
            let client = client.clone();
            let result_tx = result_tx.clone();

            let session = match profile {
                Profile::Standard => guard.spawn_task_fn(async move |guard| {
                    let user = StandardUser::on_start(rng);
                    run_session(guard, user, client, index, deadline, result_tx).await
                }),
                Profile::HighFrequency => guard.spawn_task_fn(async move |guard| {
                    let user = HighFrequencyUser::on_start(rng);
                    run_session(guard, user, client, index, deadline, result_tx).await
                }),
            };
            sessions.push(session);
        }

        tracing::debug!(sessions = %sessions.len(), "ramp up finished");
        drop(result_tx);

        let mut turns = 0;
        for session in sessions {
            turns += session.await.context("join virtual user session")?;
        }
        tracing::debug!(%turns, "all virtual user sessions finished");

        let mut reporter = worker.await.context("join report worker")?;
        let summary = reporter.finish(start.elapsed());
        observer.on_test_stop(&summary);

        Ok(summary)
    }
}

/// Forward every session result to the observer and the reporter,
/// until all sessions dropped their sender.
async fn report_worker(
    observer: Arc<dyn LifecycleObserver>,
    mut reporter: Box<dyn Reporter>,
    mut result_rx: Receiver<SessionResult>,
    start: Instant,
    ramp_up: Duration,
) -> Box<dyn Reporter> {
    while let Some(SessionResult {
        session,
        profile,
        report,
    }) = result_rx.recv().await
    {
        observer.on_request(&RequestEvent {
            operation: report.action.name(),
            latency: report.latency,
            response_size: report.response_size,
            error: report.outcome.failure(),
        });

        let elapsed = start.elapsed();
        let ev = RequestResultEvent {
            ts: std::time::SystemTime::now(),
            elapsed,
            phase: phase_at(elapsed, ramp_up),
            session,
            profile,
            report,
        };

        reporter.on_result(&ev);
        reporter.on_tick(elapsed);
    }

    tracing::debug!("exit report worker: result senders closed");
    reporter
}

fn phase_at(elapsed: Duration, ramp_up: Duration) -> Phase {
    if elapsed < ramp_up {
        Phase::RampUp
    } else {
        Phase::Steady
    }
}

fn merge_load_cfg(scenario: Option<Scenario>, config: Option<LoadConfig>) -> LoadConfig {
    let scenario_cfg = scenario
        .map(|s| {
            tracing::info!("use scenario to define base config: {s:?}");
            s.load_config()
        })
        .unwrap_or_else(|| {
            tracing::info!("no scenario defined, use default as base config");
            Default::default()
        });

    let overwrite_cfg = config.unwrap_or_default();

    macro_rules! merge_config {
        ($scenario:ident, $overwrite:ident, {$($property:ident),+ $(,)?}) => {
            LoadConfig {
                $(
                    $property: if let Some(value) = $overwrite.$property {
                        tracing::info!("property '{}': use overwrite: {value}", stringify!($property));
                        Some(value)
                    } else if let Some(value) = $scenario.$property {
                        tracing::info!("property '{}': use scenario: {value}", stringify!($property));
                        Some(value)
                    } else {
                        tracing::info!("property '{}': undefined", stringify!($property));
                        None
                    },
                )+
            }
        };
    }

    merge_config!(
        scenario_cfg, overwrite_cfg,
        {
            users,
            spawn_rate,
            duration,
        }
    )
}
