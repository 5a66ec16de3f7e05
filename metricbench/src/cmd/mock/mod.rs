use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rama::{
    Layer as _, Service,
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::{
        HeaderValue, Request, Response, StatusCode,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::{
            Router,
            extract::State,
            response::{IntoResponse, Json},
        },
    },
    layer::TimeoutLayer,
    net::socket::Interface,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use clap::Args;
use serde::Deserialize;

#[cfg(test)]
use rama::layer::MapErrLayer;

#[cfg(test)]
use crate::client::TargetClient;

#[derive(Debug, Clone, Args)]
/// run a stub metrics-ingestion service
pub struct MockCommand {
    /// network interface to bind to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "127.0.0.1:8000"
    )]
    pub bind: Interface,

    /// status code returned by `POST /metrics`
    #[arg(long, value_name = "STATUS", default_value_t = 200)]
    metrics_status: u16,

    /// status code returned by `POST /metrics/batch`
    #[arg(long, value_name = "STATUS", default_value_t = 200)]
    batch_status: u16,

    /// status code returned by `GET /analyze`
    #[arg(long, value_name = "STATUS", default_value_t = 200)]
    analyze_status: u16,

    /// status code returned by `GET /health`
    #[arg(long, value_name = "STATUS", default_value_t = 200)]
    health_status: u16,

    /// value of the `status` field in the `GET /health` response body
    #[arg(long, value_name = "VALUE", default_value = "healthy")]
    health_value: String,

    /// latency added to every response
    #[arg(long, value_name = "SECONDS", default_value_t = 0.)]
    latency: f64,
}

pub async fn exec(guard: ShutdownGuard, args: MockCommand) -> Result<(), OpaqueError> {
    let cfg = MockTargetConfig::try_from(&args)?;
    tracing::info!(?cfg, "mock target config ready");

    let exec = Executor::graceful(guard);
    let tcp_listener = TcpListener::bind(args.bind.clone(), exec.clone())
        .await
        .map_err(OpaqueError::from_boxed)
        .context("bind mock target http server")?;

    let state = MockTargetState::new(cfg);
    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(env!("CARGO_PKG_NAME"))),
    )
        .into_layer(mock_target_svc(state.clone()));

    let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));
    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    let server_addr = tcp_listener
        .local_addr()
        .context("get bound address for mock target http server")?;
    tracing::info!("mock target listening on: http://{server_addr}");

    tcp_listener.serve(tcp_svc).await;

    tracing::info!(
        metrics = %state.metrics_received.load(Ordering::Acquire),
        batches = %state.batches_received.load(Ordering::Acquire),
        "mock target stopped",
    );

    Ok(())
}

/// Fixed responses of the mock target.
#[derive(Debug, Clone)]
pub(crate) struct MockTargetConfig {
    pub(crate) metrics_status: StatusCode,
    pub(crate) batch_status: StatusCode,
    pub(crate) analyze_status: StatusCode,
    pub(crate) health_status: StatusCode,
    pub(crate) health_value: Arc<str>,
    pub(crate) latency: Duration,
}

impl Default for MockTargetConfig {
    fn default() -> Self {
        Self {
            metrics_status: StatusCode::OK,
            batch_status: StatusCode::OK,
            analyze_status: StatusCode::OK,
            health_status: StatusCode::OK,
            health_value: "healthy".into(),
            latency: Duration::ZERO,
        }
    }
}

impl TryFrom<&MockCommand> for MockTargetConfig {
    type Error = OpaqueError;

    fn try_from(args: &MockCommand) -> Result<Self, Self::Error> {
        let status = |name: &str, code: u16| {
            StatusCode::from_u16(code).with_context(|| format!("invalid {name} status: {code}"))
        };

        let latency = Duration::try_from_secs_f64(args.latency).with_context(|| {
            format!(
                "latency must be a non-negative number of seconds: {}",
                args.latency
            )
        })?;

        Ok(Self {
            metrics_status: status("metrics", args.metrics_status)?,
            batch_status: status("batch", args.batch_status)?,
            analyze_status: status("analyze", args.analyze_status)?,
            health_status: status("health", args.health_status)?,
            health_value: args.health_value.as_str().into(),
            latency,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockTargetState {
    cfg: Arc<MockTargetConfig>,
    metrics_received: Arc<AtomicUsize>,
    batches_received: Arc<AtomicUsize>,
}

impl MockTargetState {
    pub(crate) fn new(cfg: MockTargetConfig) -> Self {
        Self {
            cfg: Arc::new(cfg),
            metrics_received: Default::default(),
            batches_received: Default::default(),
        }
    }

    async fn delay(&self) {
        if !self.cfg.latency.is_zero() {
            tokio::time::sleep(self.cfg.latency).await;
        }
    }
}

pub(crate) fn mock_target_svc(
    state: MockTargetState,
) -> impl Service<Request, Output = Response, Error = Infallible> + Clone {
    Arc::new(
        Router::new_with_state(state)
            .with_post("/metrics", record_metric)
            .with_post("/metrics/batch", record_batch)
            .with_get("/analyze", analyze)
            .with_get("/health", health),
    )
}

/// In-process client for the mock target, no socket involved.
#[cfg(test)]
pub(crate) fn mock_target_client(cfg: MockTargetConfig) -> TargetClient {
    let svc = MapErrLayer::new(OpaqueError::from_std)
        .into_layer(mock_target_svc(MockTargetState::new(cfg)));
    TargetClient::try_new(&rama::http::Uri::from_static("http://mock.target"), svc.boxed())
        .expect("create mock target client")
}

#[derive(Debug, Deserialize)]
struct BatchPayload {
    metrics: Vec<serde_json::Value>,
}

async fn record_metric(
    State(state): State<MockTargetState>,
    Json(_): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.delay().await;
    let _ = state.metrics_received.fetch_add(1, Ordering::SeqCst);
    (
        state.cfg.metrics_status,
        Json(serde_json::json!({ "status": "accepted" })),
    )
}

async fn record_batch(
    State(state): State<MockTargetState>,
    Json(batch): Json<BatchPayload>,
) -> impl IntoResponse {
    state.delay().await;
    let _ = state.batches_received.fetch_add(1, Ordering::SeqCst);
    let _ = state
        .metrics_received
        .fetch_add(batch.metrics.len(), Ordering::SeqCst);
    (
        state.cfg.batch_status,
        Json(serde_json::json!({
            "status": "accepted",
            "count": batch.metrics.len(),
        })),
    )
}

async fn analyze(State(state): State<MockTargetState>) -> impl IntoResponse {
    state.delay().await;
    (
        state.cfg.analyze_status,
        Json(serde_json::json!({
            "metrics_received": state.metrics_received.load(Ordering::Acquire),
            "batches_received": state.batches_received.load(Ordering::Acquire),
        })),
    )
}

async fn health(State(state): State<MockTargetState>) -> impl IntoResponse {
    state.delay().await;
    (
        state.cfg.health_status,
        Json(serde_json::json!({ "status": &*state.cfg.health_value })),
    )
}
