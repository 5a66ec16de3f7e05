use std::{fmt, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service as _,
    error::{ErrorContext as _, OpaqueError},
    http::{
        Body, Request, Response, Uri,
        client::EasyHttpWebClient,
        layer::{map_response_body::MapResponseBodyLayer, timeout::TimeoutLayer},
        service::client::HttpClientExt as _,
    },
    layer::MapErrLayer,
    service::BoxService,
};
use serde::Serialize;

/// Endpoints of the metrics-ingestion service exercised by the virtual users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Metrics,
    MetricsBatch,
    Analyze,
    Health,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Metrics => "/metrics",
            Endpoint::MetricsBatch => "/metrics/batch",
            Endpoint::Analyze => "/analyze",
            Endpoint::Health => "/health",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path().fmt(f)
    }
}

/// Client for the target service.
///
/// Wraps any `Service<Request>` so that sessions can be driven
/// against a real HTTP(S) target or an in-process router alike.
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct TargetClient {
    inner: BoxService<Request, Response, OpaqueError>,
    base: Arc<str>,
    endpoints: Arc<[Uri; 4]>,
}

impl TargetClient {
    pub fn try_new(
        base: &Uri,
        inner: BoxService<Request, Response, OpaqueError>,
    ) -> Result<Self, OpaqueError> {
        let base_str = base.to_string();
        let base_str = base_str.trim_end_matches('/');

        let endpoint_uri = |endpoint: Endpoint| -> Result<Uri, OpaqueError> {
            format!("{base_str}{}", endpoint.path())
                .parse()
                .with_context(|| format!("create uri for endpoint '{endpoint}'"))
        };

        Ok(Self {
            inner,
            base: base_str.into(),
            endpoints: Arc::new([
                endpoint_uri(Endpoint::Metrics)?,
                endpoint_uri(Endpoint::MetricsBatch)?,
                endpoint_uri(Endpoint::Analyze)?,
                endpoint_uri(Endpoint::Health)?,
            ]),
        })
    }

    /// Base url of the target, without trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn uri(&self, endpoint: Endpoint) -> &Uri {
        match endpoint {
            Endpoint::Metrics => &self.endpoints[0],
            Endpoint::MetricsBatch => &self.endpoints[1],
            Endpoint::Analyze => &self.endpoints[2],
            Endpoint::Health => &self.endpoints[3],
        }
    }

    /// POST the payload as JSON to the given endpoint.
    pub async fn post_json<T>(
        &self,
        endpoint: Endpoint,
        payload: &T,
    ) -> Result<Response, OpaqueError>
    where
        T: Serialize + Send + Sync + ?Sized,
    {
        self.inner
            .post(self.uri(endpoint).clone())
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {endpoint}"))
    }

    /// GET the given endpoint.
    pub async fn get(&self, endpoint: Endpoint) -> Result<Response, OpaqueError> {
        self.inner
            .get(self.uri(endpoint).clone())
            .send()
            .await
            .with_context(|| format!("GET {endpoint}"))
    }
}

/// Create the HTTP(S) web client used to reach the target service.
pub fn new_http_client(
    request_timeout: Duration,
) -> Result<BoxService<Request, Response, OpaqueError>, OpaqueError> {
    let inner_https_client = EasyHttpWebClient::connector_builder()
        .with_default_transport_connector()
        .without_tls_proxy_support()
        .without_proxy_support()
        .with_tls_support_using_boringssl(None)
        .with_default_http_connector()
        .try_with_default_connection_pool()
        .context("create connection pool for target web client")?
        .build_client();

    Ok((
        MapResponseBodyLayer::new(Body::new),
        MapErrLayer::new(OpaqueError::from_std),
        TimeoutLayer::new(request_timeout),
    )
        .into_layer(inner_https_client)
        .boxed())
}
