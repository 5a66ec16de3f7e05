use std::{fmt, time::Duration};

use rama::http::StatusCode;
use serde::Deserialize;

use super::Action;

/// How a single request turned out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureReason),
    /// Fire-and-forget request, the response was never looked at.
    Unchecked,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Failure(reason) => Some(reason),
            Outcome::Success | Outcome::Unchecked => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Response with a status other than 200.
    Status(u16),
    /// 200 response with a health payload that is not healthy.
    Unhealthy,
    /// No response: connection refused, timeout, broken body...
    Transport(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Status(code) => write!(f, "Status code: {code}"),
            FailureReason::Unhealthy => f.write_str("Service unhealthy"),
            FailureReason::Transport(err) => write!(f, "Transport error: {err}"),
        }
    }
}

/// Result of one turn of a virtual user.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub action: Action,
    pub latency: Duration,
    pub response_size: usize,
    pub outcome: Outcome,
}

/// Success iff the status is exactly 200.
pub fn classify_status(status: StatusCode) -> Outcome {
    if status == StatusCode::OK {
        Outcome::Success
    } else {
        Outcome::Failure(FailureReason::Status(status.as_u16()))
    }
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: Option<String>,
}

/// Success iff the status is 200 and the JSON body reports `"status": "healthy"`.
pub fn classify_health(status: StatusCode, body: &[u8]) -> Outcome {
    if status != StatusCode::OK {
        return Outcome::Failure(FailureReason::Status(status.as_u16()));
    }

    match serde_json::from_slice::<HealthPayload>(body) {
        Ok(HealthPayload {
            status: Some(value),
        }) if value == "healthy" => Outcome::Success,
        _ => Outcome::Failure(FailureReason::Unhealthy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::OK), Outcome::Success);
        assert_eq!(
            classify_status(StatusCode::CREATED),
            Outcome::Failure(FailureReason::Status(201))
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Outcome::Failure(FailureReason::Status(500))
        );
    }

    #[test]
    fn health_classification() {
        for (status, body, expected) in [
            (StatusCode::OK, r#"{"status":"healthy"}"#, Outcome::Success),
            (
                StatusCode::OK,
                r#"{"status":"healthy","redis":"down","uptime":"1s"}"#,
                Outcome::Success,
            ),
            (
                StatusCode::OK,
                r#"{"status":"degraded"}"#,
                Outcome::Failure(FailureReason::Unhealthy),
            ),
            (
                StatusCode::OK,
                r#"{"redis":"ok"}"#,
                Outcome::Failure(FailureReason::Unhealthy),
            ),
            (
                StatusCode::OK,
                "not json",
                Outcome::Failure(FailureReason::Unhealthy),
            ),
            (
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"status":"healthy"}"#,
                Outcome::Failure(FailureReason::Status(503)),
            ),
        ] {
            assert_eq!(
                classify_health(status, body.as_bytes()),
                expected,
                "status = {status}, body = {body}"
            );
        }
    }

    #[test]
    fn failure_reasons_render() {
        assert_eq!(FailureReason::Status(503).to_string(), "Status code: 503");
        assert_eq!(FailureReason::Unhealthy.to_string(), "Service unhealthy");
        assert!(
            FailureReason::Transport("connection refused".to_owned())
                .to_string()
                .contains("connection refused")
        );
    }
}
