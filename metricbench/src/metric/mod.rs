//! Telemetry payloads sent to the target service.

use std::{fmt, time::SystemTime};

use serde::{Serialize, Serializer};

mod synth;

pub use self::synth::{
    ANOMALY_CPU_VALUES, ANOMALY_PROBABILITY, ANOMALY_RPS_VALUES, synthesize_batch,
    synthesize_one, synthesize_rapid,
};

#[cfg(test)]
pub(crate) use self::synth::synthesize_flagged;

/// Opaque identifier of a simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Identifier of the form `device-<k>`.
    pub fn numbered(k: u32) -> Self {
        Self(format!("device-{k}"))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single synthetic telemetry sample.
///
/// Serialized as `{"timestamp": "...Z", "cpu": f64, "rps": f64, "device_id"?: str}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    #[serde(serialize_with = "serialize_rfc3339_millis")]
    timestamp: SystemTime,
    #[serde(rename = "cpu")]
    cpu_percent: f64,
    #[serde(rename = "rps")]
    request_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<DeviceId>,
}

impl MetricSample {
    pub(crate) fn new(
        timestamp: SystemTime,
        cpu_percent: f64,
        request_rate: f64,
        device_id: Option<DeviceId>,
    ) -> Self {
        Self {
            timestamp,
            cpu_percent,
            request_rate,
            device_id,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn cpu_percent(&self) -> f64 {
        self.cpu_percent
    }

    pub fn request_rate(&self) -> f64 {
        self.request_rate
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }
}

/// Body of the `/metrics/batch` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsBatch {
    pub metrics: Vec<MetricSample>,
}

fn serialize_rfc3339_millis<S>(ts: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_rfc3339_millis(*ts))
}
