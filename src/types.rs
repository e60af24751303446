use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::Error;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HealthResponse {
    pub status: Option<String>,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

/// `{success, error?, message?, ...payload}` wrapper used by most endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Turns a `success: false` body into [`Error::Api`].
    pub fn into_payload(self) -> Result<T, Error> {
        if self.success {
            return Ok(self.payload);
        }
        let message = self
            .error
            .or(self.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "The server reported a failure".to_string());
        Err(Error::Api(message))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ResultRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "fileName", alias = "original_filename")]
    pub filename: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "createdAt", alias = "timestamp")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultRecord {
    /// Parses `created_at` as an RFC 3339 timestamp, or as a civil datetime in UTC.
    pub fn created_at(&self) -> Option<jiff::Timestamp> {
        let raw = self.created_at.as_deref()?.trim();
        if let Ok(ts) = raw.parse::<jiff::Timestamp>() {
            return Some(ts);
        }
        raw.parse::<jiff::civil::DateTime>()
            .ok()
            .and_then(|dt| dt.to_zoned(jiff::tz::TimeZone::UTC).ok())
            .map(|zoned| zoned.timestamp())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ResultsPayload {
    pub results: Vec<ResultRecord>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Requirement {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RequirementsPayload {
    pub requirements: Vec<Requirement>,
}

/// Whatever the upload endpoint returns besides the `success` flag.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UploadReceipt {
    #[serde(alias = "resultId", alias = "id")]
    pub result_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
