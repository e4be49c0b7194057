//! Sync Dispatcher.
//!
//! Posts one metric family's records to the sync endpoint. Failures are
//! returned as [`DispatchError`] values so the engine can record them and
//! move on to the next family.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HttpTimeouts;
use crate::error::{Error, Result};
use crate::model::{HealthRecord, RecordType};

/// Path of the sync endpoint, relative to the server URL.
pub const SYNC_PATH: &str = "/api/sync/health-connect";

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    device_secret: &'a str,
    data_type: &'a str,
    records: &'a [HealthRecord],
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    success: bool,
    synced: i64,
    #[serde(default)]
    sync_id: Option<String>,
}

/// Server acknowledgement of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub success: bool,
    pub synced: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
    /// No request was sent because there was nothing to send.
    #[serde(default)]
    pub skipped: bool,
}

impl SyncAck {
    const fn skipped() -> Self {
        Self {
            success: true,
            synced: 0,
            sync_id: None,
            skipped: true,
        }
    }
}

/// Why a dispatch did not produce an acknowledgement.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Sync failed: HTTP {status}")]
    Status { status: u16 },

    #[error("Empty sync response body")]
    EmptyBody,

    #[error("Sync request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Invalid sync response: {0}")]
    Decode(String),

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type DispatchResult = std::result::Result<SyncAck, DispatchError>;

/// Client for the sync endpoint.
///
/// The device secret and API key are injected at construction and never
/// looked up again.
#[derive(Debug, Clone)]
pub struct SyncDispatcher {
    client: reqwest::Client,
    endpoint: String,
    device_secret: String,
}

impl SyncDispatcher {
    /// Build a dispatcher for `base_url`.
    ///
    /// Every request carries `Authorization: Bearer <api_key>`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the API key cannot be used as a header value and
    /// `Http` if the client cannot be built.
    pub fn new(
        base_url: &str,
        device_secret: &str,
        api_key: &str,
        timeouts: &HttpTimeouts,
    ) -> Result<Self> {
        let client = authorized_client(api_key, timeouts)?;
        Ok(Self {
            client,
            endpoint: format!("{}{SYNC_PATH}", base_url.trim_end_matches('/')),
            device_secret: device_secret.to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post `records` as `record_type`.
    ///
    /// An empty slice returns a skipped acknowledgement without touching
    /// the network.
    pub async fn dispatch(&self, record_type: RecordType, records: &[HealthRecord]) -> DispatchResult {
        if records.is_empty() {
            debug!(record_type = %record_type, "Nothing to dispatch");
            return Ok(SyncAck::skipped());
        }

        let body = serde_json::to_vec(&SyncRequest {
            device_secret: &self.device_secret,
            data_type: record_type.wire_tag(),
            records,
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(DispatchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            warn!(record_type = %record_type, status = status.as_u16(), "Sync endpoint rejected batch");
            return Err(DispatchError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(DispatchError::Transport)?;
        let parsed: Option<SyncResponse> = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).map_err(|e| DispatchError::Decode(e.to_string()))?
        };
        let parsed = parsed.ok_or(DispatchError::EmptyBody)?;

        Ok(SyncAck {
            success: parsed.success,
            synced: parsed.synced,
            sync_id: parsed.sync_id,
            skipped: false,
        })
    }
}

/// Build a client that sends the bearer key and enforces the timeouts.
pub(crate) fn authorized_client(api_key: &str, timeouts: &HttpTimeouts) -> Result<reqwest::Client> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| Error::Config("API key contains characters not allowed in a header".into()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BloodPressureReading;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(server: &MockServer) -> SyncDispatcher {
        SyncDispatcher::new(&server.uri(), "dev-secret", "key-123", &HttpTimeouts::default()).unwrap()
    }

    fn readings() -> Vec<HealthRecord> {
        vec![HealthRecord::BloodPressure(BloodPressureReading {
            systolic: 120,
            diastolic: 80,
            measured_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            source_app: Some("com.omronhealthcare.omronconnect".into()),
            device_name: None,
        })]
    }

    #[tokio::test]
    async fn test_successful_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SYNC_PATH))
            .and(header("authorization", "Bearer key-123"))
            .and(body_partial_json(json!({
                "device_secret": "dev-secret",
                "data_type": "blood_pressure",
                "records": [{"systolic": 120, "diastolic": 80}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "synced": 1,
                "sync_id": "sync_abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ack = dispatcher(&server)
            .dispatch(RecordType::BloodPressure, &readings())
            .await
            .unwrap();
        assert_eq!(ack.synced, 1);
        assert_eq!(ack.sync_id.as_deref(), Some("sync_abc"));
        assert!(!ack.skipped);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ack = dispatcher(&server).dispatch(RecordType::Sleep, &[]).await.unwrap();
        assert!(ack.skipped);
        assert_eq!(ack.synced, 0);
    }

    #[tokio::test]
    async fn test_non_2xx_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SYNC_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = dispatcher(&server)
            .dispatch(RecordType::BloodPressure, &readings())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn test_null_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SYNC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let err = dispatcher(&server)
            .dispatch(RecordType::BloodPressure, &readings())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyBody));
        assert_eq!(err.to_string(), "Empty sync response body");
    }

    #[tokio::test]
    async fn test_absent_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SYNC_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = dispatcher(&server)
            .dispatch(RecordType::BloodPressure, &readings())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyBody));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dispatcher = SyncDispatcher::new(
            &format!("http://127.0.0.1:{port}"),
            "dev-secret",
            "key-123",
            &HttpTimeouts::default(),
        )
        .unwrap();

        let err = dispatcher
            .dispatch(RecordType::BloodPressure, &readings())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }

    #[test]
    fn test_rejects_unusable_api_key() {
        let err = SyncDispatcher::new("http://localhost", "s", "bad\nkey", &HttpTimeouts::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
