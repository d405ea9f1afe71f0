//! s-ui Panel API Client
//!
//! Read-only access to the two panel endpoints the bot needs:
//! `GET /apiv2/status` and `GET /apiv2/inbounds`.
//!
//! Every call is a fresh round trip: no caching, no retries. All failure
//! modes (network, HTTP status, API-level `success: false`, malformed JSON)
//! fold into a single [`PanelError`].

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

const STATUS_PATH: &str = "/apiv2/status";
const INBOUNDS_PATH: &str = "/apiv2/inbounds";

/// Failure talking to the panel
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// Panel unreachable (DNS, refused connection, timeout, ...)
    #[error("Connection error: {0}")]
    Transport(String),

    /// Non-2xx HTTP status
    #[error("HTTP error: status code {0}")]
    Http(u16),

    /// Panel answered with `success: false`
    #[error("API error: {0}")]
    Api(String),

    /// Body was not the expected JSON envelope
    #[error("Invalid response from panel: {0}")]
    Decode(String),
}

/// A configured proxy listener on the panel
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Inbound {
    pub id: i64,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(rename = "type", default)]
    pub protocol: Option<String>,

    #[serde(rename = "listen_port", default)]
    pub port: Option<i64>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<String>,
}

impl Inbound {
    /// Display name (tag, or a placeholder when the panel has none)
    pub fn name(&self) -> &str {
        self.tag.as_deref().unwrap_or("No Name")
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Common `{ success, obj?, msg? }` envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    obj: Option<T>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InboundsObj {
    #[serde(default)]
    inbounds: Option<Vec<Inbound>>,
}

/// s-ui panel client
#[derive(Clone)]
pub struct PanelClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl PanelClient {
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self, PanelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PanelError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Result<Self, PanelError> {
        Self::new(&config.panel_url, &config.panel_api_token, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the panel is reachable and accepts our token
    pub async fn check_status(&self) -> Result<(), PanelError> {
        self.get::<serde_json::Value>(STATUS_PATH).await.map(|_| ())
    }

    /// Fetch all inbounds, in panel order
    pub async fn list_inbounds(&self) -> Result<Vec<Inbound>, PanelError> {
        let obj = self.get::<InboundsObj>(INBOUNDS_PATH).await?;
        Ok(obj.and_then(|o| o.inbounds).unwrap_or_default())
    }

    /// GET a path and unwrap the API envelope, returning `obj` on success
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, PanelError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Panel request: GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("Token", &self.api_token)
            .send()
            .await
            .map_err(|e| {
                warn!("Panel request to {} failed: {}", path, e);
                if e.is_timeout() {
                    PanelError::Transport("request timed out".to_string())
                } else {
                    PanelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Panel returned HTTP {} for {}", status, path);
            return Err(PanelError::Http(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PanelError::Transport(e.to_string()))?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            warn!("Panel returned malformed JSON for {}: {}", path, e);
            PanelError::Decode(e.to_string())
        })?;

        if !envelope.success {
            let msg = envelope
                .msg
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown API error".to_string());
            warn!("Panel API failure for {}: {}", path, msg);
            return Err(PanelError::Api(msg));
        }

        Ok(envelope.obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str) -> PanelClient {
        PanelClient::new(url, "test-token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_inbound_parse_wire_names() {
        let json = r#"{"id": 2, "tag": "work", "type": "vless", "listen_port": 443,
                       "users": ["alice", "bob"]}"#;
        let inbound: Inbound = serde_json::from_str(json).unwrap();
        assert_eq!(inbound.id, 2);
        assert_eq!(inbound.name(), "work");
        assert_eq!(inbound.protocol.as_deref(), Some("vless"));
        assert_eq!(inbound.port, Some(443));
        assert_eq!(inbound.users, vec!["alice", "bob"]);
    }

    #[test]
    fn test_inbound_parse_missing_fields() {
        let inbound: Inbound = serde_json::from_str(r#"{"id": 7, "users": null}"#).unwrap();
        assert_eq!(inbound.name(), "No Name");
        assert!(inbound.protocol.is_none());
        assert!(inbound.port.is_none());
        assert!(inbound.users.is_empty());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = client_for("https://panel.example.com//");
        assert_eq!(client.base_url(), "https://panel.example.com");
    }

    #[tokio::test]
    async fn test_status_success_sends_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/apiv2/status")
            .match_header("Token", "test-token")
            .match_header("Accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "obj": {"cpu": 1.5}}"#)
            .create_async()
            .await;

        let result = client_for(&server.url()).check_status().await;

        mock.assert_async().await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_status_api_failure_carries_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/apiv2/status")
            .with_status(200)
            .with_body(r#"{"success": false, "msg": "bad token"}"#)
            .create_async()
            .await;

        let result = client_for(&server.url()).check_status().await;

        mock.assert_async().await;
        assert_eq!(result, Err(PanelError::Api("bad token".to_string())));
    }

    #[tokio::test]
    async fn test_status_api_failure_without_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/apiv2/status")
            .with_status(200)
            .with_body(r#"{"success": false}"#)
            .create_async()
            .await;

        let result = client_for(&server.url()).check_status().await;
        assert_eq!(result, Err(PanelError::Api("Unknown API error".to_string())));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/apiv2/inbounds")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let result = client_for(&server.url()).list_inbounds().await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        assert_eq!(err, PanelError::Http(401));
        assert!(err.to_string().contains("401"), "error should mention status code: {}", err);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/apiv2/inbounds")
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let result = client_for(&server.url()).list_inbounds().await;
        assert!(matches!(result, Err(PanelError::Decode(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Nothing listens on port 1
        let result = client_for("http://127.0.0.1:1").check_status().await;
        assert!(matches!(result, Err(PanelError::Transport(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = PanelClient::new(
            &format!("http://{}", addr),
            "test-token",
            Duration::from_millis(300),
        )
        .unwrap();
        let result = client.check_status().await;
        silent.abort();

        assert_eq!(result, Err(PanelError::Transport("request timed out".to_string())));

        let screen = crate::navigation::NavigationController::status_report(&result);
        let text = crate::telegram_ui::unescape_markdown(&screen.text);
        assert!(text.contains("Connection error"), "unexpected report: {}", text);
        assert!(!screen.has_buttons());
    }

    #[tokio::test]
    async fn test_list_inbounds_in_api_order() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/apiv2/inbounds")
            .with_status(200)
            .with_body(
                r#"{"success": true, "obj": {"inbounds": [
                    {"id": 5, "tag": "b", "type": "trojan", "listen_port": 8443, "users": []},
                    {"id": 2, "tag": "a", "type": "vless", "listen_port": 443, "users": ["x"]}
                ]}}"#,
            )
            .create_async()
            .await;

        let inbounds = client_for(&server.url()).list_inbounds().await.unwrap();
        let ids: Vec<i64> = inbounds.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![5, 2]);
    }

    #[tokio::test]
    async fn test_missing_inbounds_key_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/apiv2/inbounds")
            .with_status(200)
            .with_body(r#"{"success": true, "obj": {}}"#)
            .create_async()
            .await;

        let inbounds = client_for(&server.url()).list_inbounds().await.unwrap();
        assert!(inbounds.is_empty());
    }

    #[tokio::test]
    async fn test_missing_obj_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/apiv2/inbounds")
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let inbounds = client_for(&server.url()).list_inbounds().await.unwrap();
        assert!(inbounds.is_empty());
    }
}
