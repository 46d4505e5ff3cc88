use std::time::Instant;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ApiSettings;
use crate::error::{Error, Result};
use crate::harvest::identity::CarrierIdentity;

/// Characters of an error response body kept in the error.
const MAX_ERROR_BODY: usize = 500;

/// What one upload carries to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    pub mc_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_html: Option<String>,
    /// Directory markup, or the structured directory as JSON text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_html: Option<String>,
}

impl IngestPayload {
    pub fn new(identity: CarrierIdentity, carrier_url: Option<String>) -> Self {
        Self {
            mc_number: identity.mc_number,
            carrier_name: identity.name,
            carrier_url,
            overview_html: None,
            directory_html: None,
        }
    }

    pub fn with_overview(mut self, blob: String) -> Self {
        self.overview_html = Some(blob);
        self
    }

    pub fn with_directory(mut self, blob: String) -> Self {
        self.directory_html = Some(blob);
        self
    }
}

/// Acknowledgement body. A missing `ok` counts as accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default = "accepted")]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

fn accepted() -> bool {
    true
}

/// One bounded POST, no retry. Every failure is returned to the operator.
pub async fn submit(api: &ApiSettings, payload: &IngestPayload) -> Result<Ack> {
    let client = Client::builder().timeout(api.timeout()).build()?;
    let url = api.url();
    let started = Instant::now();
    info!(
        mc = %payload.mc_number,
        url = %url,
        overview = payload.overview_html.as_ref().map_or(0, String::len),
        directory = payload.directory_html.as_ref().map_or(0, String::len),
        "submitting carrier"
    );

    let response = client
        .post(&url)
        .json(payload)
        .send()
        .await
        .map_err(|e| request_error(e, api))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| request_error(e, api))?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "ingestion endpoint refused the upload");
        return Err(Error::Status { status: status.as_u16(), body: body.chars().take(MAX_ERROR_BODY).collect() });
    }

    let ack: Ack = serde_json::from_str(&body).map_err(|e| Error::MalformedAck(e.to_string()))?;
    if !ack.ok {
        let reason = ack.error.unwrap_or_else(|| "no reason given".into());
        warn!(reason = %reason, "ingestion rejected the upload");
        return Err(Error::Rejected(reason));
    }
    info!(latency_ms = started.elapsed().as_millis() as u64, "upload accepted");
    Ok(ack)
}

fn request_error(e: reqwest::Error, api: &ApiSettings) -> Error {
    if e.is_timeout() {
        Error::Timeout { secs: api.timeout_secs }
    } else {
        Error::Network(e)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    use super::*;

    /// Read one HTTP request and return its body.
    async fn read_request(sock: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= split + 4 + length {
                    return String::from_utf8_lossy(&buf[split + 4..split + 4 + length]).into_owned();
                }
            }
        }
        String::new()
    }

    /// One-shot HTTP responder; yields the request body it received.
    async fn respond_once(status: &'static str, body: &'static str) -> (ApiSettings, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(request);
        });
        let api = ApiSettings { base_url: format!("http://{addr}"), ..Default::default() };
        (api, rx)
    }

    fn payload() -> IngestPayload {
        let identity = CarrierIdentity { mc_number: "123456".into(), name: Some("ROADRUNNER FREIGHT LLC".into()) };
        IngestPayload::new(identity, Some("https://highway.com/broker/carriers/98765".into()))
            .with_overview("<div>MC 123456</div>".into())
    }

    #[tokio::test]
    async fn accepted_upload_sends_camel_case_payload() {
        let (api, rx) = respond_once("200 OK", r#"{"ok":true,"carrierId":42}"#).await;
        let ack = submit(&api, &payload()).await.unwrap();
        assert!(ack.ok);
        assert_eq!(ack.details["carrierId"], 42);

        let sent: serde_json::Value = serde_json::from_str(&rx.await.unwrap()).unwrap();
        assert_eq!(sent["mcNumber"], "123456");
        assert_eq!(sent["overviewHtml"], "<div>MC 123456</div>");
        assert!(sent.get("directoryHtml").is_none());
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let (api, _rx) = respond_once("401 Unauthorized", r#"{"error":"not signed in"}"#).await;
        let err = submit(&api, &payload()).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 401, .. }));
        assert!(err.hint().contains("Sign in"));
    }

    #[tokio::test]
    async fn rejected_and_malformed_acks() {
        let (api, _rx) = respond_once("200 OK", r#"{"ok":false,"error":"unknown MC"}"#).await;
        let err = submit(&api, &payload()).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref r) if r == "unknown MC"));

        let (api, _rx) = respond_once("200 OK", "<html>login</html>").await;
        assert!(matches!(submit(&api, &payload()).await, Err(Error::MalformedAck(_))));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        });
        let api = ApiSettings { base_url: format!("http://{addr}"), timeout_secs: 1, ..Default::default() };
        let err = submit(&api, &payload()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, Error::Timeout { secs: 1 }));
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let api = ApiSettings { base_url: format!("http://{addr}"), ..Default::default() };
        let err = submit(&api, &payload()).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.is_transport());
    }
}
