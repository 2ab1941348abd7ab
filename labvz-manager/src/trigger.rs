//! Remote lab test trigger.
//!
//! Asks the management agent inside a VM to fetch and test a lab. The agent
//! may still be starting, so transport failures are retried after each of the
//! configured delays; any HTTP response ends the attempts.

use std::net::SocketAddrV4;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Method, Request, Uri};
use hyper_util::rt::TokioIo;
use labvz_core::ManagementEndpoint;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::config::LabConfig;
use crate::LabError;

/// Result of a test-lab request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct TestOutcome {
    /// Whether the agent's reply reported success.
    pub success: bool,
    /// Reply body, or the last transport error if no reply arrived.
    pub response: String,
}

/// Sends test-lab requests to management agents.
#[derive(Debug, Clone)]
pub struct TestTrigger {
    uri: String,
    delays: Vec<Duration>,
}

impl TestTrigger {
    #[must_use]
    pub fn new(config: &LabConfig) -> Self {
        Self {
            uri: config.test_lab_uri.clone(),
            delays: config.retry_delays(),
        }
    }

    /// Replace the delays slept before each attempt.
    #[must_use]
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Full request url for an endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &ManagementEndpoint) -> String {
        format!("http://{endpoint}{}", self.uri)
    }

    /// Ask the agent at `endpoint` to test the lab at `lab_src_url`.
    ///
    /// Success is reported when the reply body contains `Success`. When every
    /// attempt fails to reach the agent, the outcome is unsuccessful and
    /// carries the last transport error.
    ///
    /// # Errors
    /// Returns [`LabError::InvalidEndpoint`] if the request cannot be built.
    /// Transport failures are not errors; they end up in the outcome.
    pub async fn test_lab(
        &self,
        endpoint: &ManagementEndpoint,
        lab_src_url: &str,
        version: Option<&str>,
    ) -> Result<TestOutcome, LabError> {
        let uri: Uri = self.uri.parse().map_err(|e| {
            LabError::InvalidEndpoint(format!("bad test-lab uri {}: {e}", self.uri))
        })?;
        let body = form_body(lab_src_url, version);
        let url = self.url(endpoint);
        tracing::debug!(%url, %body, "triggering lab test");

        let mut last_error = String::from("no attempts configured");
        for (attempt, delay) in self.delays.iter().enumerate() {
            tokio::time::sleep(*delay).await;
            match post_form(endpoint.socket_addr(), &uri, &body).await {
                Ok(response) => {
                    let success = response.contains("Success");
                    tracing::info!(%url, attempt = attempt + 1, success, "lab test answered");
                    return Ok(TestOutcome { success, response });
                }
                Err(LabError::Transport(reason)) => {
                    tracing::error!(
                        %url,
                        attempt = attempt + 1,
                        error = %reason,
                        "lab test attempt failed"
                    );
                    last_error = reason;
                }
                Err(other) => return Err(other),
            }
        }

        tracing::warn!(%url, attempts = self.delays.len(), "giving up on lab test");
        Ok(TestOutcome {
            success: false,
            response: last_error,
        })
    }
}

/// Form-encode the request fields, leaving out `version` when unset.
fn form_body(lab_src_url: &str, version: Option<&str>) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("lab_src_url", lab_src_url);
    if let Some(version) = version {
        form.append_pair("version", version);
    }
    form.finish()
}

async fn post_form(addr: SocketAddrV4, uri: &Uri, body: &str) -> Result<String, LabError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| LabError::Transport(format!("connect to {addr}: {e}")))?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| LabError::Transport(format!("HTTP handshake: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("management agent connection closed: {e}");
        }
    });

    let req = Request::builder()
        .method(Method::POST)
        .uri(uri.clone())
        .header(HOST, addr.to_string())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(CONTENT_LENGTH, body.len())
        .body(Full::new(Bytes::from(body.to_owned())))
        .map_err(|e| LabError::InvalidEndpoint(format!("build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| LabError::Transport(format!("send request: {e}")))?;

    let bytes = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| LabError::Transport(format!("read response body: {e}")))?
        .to_bytes();

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
