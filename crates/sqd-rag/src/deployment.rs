//! Client for a deployed scoring endpoint

use futures_util::StreamExt;
use std::fmt;

use crate::config::{DeploymentConfig, NetworkConfig};
use crate::error::{Error, Result, Stage, UpstreamKind};
use crate::providers::http::build_client;
use crate::types::ScoreRequest;

/// Query sent when the caller does not supply one
pub const DEFAULT_QUERY: &str = "who is the CEO of sqd ?";

/// Reply printed when the endpoint answers without a `reply` field
pub const NO_REPLY: &str = "No reply in response";

/// Invokes the scoring route of a deployed endpoint
#[derive(Clone)]
pub struct DeploymentClient {
    client: reqwest::Client,
    scoring_uri: String,
    access_token: String,
}

impl fmt::Debug for DeploymentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentClient")
            .field("scoring_uri", &self.scoring_uri)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Endpoint answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// The `reply` field of a JSON answer
    Reply(String),
    /// Non-empty lines of an event stream, as received
    Lines(Vec<String>),
}

/// Splits a byte stream into non-empty lines, decoding only once a line is complete
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

impl DeploymentClient {
    pub fn new(config: &DeploymentConfig, network: &NetworkConfig) -> Result<Self> {
        if config.scoring_uri.trim().is_empty() {
            return Err(Error::config(
                "deployment.scoring_uri is not configured (SQD_SCORING_URI)",
            ));
        }
        Ok(Self {
            client: build_client(network.request_timeout())?,
            scoring_uri: config.scoring_uri.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Post one chat turn to the endpoint
    pub async fn invoke(&self, query: &str, stream: bool) -> Result<Invocation> {
        self.invoke_with(query, stream, |_| {}).await
    }

    /// Post one chat turn, passing each streamed line to `on_line` as it arrives
    pub async fn invoke_with<F>(&self, query: &str, stream: bool, mut on_line: F) -> Result<Invocation>
    where
        F: FnMut(&str),
    {
        let accept = if stream {
            "text/event-stream"
        } else {
            "application/json"
        };

        tracing::info!("Invoking {} (stream={})", self.scoring_uri, stream);

        let response = self
            .client
            .post(&self.scoring_uri)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, accept)
            .json(&ScoreRequest::new(query).with_stream(stream))
            .send()
            .await
            .map_err(|e| {
                Error::upstream(
                    Stage::Completion,
                    UpstreamKind::from_transport(&e),
                    format!("Endpoint request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                Stage::Completion,
                UpstreamKind::from_status(status),
                format!("Endpoint returned {}: {}", status, body),
            ));
        }

        if stream {
            let mut lines = Vec::new();
            let mut buffer = LineBuffer::default();
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| {
                    Error::upstream(
                        Stage::Completion,
                        UpstreamKind::from_transport(&e),
                        format!("Endpoint stream failed: {}", e),
                    )
                })?;
                for line in buffer.push(&chunk) {
                    on_line(&line);
                    lines.push(line);
                }
            }
            if let Some(rest) = buffer.finish() {
                on_line(&rest);
                lines.push(rest);
            }
            return Ok(Invocation::Lines(lines));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            Error::upstream(
                Stage::Completion,
                UpstreamKind::MalformedResponse,
                format!("Endpoint returned invalid JSON: {}", e),
            )
        })?;

        let reply = body
            .get("reply")
            .and_then(|v| v.as_str())
            .unwrap_or(NO_REPLY)
            .to_string();
        Ok(Invocation::Reply(reply))
    }
}
