//! Request/response protocol for reading the profile from another process
//!
//! Two transports share one handler: an in-process tokio channel
//! ([`ProfileService::spawn`]) and newline-delimited JSON over any async byte
//! stream ([`ProfileService::serve_json_lines`]).

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info_span, trace, warn};

use super::ProfileManager;
use crate::trace::{extract_trace_id, generate_trace_id};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileRequest {
    Enabled,
    GetProfileString,
    GetProfileValue,
    SetProfileString { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileResponse {
    Enabled { enabled: bool },
    ProfileString { text: String },
    ProfileValue { value: Value },
    SetProfileString { accepted: bool },
    Error { message: String },
}

/// Answers [`ProfileRequest`]s from a manager
#[derive(Debug, Clone)]
pub struct ProfileService {
    manager: Arc<ProfileManager>,
    allow_writes: bool,
}

type Envelope = (ProfileRequest, oneshot::Sender<ProfileResponse>);

impl ProfileService {
    /// Read-only service; `SetProfileString` is refused
    pub fn new(manager: Arc<ProfileManager>) -> Self {
        Self {
            manager,
            allow_writes: false,
        }
    }

    /// Accept `SetProfileString` (tests and tooling only)
    pub fn with_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    pub fn handle(&self, request: ProfileRequest) -> ProfileResponse {
        trace!(?request, "Profile request");
        match request {
            ProfileRequest::Enabled => ProfileResponse::Enabled {
                enabled: self.manager.enabled(),
            },
            ProfileRequest::GetProfileString => ProfileResponse::ProfileString {
                text: self.manager.profile_string(),
            },
            ProfileRequest::GetProfileValue => ProfileResponse::ProfileValue {
                value: self.manager.profile_value(),
            },
            ProfileRequest::SetProfileString { text } if self.allow_writes => {
                ProfileResponse::SetProfileString {
                    accepted: self.manager.set_profile_string(&text),
                }
            }
            ProfileRequest::SetProfileString { .. } => ProfileResponse::Error {
                message: "profile replacement is disabled for this service".to_string(),
            },
        }
    }

    /// Run the service on the current tokio runtime
    ///
    /// The task ends once every [`ProfileClient`] is dropped.
    pub fn spawn(self) -> ProfileClient {
        let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                let span = info_span!("profile_request", trace_id = %generate_trace_id());
                let response = span.in_scope(|| self.handle(request));
                if reply.send(response).is_err() {
                    debug!("Profile client went away before the reply");
                }
            }
            debug!("Profile service stopped");
        });
        ProfileClient { tx }
    }

    /// Serve newline-delimited JSON until `reader` reaches EOF
    ///
    /// Every response carries a `trace_id`: the request's own when it sent a
    /// non-empty one, a fresh UUID v7 otherwise. Malformed lines get an
    /// `error` response; the stream keeps going. Returns the number of
    /// requests answered.
    pub async fn serve_json_lines<R, W>(&self, reader: R, mut writer: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut served = 0;

        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let raw = serde_json::from_str::<Value>(line);
            let trace_id = raw
                .as_ref()
                .ok()
                .and_then(extract_trace_id)
                .unwrap_or_else(generate_trace_id);
            let span = info_span!("profile_request", trace_id = %trace_id);

            let request = raw.and_then(serde_json::from_value::<ProfileRequest>);
            let response = span.in_scope(|| match request {
                Ok(request) => self.handle(request),
                Err(e) => {
                    warn!(error = %e, "Malformed profile request");
                    ProfileResponse::Error {
                        message: format!("invalid request: {e}"),
                    }
                }
            });

            let mut body = serde_json::to_value(&response).context("Failed to encode response")?;
            if let Value::Object(fields) = &mut body {
                fields.insert("trace_id".to_string(), Value::String(trace_id));
            }
            let mut out = serde_json::to_vec(&body).context("Failed to encode response")?;
            out.push(b'\n');
            writer.write_all(&out).await.context("Failed to write response")?;
            writer.flush().await.context("Failed to flush response")?;
            served += 1;
        }

        debug!(served, "Profile request stream closed");
        Ok(served)
    }
}

/// Async handle to a spawned [`ProfileService`]
#[derive(Debug, Clone)]
pub struct ProfileClient {
    tx: mpsc::Sender<Envelope>,
}

impl ProfileClient {
    pub async fn request(&self, request: ProfileRequest) -> Result<ProfileResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| anyhow!("Profile service is not running"))?;
        reply_rx
            .await
            .context("Profile service dropped the request")
    }

    pub async fn enabled(&self) -> Result<bool> {
        match self.request(ProfileRequest::Enabled).await? {
            ProfileResponse::Enabled { enabled } => Ok(enabled),
            other => Err(unexpected(other)),
        }
    }

    pub async fn profile_string(&self) -> Result<String> {
        match self.request(ProfileRequest::GetProfileString).await? {
            ProfileResponse::ProfileString { text } => Ok(text),
            other => Err(unexpected(other)),
        }
    }

    pub async fn profile_value(&self) -> Result<Value> {
        match self.request(ProfileRequest::GetProfileValue).await? {
            ProfileResponse::ProfileValue { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_profile_string(&self, text: impl Into<String>) -> Result<bool> {
        let request = ProfileRequest::SetProfileString { text: text.into() };
        match self.request(request).await? {
            ProfileResponse::SetProfileString { accepted } => Ok(accepted),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: ProfileResponse) -> anyhow::Error {
    match response {
        ProfileResponse::Error { message } => anyhow!("Profile service error: {message}"),
        other => anyhow!("Unexpected profile service response: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        assert_eq!(
            serde_json::to_value(ProfileRequest::Enabled).unwrap(),
            json!({"type": "enabled"})
        );
        let parsed: ProfileRequest =
            serde_json::from_str(r#"{"type":"set_profile_string","text":"{}"}"#).unwrap();
        assert_eq!(parsed, ProfileRequest::SetProfileString { text: "{}".into() });
    }

    #[test]
    fn test_writes_refused_by_default() {
        let service = ProfileService::new(Arc::new(ProfileManager::new()));
        let response = service.handle(ProfileRequest::SetProfileString { text: "{}".into() });
        assert!(matches!(response, ProfileResponse::Error { .. }));
    }

    #[test]
    fn test_disabled_manager_answers_empty() {
        let service = ProfileService::new(Arc::new(ProfileManager::new()));
        assert_eq!(
            service.handle(ProfileRequest::Enabled),
            ProfileResponse::Enabled { enabled: false }
        );
        assert_eq!(
            service.handle(ProfileRequest::GetProfileValue),
            ProfileResponse::ProfileValue { value: Value::Null }
        );
    }
}
