//! HTTP client for the splicer agent: token issuance, SSE stream
//! consumption, and run cancellation.

use bytes::BytesMut;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SplicerConfig;
use crate::error::ClientError;
use crate::models::{CancelStatus, StreamTokenRequest, StreamTokenResponse, SubmitRequest};
use crate::sse::{decode_frame, Frame, FrameParser, StreamEvent};

/// One item yielded by [`SplicerClient::open_stream`].
///
/// `raw` preserves the frame exactly as received so the session can keep a
/// verbatim audit trail even for events it does not act on.
#[derive(Debug, Clone)]
pub struct StreamEnvelope {
    pub raw: Frame,
    pub event: StreamEvent,
}

#[derive(Debug, Clone)]
pub struct SplicerClient {
    config: SplicerConfig,
    http: reqwest::Client,
}

impl SplicerClient {
    pub fn new(config: SplicerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Request a stream token for a new run on `thread_id`.
    ///
    /// A 429 surfaces as [`ClientError::RateLimited`] so callers can show a
    /// friendly retry message instead of a generic failure.
    pub async fn issue_stream_token(
        &self,
        thread_id: &str,
        request: &SubmitRequest,
    ) -> Result<StreamTokenResponse, ClientError> {
        let body = StreamTokenRequest::new(&self.config.assistant_id, thread_id, request);
        let response = self
            .http
            .post(&self.config.token_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let message = error_body_message(response).await;
            return Err(ClientError::RateLimited {
                message,
                retry_after_secs,
            });
        }
        if !status.is_success() {
            let message = error_body_message(response).await;
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Open the SSE stream and yield decoded events.
    ///
    /// Frames that fail to decode are logged and skipped; only transport
    /// errors terminate the stream early. A partial final line is flushed
    /// as a frame when the connection closes.
    pub async fn open_stream(
        &self,
        stream_url: &str,
        token: &str,
    ) -> Result<impl Stream<Item = Result<StreamEnvelope, ClientError>>, ClientError> {
        let response = self
            .http
            .get(stream_url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_body_message(response).await;
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        struct ReadState<B> {
            bytes: B,
            parser: FrameParser,
            ready: std::collections::VecDeque<Frame>,
            /// Trailing bytes of an incomplete UTF-8 sequence from the
            /// previous transport chunk
            pending: BytesMut,
            done: bool,
        }

        let state = ReadState {
            bytes: response.bytes_stream(),
            parser: FrameParser::new(),
            ready: std::collections::VecDeque::new(),
            pending: BytesMut::new(),
            done: false,
        };

        let envelopes = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(frame) = state.ready.pop_front() {
                    match decode_frame(&frame) {
                        Ok(Some(event)) => {
                            return Some((Ok(StreamEnvelope { raw: frame, event }), state));
                        }
                        Ok(None) => {
                            debug!(kind = frame.kind.label(), "skipping uninteresting frame");
                            continue;
                        }
                        Err(e) => {
                            warn!(error = %e, "skipping undecodable frame");
                            continue;
                        }
                    }
                }
                if state.done {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend_from_slice(&chunk);
                        let text = drain_utf8(&mut state.pending);
                        state.ready.extend(state.parser.feed_chunk(&text));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(ClientError::Stream(e.to_string())), state));
                    }
                    None => {
                        state.done = true;
                        if !state.pending.is_empty() {
                            // connection closed mid-character
                            let text = String::from_utf8_lossy(&state.pending).into_owned();
                            state.pending.clear();
                            state.ready.extend(state.parser.feed_chunk(&text));
                        }
                        if let Some(frame) = state.parser.finish() {
                            state.ready.push_back(frame);
                        }
                    }
                }
            }
        });

        Ok(envelopes)
    }

    /// Interrupt a running migration.
    ///
    /// Distinguishes "we stopped it" from "it was already gone" so callers
    /// can decide whether silence is appropriate.
    pub async fn cancel_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<CancelStatus, ClientError> {
        let url = format!(
            "{}/threads/{}/runs/{}/cancel?action=interrupt",
            self.config.agent_base_url, thread_id, run_id
        );
        let response = self.http.post(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_body_message(response).await;
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let outcome = match body.get("status").and_then(Value::as_str) {
            Some("not_found") => CancelStatus::NotFound,
            _ => CancelStatus::Cancelled,
        };
        Ok(outcome)
    }

    pub fn config(&self) -> &SplicerConfig {
        &self.config
    }
}

/// Decode as much complete UTF-8 as the buffer holds.
///
/// Transport chunk boundaries do not respect character boundaries, so a
/// multi-byte sequence may arrive split across chunks. An incomplete
/// trailing sequence stays in the buffer until the next chunk completes
/// it; genuinely invalid bytes are replaced and skipped.
fn drain_utf8(pending: &mut BytesMut) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                out.push_str(text);
                pending.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(std::str::from_utf8(&pending[..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        let _ = pending.split_to(valid + len);
                    }
                    None => {
                        let _ = pending.split_to(valid);
                        return out;
                    }
                }
            }
        }
    }
}

/// Pull a human-readable message out of an error response body, falling
/// back to the raw text.
async fn error_body_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        for key in ["error", "message", "detail"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    if text.is_empty() {
        "request failed".to_string()
    } else {
        text
    }
}
