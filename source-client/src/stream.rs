use crate::http::{check_status, map_request_error};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use keywatch_core::{CollectedVia, CoreError, RawRecord, SourceApiError, SourceConfig};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// One decoded frame from the push stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// Carries post content; goes onto the raw-message queue.
    Record(RawRecord),
    /// The source is closing this stream.
    Disconnect(String),
    Hangup(String),
    /// Keep-alive stall warning; ignored.
    Timeout,
    /// Informational non-post event.
    Info(Value),
}

#[async_trait]
pub trait StreamSource: Send + Sync {
    type Session: StreamSession;

    /// Open one streaming session filtered on the given track terms.
    async fn open(&self, tracks: &[String]) -> Result<Self::Session, CoreError>;
}

#[async_trait]
pub trait StreamSession: Send {
    /// The next decoded message, or `None` once the source closed the
    /// stream cleanly.
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, CoreError>;
}

/// Classify one newline-delimited JSON frame.
pub fn decode_frame(line: &str) -> Result<StreamMessage, SourceApiError> {
    let value: Value = serde_json::from_str(line).map_err(|e| SourceApiError::MalformedFrame {
        details: e.to_string(),
    })?;

    if let Some(disconnect) = value.get("disconnect") {
        return Ok(StreamMessage::Disconnect(disconnect.to_string()));
    }
    if let Some(hangup) = value.get("hangup") {
        return Ok(StreamMessage::Hangup(hangup.to_string()));
    }
    if value.get("timeout").is_some() {
        return Ok(StreamMessage::Timeout);
    }
    if value.get("text").is_some() {
        return Ok(StreamMessage::Record(RawRecord {
            payload: value,
            collected_via: CollectedVia::Stream,
        }));
    }
    Ok(StreamMessage::Info(value))
}

pub struct HttpStreamSource {
    client: reqwest::Client,
    stream_url: String,
    bearer_token: String,
}

impl HttpStreamSource {
    pub fn new(config: &SourceConfig) -> Result<Self, CoreError> {
        // No overall request timeout: a healthy session is expected to
        // stay open for hours. Connect failures surface quickly anyway.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            client,
            stream_url: config.stream_url.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    type Session = HttpStreamSession;

    async fn open(&self, tracks: &[String]) -> Result<Self::Session, CoreError> {
        let track = tracks.join(",");
        debug!("Opening stream session for track: {}", track);

        let response = self
            .client
            .get(&self.stream_url)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("track", track.as_str()),
                ("filter_level", "none"),
                ("stall_warnings", "true"),
            ])
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response)?;

        Ok(HttpStreamSession {
            stream: Box::pin(response.bytes_stream()),
            buffer: Vec::new(),
        })
    }
}

pub struct HttpStreamSession {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
}

impl HttpStreamSession {
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[async_trait]
impl StreamSession for HttpStreamSession {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, CoreError> {
        loop {
            if let Some(line) = self.take_line() {
                if line.trim().is_empty() {
                    // Bare newlines are keep-alives.
                    continue;
                }
                return Ok(Some(decode_frame(&line)?));
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(map_request_error(e)),
                None => return Ok(None),
            }
        }
    }
}
