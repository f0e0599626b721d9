use async_trait::async_trait;
use futures_core::Stream;
use reqwest::Client;
use std::collections::BTreeMap;
use std::fmt::Display;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::sse::{parse_record, LineDecoder, StreamRecord};
use super::{Gateway, GatewayStatus};
use crate::core::config::AppConfig;
use crate::core::error::GatewayError;
use crate::core::message::HistoryEntry;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const STATUS_PATH: &str = "/gateway/call";

/// HTTP client for an OpenAI-compatible chat-completion gateway.
pub struct GatewayClient {
    client: Client,
    completions_url: String,
    status_url: String,
    api_token: Option<String>,
    model: String,
    headers: BTreeMap<String, String>,
}

impl GatewayClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            completions_url: config.endpoint(COMPLETIONS_PATH),
            status_url: config.endpoint(STATUS_PATH),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            model: config.model.clone(),
            headers: config.headers.clone(),
        }
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url);
        if let Some(token) = &self.api_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req
    }

    async fn completion_request(
        &self,
        history: &[HistoryEntry],
        stream: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<reqwest::Response, GatewayError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": history,
            "stream": stream,
        });

        tracing::debug!(messages = history.len(), stream, "sending completion request");

        let send = self.post(&self.completions_url).json(&body).send();
        let resp = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(GatewayError::Cancelled),
            resp = send => resp?,
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "gateway returned an error status");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn send_message(
        &self,
        history: &[HistoryEntry],
        on_chunk: Option<&mut (dyn for<'s> FnMut(&'s str) + Send)>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, GatewayError> {
        match on_chunk {
            Some(on_chunk) => {
                let resp = self.completion_request(history, true, cancel).await?;
                accumulate_stream(resp.bytes_stream(), on_chunk, cancel).await
            }
            None => {
                let resp = self.completion_request(history, false, cancel).await?;
                let json: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| GatewayError::Decode(e.to_string()))?;
                Ok(parse_completion(&json))
            }
        }
    }

    async fn fetch_status(&self) -> Result<GatewayStatus, GatewayError> {
        let resp = self
            .post(&self.status_url)
            .json(&serde_json::json!({ "method": "status" }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        parse_status(json)
    }
}

/// Text of the first choice of a non-streaming completion.
pub fn parse_completion(json: &serde_json::Value) -> String {
    json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn parse_status(json: serde_json::Value) -> Result<GatewayStatus, GatewayError> {
    if json["ok"].as_bool() != Some(true) {
        let reason = json["error"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| json["error"].to_string());
        return Err(GatewayError::Api(reason));
    }
    Ok(GatewayStatus::new(json["payload"].clone()))
}

/// Read a streamed completion body, calling `on_chunk` with the full text
/// accumulated so far after every non-empty delta.
pub async fn accumulate_stream<S, B, E>(
    byte_stream: S,
    on_chunk: &mut (dyn for<'s> FnMut(&'s str) + Send),
    cancel: Option<&CancellationToken>,
) -> Result<String, GatewayError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut byte_stream = Box::pin(byte_stream);
    let mut decoder = LineDecoder::new();
    let mut full_content = String::new();

    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(GatewayError::Cancelled);
        }

        let next = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(GatewayError::Cancelled),
            next = byte_stream.next() => next,
        };

        let (lines, at_end) = match next {
            Some(Ok(chunk)) => (decoder.push(chunk.as_ref()), false),
            Some(Err(e)) => return Err(GatewayError::Http(e.to_string())),
            None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
        };

        for line in &lines {
            match parse_record(line) {
                Some(StreamRecord::Delta(text)) if !text.is_empty() => {
                    full_content.push_str(&text);
                    on_chunk(&full_content);
                }
                Some(StreamRecord::Done) => {
                    tracing::debug!(chars = full_content.len(), "stream finished");
                    return Ok(full_content);
                }
                _ => {}
            }
        }

        if at_end {
            break;
        }
    }

    Ok(full_content)
}

async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
