mod client;
pub mod sse;

pub use client::{accumulate_stream, parse_completion, GatewayClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::config::AppConfig;
use crate::core::error::GatewayError;
use crate::core::message::HistoryEntry;

/// Opaque status payload reported by the gateway, kept for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatus(pub serde_json::Value);

impl GatewayStatus {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    pub fn host_platform(&self) -> Option<String> {
        display_value(&self.0["host"]["platform"])
    }

    pub fn port(&self) -> Option<String> {
        display_value(&self.0["gateway"]["port"])
    }

    pub fn version(&self) -> Option<String> {
        display_value(&self.0["version"])
    }
}

fn display_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send the whole history and return the assistant's reply.
    ///
    /// With `on_chunk` the reply is streamed and the callback receives the
    /// full text received so far after each delta. A fired `cancel` token
    /// fails the call with [`GatewayError::Cancelled`].
    async fn send_message(
        &self,
        history: &[HistoryEntry],
        on_chunk: Option<&mut (dyn for<'s> FnMut(&'s str) + Send)>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, GatewayError>;

    async fn fetch_status(&self) -> Result<GatewayStatus, GatewayError>;
}

pub fn create_gateway(config: &AppConfig) -> Arc<dyn Gateway> {
    if !config.has_api_token() {
        tracing::warn!("no API token configured; gateway calls are unauthenticated");
    }
    Arc::new(GatewayClient::new(config))
}
