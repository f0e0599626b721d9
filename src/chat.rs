//! The send flow shared by the terminal UI and one-shot mode.

use tokio_util::sync::CancellationToken;

use crate::core::error::GatewayError;
use crate::core::message::{HistoryEntry, Message};
use crate::gateway::Gateway;
use crate::store::ConversationStore;

/// Start a turn. Returns the history to send, or `None` when the input is
/// blank or another send is still in flight.
pub fn begin_turn(store: &mut ConversationStore, input: &str) -> Option<Vec<HistoryEntry>> {
    let content = input.trim();
    if content.is_empty() || store.is_loading() {
        return None;
    }

    store.append_message(Message::new_user(content));
    store.set_loading(true);
    store.set_streaming_buffer("");
    Some(store.history())
}

pub fn apply_chunk(store: &mut ConversationStore, text: &str) {
    store.set_streaming_buffer(text);
}

/// Close a turn: the reply (or a visible error) becomes part of the log.
/// A cancelled turn leaves no assistant message behind.
pub fn finish_turn(store: &mut ConversationStore, result: &Result<String, GatewayError>) {
    match result {
        Ok(text) => store.append_message(Message::new_assistant(text.as_str())),
        Err(GatewayError::Cancelled) => {
            tracing::info!("turn cancelled");
        }
        Err(e) => {
            tracing::warn!(error = %e, "turn failed");
            store.append_message(Message::new_assistant(error_reply(e)));
        }
    }
    store.set_streaming_buffer("");
    store.set_loading(false);
}

pub fn error_reply(error: &GatewayError) -> String {
    format!("**Error**: Failed to generate response ({error}).")
}

/// Run a whole turn in place. `on_update` sees every cumulative chunk after
/// it has been applied to the store.
pub async fn run_turn(
    store: &mut ConversationStore,
    gateway: &dyn Gateway,
    input: &str,
    stream: bool,
    on_update: &mut (dyn for<'s> FnMut(&'s str) + Send),
    cancel: Option<&CancellationToken>,
) -> Option<Result<String, GatewayError>> {
    let history = begin_turn(store, input)?;

    let result = if stream {
        let mut on_chunk = |text: &str| {
            apply_chunk(store, text);
            on_update(text);
        };
        gateway.send_message(&history, Some(&mut on_chunk), cancel).await
    } else {
        gateway.send_message(&history, None, cancel).await
    };

    finish_turn(store, &result);
    Some(result)
}
