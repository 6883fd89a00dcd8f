//! Socket adapter: wraps push events into envelopes and feeds the pipeline.
//!
//! The socket channel is trusted by virtue of the outbound, credentialed
//! connection it arrives on; no signature check applies.

use crate::gateway::Gateway;
use hybridflow_channels::SocketEvent;
use hybridflow_core::{
    error::HybridflowError,
    event::{Envelope, IngestChannel},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Normalize a socket event.
///
/// Payloads already shaped `{event?, instance?, data}` are unwrapped; flat
/// payloads become the `data` themselves. The instance comes from the
/// payload, else from the connection it arrived on. `None` when neither
/// names one.
pub fn normalize(event: SocketEvent) -> Option<Envelope> {
    let SocketEvent {
        instance: bound_instance,
        event: name,
        mut data,
        ..
    } = event;

    let instance = data
        .get("instance")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or(bound_instance)?;

    let wrapped = data.as_object().is_some_and(|o| o.contains_key("data"));
    if wrapped {
        let name = data
            .get("event")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or(name);
        let inner = data.get_mut("data").map(Value::take).unwrap_or(Value::Null);
        return Some(Envelope::new(&name, instance, inner));
    }

    Some(Envelope::new(&name, instance, data))
}

/// Consume socket events until every sender is gone. Each event runs as its
/// own task so a slow reply never blocks the connection.
pub fn run_socket_adapter(
    mut events: mpsc::Receiver<SocketEvent>,
    gateway: Arc<Gateway>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let connection = event.connection.clone();
            let Some(envelope) = normalize(event) else {
                warn!("socket {connection}: event without instance dropped");
                continue;
            };
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                let kind = envelope.kind.clone();
                match gateway
                    .handle_inbound_event(envelope, IngestChannel::Socket)
                    .await
                {
                    Ok(outcome) => debug!("socket {connection}: {kind} -> {}", outcome.action()),
                    Err(HybridflowError::UnknownInstance(i)) => {
                        warn!("socket {connection}: unknown instance {i}")
                    }
                    Err(e) => warn!("socket {connection}: {kind} failed: {e}"),
                }
            });
        }
        info!("socket adapter stopped");
    })
}
