//! One Socket.IO connection: handshake, heartbeat, event forwarding, and
//! reconnect with exponential backoff.

use super::engineio::{self, Packet, SocketPacket};
use super::{SocketEvent, SocketTarget};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

/// Liveness counters shared between a connection task and the registry.
#[derive(Default)]
pub(crate) struct ConnectionState {
    pub connected: AtomicBool,
    pub events_received: AtomicU64,
    pub reconnects: AtomicU64,
    pub last_error: Mutex<Option<String>>,
}

pub(crate) struct ConnectionParams {
    pub target: SocketTarget,
    pub reconnect_delay: Duration,
    pub reconnect_max: Duration,
    pub connect_timeout: Duration,
}

enum SessionEnd {
    /// Server closed the connection or the namespace.
    Closed,
    /// Local disconnect requested, or nobody is listening for events.
    Shutdown,
}

/// Run a connection until shutdown.
///
/// `ready` resolves once: `Ok` after the first namespace connect, or `Err`
/// if the first attempt fails, in which case the task exits without retrying.
pub(crate) async fn run(
    params: ConnectionParams,
    state: Arc<ConnectionState>,
    events: mpsc::Sender<SocketEvent>,
    mut shutdown: watch::Receiver<bool>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let name = params.target.name.clone();
    let mut ready = Some(ready);
    let mut backoff = params.reconnect_delay;

    loop {
        let (was_connected, result) =
            session(&params, &state, &events, shutdown.clone(), &mut ready).await;
        state.connected.store(false, Ordering::SeqCst);

        match result {
            Ok(SessionEnd::Shutdown) => {
                info!("socket {name}: disconnected");
                return;
            }
            Ok(SessionEnd::Closed) => info!("socket {name}: closed by server"),
            Err(e) => {
                warn!("socket {name}: {e}");
                *state.last_error.lock().await = Some(e.clone());
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }

        if was_connected {
            backoff = params.reconnect_delay;
        }
        if *shutdown.borrow() {
            return;
        }

        info!("socket {name}: reconnecting in {}s", backoff.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.changed() => return,
        }
        backoff = (backoff * 2).min(params.reconnect_max);
        state.reconnects.fetch_add(1, Ordering::SeqCst);
    }
}

fn build_request(
    target: &SocketTarget,
) -> Result<tungstenite::handshake::client::Request, String> {
    let mut request = engineio::websocket_url(&target.server_url)
        .into_client_request()
        .map_err(|e| format!("invalid socket url: {e}"))?;
    if !target.api_key.is_empty() {
        let value = HeaderValue::from_str(&target.api_key)
            .map_err(|e| format!("invalid api key header: {e}"))?;
        request.headers_mut().insert("apikey", value);
    }
    Ok(request)
}

/// Next Engine.IO packet. `Ok(None)` when the socket closed.
async fn next_packet<S>(source: &mut S) -> Result<Option<Packet>, String>
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    loop {
        match source.next().await {
            None => return Ok(None),
            Some(Err(e)) => return Err(format!("read failed: {e}")),
            Some(Ok(WsMessage::Text(text))) => match Packet::decode(&text) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => warn!("socket: dropping undecodable frame: {e}"),
            },
            Some(Ok(WsMessage::Close(_))) => return Ok(None),
            Some(Ok(_)) => {}
        }
    }
}

async fn send_text<Si>(sink: &mut Si, frame: String) -> Result<(), String>
where
    Si: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    sink.send(WsMessage::Text(frame))
        .await
        .map_err(|e| format!("write failed: {e}"))
}

/// Wait for the namespace connect ack, answering pings meanwhile.
async fn await_namespace<Si, S>(sink: &mut Si, source: &mut S, namespace: &str) -> Result<(), String>
where
    Si: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    loop {
        match next_packet(source).await? {
            Some(Packet::Ping) => send_text(sink, engineio::encode_pong()).await?,
            Some(Packet::Message(SocketPacket::Connect { namespace: ns, .. })) if ns == namespace => {
                return Ok(());
            }
            Some(Packet::Message(SocketPacket::ConnectError { namespace: ns, data }))
                if ns == namespace =>
            {
                return Err(format!("namespace {ns} rejected: {data}"));
            }
            Some(Packet::Close) | None => return Err("closed during connect".to_string()),
            Some(_) => {}
        }
    }
}

async fn session(
    params: &ConnectionParams,
    state: &ConnectionState,
    events: &mpsc::Sender<SocketEvent>,
    mut shutdown: watch::Receiver<bool>,
    ready: &mut Option<oneshot::Sender<Result<(), String>>>,
) -> (bool, Result<SessionEnd, String>) {
    let target = &params.target;
    let namespace = target.namespace.as_str();

    let request = match build_request(target) {
        Ok(r) => r,
        Err(e) => return (false, Err(e)),
    };

    let stream = match timeout(params.connect_timeout, connect_async(request)).await {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => return (false, Err(format!("connect failed: {e}"))),
        Err(_) => return (false, Err("connect timed out".into())),
    };
    let (mut sink, mut source) = stream.split();

    // Engine.IO open, then Socket.IO namespace connect.
    let handshake = match timeout(params.connect_timeout, next_packet(&mut source)).await {
        Ok(Ok(Some(Packet::Open(h)))) => h,
        Ok(Ok(other)) => return (false, Err(format!("expected open packet, got {other:?}"))),
        Ok(Err(e)) => return (false, Err(e)),
        Err(_) => return (false, Err("handshake timed out".into())),
    };
    debug!("socket {}: engine.io sid={}", target.name, handshake.sid);

    if let Err(e) = send_text(&mut sink, engineio::encode_connect(namespace, None)).await {
        return (false, Err(e));
    }

    let connected = timeout(
        params.connect_timeout,
        await_namespace(&mut sink, &mut source, namespace),
    )
    .await;
    match connected {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return (false, Err(e)),
        Err(_) => return (false, Err("namespace connect timed out".into())),
    }

    state.connected.store(true, Ordering::SeqCst);
    *state.last_error.lock().await = None;
    if let Some(tx) = ready.take() {
        let _ = tx.send(Ok(()));
    }
    info!(
        "socket {}: connected to {} namespace {namespace}",
        target.name, target.server_url
    );

    // Server pings every `ping_interval`; silence past interval + timeout is a dead link.
    let idle = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = send_text(&mut sink, engineio::encode_disconnect(namespace)).await;
                let _ = sink.close().await;
                return (true, Ok(SessionEnd::Shutdown));
            }
            next = timeout(idle, next_packet(&mut source)) => {
                let packet = match next {
                    Err(_) => return (true, Err("ping timeout".into())),
                    Ok(Err(e)) => return (true, Err(e)),
                    Ok(Ok(None)) | Ok(Ok(Some(Packet::Close))) => return (true, Ok(SessionEnd::Closed)),
                    Ok(Ok(Some(p))) => p,
                };
                match packet {
                    Packet::Ping => {
                        if let Err(e) = send_text(&mut sink, engineio::encode_pong()).await {
                            return (true, Err(e));
                        }
                    }
                    Packet::Message(SocketPacket::Event { namespace: ns, ack_id, name, data })
                        if ns == namespace =>
                    {
                        if let Some(id) = ack_id {
                            let _ = send_text(&mut sink, engineio::encode_ack(namespace, id)).await;
                        }
                        state.events_received.fetch_add(1, Ordering::SeqCst);
                        let event = SocketEvent {
                            connection: target.name.clone(),
                            instance: target.instance.clone(),
                            event: name,
                            data,
                        };
                        if events.send(event).await.is_err() {
                            return (true, Ok(SessionEnd::Shutdown));
                        }
                    }
                    Packet::Message(SocketPacket::Disconnect { namespace: ns }) if ns == namespace => {
                        return (true, Ok(SessionEnd::Closed));
                    }
                    _ => {}
                }
            }
        }
    }
}
