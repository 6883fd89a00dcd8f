//! Socket.IO push channel.
//!
//! A `SocketRegistry` owns every live connection by name: `global` for the
//! server-wide connection, or the instance name in per-instance mode.
//! Received events are forwarded on a single mpsc channel; the registry
//! itself knows nothing about what the events mean.

mod connection;
pub mod engineio;

#[cfg(test)]
mod tests;

use connection::{ConnectionParams, ConnectionState};
use hybridflow_core::{config::SocketConfig, error::HybridflowError};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Connection name used in global mode.
pub const GLOBAL_CONNECTION: &str = "global";

const EVENT_BUFFER: usize = 256;

/// An event received on a socket connection.
#[derive(Debug, Clone)]
pub struct SocketEvent {
    /// Registry name of the connection that received it.
    pub connection: String,
    /// Instance bound to the connection, in per-instance mode.
    pub instance: Option<String>,
    pub event: String,
    pub data: Value,
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SocketTarget {
    pub name: String,
    pub server_url: String,
    pub api_key: String,
    pub namespace: String,
    pub instance: Option<String>,
}

impl SocketTarget {
    pub fn global(server_url: &str, api_key: &str) -> Self {
        Self {
            name: GLOBAL_CONNECTION.to_string(),
            server_url: server_url.to_string(),
            api_key: api_key.to_string(),
            namespace: "/".to_string(),
            instance: None,
        }
    }

    pub fn instance(instance: &str, server_url: &str, api_key: &str) -> Self {
        Self {
            name: instance.to_string(),
            server_url: server_url.to_string(),
            api_key: api_key.to_string(),
            namespace: format!("/{instance}"),
            instance: Some(instance.to_string()),
        }
    }
}

/// Snapshot of one connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub name: String,
    pub server_url: String,
    pub namespace: String,
    pub instance: Option<String>,
    pub connected: bool,
    pub events_received: u64,
    pub reconnects: u64,
    pub last_error: Option<String>,
}

struct ConnectionHandle {
    target: SocketTarget,
    state: Arc<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    async fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            name: self.target.name.clone(),
            server_url: self.target.server_url.clone(),
            namespace: self.target.namespace.clone(),
            instance: self.target.instance.clone(),
            connected: self.state.connected.load(Ordering::SeqCst),
            events_received: self.state.events_received.load(Ordering::SeqCst),
            reconnects: self.state.reconnects.load(Ordering::SeqCst),
            last_error: self.state.last_error.lock().await.clone(),
        }
    }

    /// Ask the task to disconnect; abort it if it does not finish promptly.
    fn stop(self) {
        let _ = self.shutdown.send(true);
        let mut task = self.task;
        tokio::spawn(async move {
            if tokio::time::timeout(Duration::from_secs(5), &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        });
    }
}

/// Named set of live socket connections.
pub struct SocketRegistry {
    config: SocketConfig,
    events: mpsc::Sender<SocketEvent>,
    connections: Mutex<HashMap<String, ConnectionHandle>>,
}

impl SocketRegistry {
    /// Create a registry and the receiver its connections forward events to.
    pub fn new(config: SocketConfig) -> (Self, mpsc::Receiver<SocketEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let registry = Self {
            config,
            events: tx,
            connections: Mutex::new(HashMap::new()),
        };
        (registry, rx)
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub async fn connect_global(
        &self,
        server_url: &str,
        api_key: &str,
    ) -> Result<ConnectionStatus, HybridflowError> {
        self.connect(SocketTarget::global(server_url, api_key)).await
    }

    pub async fn connect_instance(
        &self,
        instance: &str,
        server_url: &str,
        api_key: &str,
    ) -> Result<ConnectionStatus, HybridflowError> {
        self.connect(SocketTarget::instance(instance, server_url, api_key))
            .await
    }

    /// Connect `target`, reusing a live connection of the same name.
    ///
    /// Waits for the first namespace connect. A failed first attempt is
    /// reported as an error and leaves nothing registered.
    pub async fn connect(&self, target: SocketTarget) -> Result<ConnectionStatus, HybridflowError> {
        if target.server_url.is_empty() {
            return Err(HybridflowError::Config(format!(
                "socket {}: no server url",
                target.name
            )));
        }

        let name = target.name.clone();
        let ready = {
            let mut connections = self.connections.lock().await;
            if let Some(existing) = connections.get(&name) {
                if existing.state.connected.load(Ordering::SeqCst) {
                    return Ok(existing.status().await);
                }
            }
            if let Some(stale) = connections.remove(&name) {
                stale.stop();
            }

            let state = Arc::new(ConnectionState::default());
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let (ready_tx, ready_rx) = oneshot::channel();
            let params = ConnectionParams {
                target: target.clone(),
                reconnect_delay: Duration::from_secs(self.config.reconnect_delay_secs.max(1)),
                reconnect_max: Duration::from_secs(self.config.reconnect_max_secs.max(1)),
                connect_timeout: Duration::from_secs(self.config.connect_timeout_secs.max(1)),
            };
            let task = tokio::spawn(connection::run(
                params,
                Arc::clone(&state),
                self.events.clone(),
                shutdown_rx,
                ready_tx,
            ));
            connections.insert(
                name.clone(),
                ConnectionHandle {
                    target,
                    state,
                    shutdown: shutdown_tx,
                    task,
                },
            );
            ready_rx
        };

        // Handshake is bounded by three connect timeouts (tcp, open, namespace).
        let wait = Duration::from_secs(self.config.connect_timeout_secs.max(1) * 3 + 1);
        let outcome = match tokio::time::timeout(wait, ready).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err("connection task ended".to_string()),
            Err(_) => Err("timed out waiting for connect".to_string()),
        };

        match outcome {
            Ok(()) => {
                let connections = self.connections.lock().await;
                match connections.get(&name) {
                    Some(handle) => Ok(handle.status().await),
                    None => Err(HybridflowError::Gateway(format!(
                        "socket {name}: disconnected during connect"
                    ))),
                }
            }
            Err(e) => {
                if let Some(handle) = self.connections.lock().await.remove(&name) {
                    handle.stop();
                }
                warn!("socket {name}: connect failed: {e}");
                Err(HybridflowError::Gateway(format!("socket {name}: {e}")))
            }
        }
    }

    /// Disconnect one connection. Others are unaffected.
    pub async fn disconnect(&self, name: &str) -> bool {
        match self.connections.lock().await.remove(name) {
            Some(handle) => {
                handle.stop();
                info!("socket {name}: disconnect requested");
                true
            }
            None => false,
        }
    }

    /// Disconnect everything. Returns how many connections were stopped.
    pub async fn disconnect_all(&self) -> usize {
        let drained: Vec<ConnectionHandle> = self
            .connections
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let count = drained.len();
        for handle in drained {
            handle.stop();
        }
        count
    }

    /// Status of every registered connection, sorted by name.
    pub async fn status(&self) -> Vec<ConnectionStatus> {
        let connections = self.connections.lock().await;
        let mut statuses = Vec::with_capacity(connections.len());
        for handle in connections.values() {
            statuses.push(handle.status().await);
        }
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub async fn is_connected(&self, name: &str) -> bool {
        self.connections
            .lock()
            .await
            .get(name)
            .is_some_and(|h| h.state.connected.load(Ordering::SeqCst))
    }
}
