//! # hybridflow-channels
//!
//! Transport integrations with the Evolution WhatsApp gateway: the HTTP
//! client for outbound operations and the Socket.IO push channel for
//! inbound events.

pub mod evolution;
pub mod socket;

pub use evolution::EvolutionClient;
pub use socket::{SocketEvent, SocketRegistry};
