//! Ingestion adapters. Each one turns its transport's payload into an
//! [`Envelope`](hybridflow_core::event::Envelope) and hands it to
//! `Gateway::handle_inbound_event`; neither holds any pipeline logic.

pub mod socket;
pub mod webhook;

use thiserror::Error;

/// Transport framing failures. These are the only rejections a well-formed
/// gateway ever sees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("empty request body")]
    EmptyBody,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid webhook signature")]
    InvalidSignature,
}
