//! # hybridflow-core
//!
//! Core types, traits, configuration, and error handling for HybridFlow.

pub mod collision;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod outcome;
pub mod tenant;
pub mod traits;

pub use config::shellexpand;
