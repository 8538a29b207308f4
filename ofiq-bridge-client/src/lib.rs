//! # ofiq-bridge-client
//!
//! Client library for the OFIQ quality-assessment engine.
//!
//! This crate provides:
//! - Async request/reply session over ZeroMQ with liveness probing
//! - Installation lookup and on-demand engine launch
//! - High-level API for ping, image assessment and shutdown
//! - YAML/environment configuration

pub mod client;
pub mod config;
pub mod error;
pub mod image_id;
pub mod session;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use image_id::ImageIdCounter;
pub use session::{Session, SessionState};
pub use supervisor::{EngineLauncher, Installation, Launcher, MARKER_FILE};
pub use transport::{Channel, Connector, ZmqChannel, ZmqConnector};
