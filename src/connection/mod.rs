//! Bus connection management
//!
//! This module handles:
//! - Broker sessions with bounded fixed-delay reconnection
//! - Re-subscription after every connect
//! - Decoding inbound payloads into connection events
//! - Session state for local health introspection

mod manager;

pub use manager::{
    BusPublisher, ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState,
};
