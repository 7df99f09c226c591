//! Bluetooth Module
//!
//! Remote control of the robot over a BLE GATT link.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   RobotRemoteService                     │
//! │   (event pump: BLE completions, commands, 100 ms tick)   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Controller                          │
//! │     (adapter, discovery, connection, unified state)      │
//! └──────┬───────────────────────┬──────────────────────────┘
//!        │                       │
//!        ▼                       ▼
//! ┌────────────┐          ┌──────────────┐     ┌──────────┐
//! │  Scanner   │          │ RobotSession │────▶│ Protocol │
//! │            │          │              │     │          │
//! │ - dedupe   │          │ - GATT setup │     │ - UUIDs  │
//! │ - name     │          │ - retransmit │     │ - message│
//! │   filter   │          │ - sounds     │     │ - actions│
//! └────────────┘          └──────────────┘     └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs, control message layout, action encoding, notification parsing
//! - [`transport`] - Traits the platform BLE stack implements, and its events
//! - [`scanner`] - Discovery filtering
//! - [`session`] - Per-connection robot session
//! - [`connection`] - Connection lifecycle controller
//! - [`service`] - Main service coordinator

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

// Re-export main types for convenience
pub use connection::Controller;
pub use service::{RobotCommand, RobotRemoteService};
pub use session::RobotSession;
pub use transport::{BluetoothBackend, BluetoothEvent, GattCentral};
