//! EvoBot Remote
//!
//! Remote control core for the "Evolution-Robot" toy over a Bluetooth LE
//! GATT link: control message encoding, write retransmission, sound
//! notification tracking, and the connection lifecycle around them.
//!
//! The concrete BLE stack is supplied by the embedding application through
//! the [`BluetoothBackend`] and [`GattCentral`] traits; its completions are
//! fed back as [`BluetoothEvent`]s.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{AppEvent, ControllerState, SessionState};
pub use error::{Error, Result};
pub use infrastructure::bluetooth::{
    BluetoothBackend, BluetoothEvent, Controller, GattCentral, RobotCommand, RobotRemoteService,
    RobotSession,
};
