use crate::error::Error;
use crate::infrastructure::bluetooth::protocol::ControlMessage;
use std::fmt;

/// Bluetooth device address, packed into the low 48 bits
pub type DeviceAddress = u64;

/// Formats a packed address as `AA:BB:CC:DD:EE:FF`
pub fn format_address(address: DeviceAddress) -> String {
    let bytes = address.to_be_bytes();
    bytes[2..]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// A device reported by low energy discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub address: DeviceAddress,
}

/// Power state of the local Bluetooth adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    PoweredOff,
    Connectable,
    Discoverable,
}

/// Lifecycle of the robot session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DisconnectedState",
            Self::Connecting => "ConnectingState",
            Self::Connected => "ConnectedState",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified state of the connection controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Uninitialized,
    DeviceDiscovery,
    ServiceDiscovery,
    Connecting,
    Connected,
    Error,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "UninitializedState",
            Self::DeviceDiscovery => "DeviceDiscoveryState",
            Self::ServiceDiscovery => "ServiceDiscoveryState",
            Self::Connecting => "ConnectingState",
            Self::Connected => "ConnectedState",
            Self::Error => "ErrorState",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable changes published to the application
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    SessionStateChanged {
        new: SessionState,
        old: SessionState,
    },
    ControllerStateChanged {
        new: ControllerState,
        old: ControllerState,
    },
    MessageChanged(ControlMessage),
    SoundChanged(i32),
    ErrorOccurred(Error),
}
