//! BLE Transport Abstraction
//!
//! The platform Bluetooth stack is supplied by the application. It issues
//! requests synchronously through [`BluetoothBackend`] and [`GattCentral`]
//! and reports every completion later as a [`BluetoothEvent`].

use crate::domain::models::{DeviceInfo, HostMode};
use uuid::Uuid;

/// Synchronous failure of a transport request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("operation rejected: {0}")]
    Rejected(String),
}

/// Discovery progress of a GATT service object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    InvalidService,
    DiscoveryRequired,
    DiscoveringServices,
    ServiceDiscovered,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidService => "InvalidService",
            Self::DiscoveryRequired => "DiscoveryRequired",
            Self::DiscoveringServices => "DiscoveringServices",
            Self::ServiceDiscovered => "ServiceDiscovered",
        }
    }
}

/// A service object created on a connected central
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(Uuid);

impl ServiceHandle {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

/// A resolved characteristic together with its last known value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub service: Uuid,
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// A resolved descriptor of a characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub characteristic: Uuid,
    pub uuid: Uuid,
}

/// GATT client connection to one remote device
pub trait GattCentral {
    fn remote_name(&self) -> String;

    fn remote_address(&self) -> u64;

    /// Start the physical connection; completion arrives as
    /// [`BluetoothEvent::DeviceConnected`] or [`BluetoothEvent::DeviceError`]
    fn connect_to_device(&mut self) -> Result<(), TransportError>;

    /// Completion arrives as [`BluetoothEvent::ServiceDiscoveryFinished`]
    fn discover_services(&mut self) -> Result<(), TransportError>;

    fn disconnect_from_device(&mut self);

    /// Create a service object, `None` if the remote does not offer it
    fn create_service(&mut self, service: Uuid) -> Option<ServiceHandle>;

    fn service_state(&self, service: ServiceHandle) -> ServiceState;

    /// Completion arrives as [`BluetoothEvent::ServiceStateChanged`]
    fn discover_details(&mut self, service: ServiceHandle) -> Result<(), TransportError>;

    fn characteristic(&self, service: ServiceHandle, uuid: Uuid) -> Option<Characteristic>;

    fn descriptor(&self, characteristic: &Characteristic, uuid: Uuid) -> Option<Descriptor>;

    /// Completion arrives as [`BluetoothEvent::CharacteristicWritten`]
    fn write_characteristic(
        &mut self,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError>;

    fn write_descriptor(&mut self, descriptor: &Descriptor, value: &[u8])
        -> Result<(), TransportError>;
}

/// Local adapter and device discovery
pub trait BluetoothBackend {
    type Central: GattCentral;

    fn is_adapter_valid(&self) -> bool;

    fn host_mode(&self) -> HostMode;

    /// Completion arrives as [`BluetoothEvent::HostModeChanged`]
    fn power_on(&mut self);

    /// Start low energy discovery
    fn start_discovery(&mut self) -> Result<(), TransportError>;

    fn stop_discovery(&mut self);

    fn is_discovery_active(&self) -> bool;

    fn create_central(&mut self, device: &DeviceInfo) -> Self::Central;
}

/// Asynchronous completions delivered by the platform stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BluetoothEvent {
    HostModeChanged(HostMode),
    DeviceDiscovered(DeviceInfo),
    DiscoveryError { code: i32, message: String },
    DiscoveryFinished,
    DeviceConnected,
    DeviceError { code: i32, message: String },
    ServiceDiscoveryFinished,
    ServiceStateChanged { service: Uuid, state: ServiceState },
    /// Notification received
    CharacteristicChanged { characteristic: Uuid, value: Vec<u8> },
    /// Write acknowledged
    CharacteristicWritten { characteristic: Uuid, value: Vec<u8> },
}
