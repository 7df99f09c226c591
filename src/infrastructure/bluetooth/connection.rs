//! BLE Connection Module
//!
//! Drives device discovery, the GATT connection to the robot, and hands the
//! connection to the [`RobotSession`]. All of it is folded into one
//! [`ControllerState`].

use crate::domain::models::{
    format_address, AppEvent, ControllerState, DeviceInfo, HostMode, SessionState,
};
use crate::domain::settings::Settings;
use crate::error::{Error, Result};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::scanner::{DeviceScanner, ScanOutcome};
use crate::infrastructure::bluetooth::session::RobotSession;
use crate::infrastructure::bluetooth::transport::{BluetoothBackend, BluetoothEvent, GattCentral};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Advertised name that identifies the robot
    pub robot_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            robot_name: protocol::ROBOT_NAME.to_string(),
        }
    }
}

impl From<&Settings> for ConnectionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            robot_name: settings.robot_name.clone(),
        }
    }
}

/// Connection controller owning the robot session
pub struct Controller<B: BluetoothBackend> {
    backend: B,
    scanner: DeviceScanner,
    central: Option<B::Central>,
    session: RobotSession,

    error: Option<Error>,
    old_state: ControllerState,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl<B: BluetoothBackend> Controller<B> {
    /// Create the controller and start looking for the robot
    pub fn new(
        backend: B,
        config: ConnectionConfig,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let mut controller = Self {
            backend,
            scanner: DeviceScanner::new(config.robot_name),
            central: None,
            session: RobotSession::new(event_sender.clone()),
            error: None,
            old_state: ControllerState::Uninitialized,
            event_sender,
        };

        controller.initialize();
        controller
    }

    fn initialize(&mut self) {
        if !self.backend.is_adapter_valid() {
            self.raise_error(Error::AdapterUnavailable);
            return;
        }

        let mode = self.backend.host_mode();
        self.on_host_mode_changed(mode);
    }

    pub fn state(&self) -> ControllerState {
        if self.error.is_some() {
            return ControllerState::Error;
        }

        match self.session.state() {
            SessionState::Connected => ControllerState::Connected,
            SessionState::Connecting => ControllerState::Connecting,
            SessionState::Disconnected if self.central.is_some() => {
                ControllerState::ServiceDiscovery
            }
            SessionState::Disconnected if self.backend.is_discovery_active() => {
                ControllerState::DeviceDiscovery
            }
            SessionState::Disconnected => ControllerState::Uninitialized,
        }
    }

    /// The error that put the controller into its error state
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn error_string(&self) -> String {
        self.error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn session(&self) -> &RobotSession {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn start_action(&mut self, action: char, index: i32) -> Result<()> {
        self.session.start_action(self.central.as_mut(), action, index)
    }

    pub fn stop_action(&mut self, action: char, index: i32) -> Result<()> {
        self.session.stop_action(self.central.as_mut(), action, index)
    }

    pub fn play_sound(&mut self, index: i32) -> Result<()> {
        self.session.play_sound(self.central.as_mut(), index)
    }

    pub fn play_loop(&mut self, index: i32) -> Result<()> {
        self.session.play_loop(self.central.as_mut(), index)
    }

    pub fn set_current_message(&mut self, message: &[u8]) -> bool {
        self.session.set_current_message(self.central.as_mut(), message)
    }

    /// Retransmission timer tick
    pub fn on_transmit_tick(&mut self) {
        if let Some(central) = self.central.as_mut() {
            self.session.on_transmit_tick(central);
        }
    }

    /// Process one completion from the Bluetooth stack
    pub fn handle_event(&mut self, event: BluetoothEvent) {
        match event {
            BluetoothEvent::HostModeChanged(mode) => self.on_host_mode_changed(mode),
            BluetoothEvent::DeviceDiscovered(device) => self.on_device_discovered(device),
            BluetoothEvent::DiscoveryError { code, message } => {
                self.raise_error(Error::DiscoveryFailed { code, message })
            }
            BluetoothEvent::DiscoveryFinished => {
                info!("Device discovery has finished");
                self.check_state();
            }
            BluetoothEvent::DeviceConnected => self.on_device_connected(),
            BluetoothEvent::DeviceError { code, message } => {
                self.raise_error(Error::DeviceConnectionFailed { code, message });
                self.reset_central();
            }
            BluetoothEvent::ServiceDiscoveryFinished => self.on_service_discovery_finished(),
            BluetoothEvent::ServiceStateChanged { service, state } => {
                if let Some(central) = self.central.as_mut() {
                    self.session
                        .on_service_state_changed(central, service, state);
                }
                self.check_state();
            }
            BluetoothEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                if let Some(central) = self.central.as_mut() {
                    self.session
                        .on_characteristic_changed(Some(central), characteristic, &value);
                }
            }
            BluetoothEvent::CharacteristicWritten {
                characteristic,
                value,
            } => {
                if let Some(central) = self.central.as_mut() {
                    self.session
                        .on_characteristic_written(central, characteristic, &value);
                }
            }
        }
    }

    fn on_host_mode_changed(&mut self, mode: HostMode) {
        if self.error.is_some() {
            return;
        }

        if mode == HostMode::PoweredOff {
            info!("Activating Bluetooth controller");
            self.backend.power_on();
        } else if self.central.is_none() && !self.backend.is_discovery_active() {
            info!("Searching for `{}'", self.scanner.robot_name());
            if let Err(e) = self.backend.start_discovery() {
                self.raise_error(e.into());
                return;
            }
        }

        self.check_state();
    }

    fn on_device_discovered(&mut self, device: DeviceInfo) {
        if self.error.is_some() {
            return;
        }

        if self.scanner.observe(&device) != ScanOutcome::Robot || self.central.is_some() {
            return;
        }

        self.backend.stop_discovery();
        let mut central = self.backend.create_central(&device);

        info!(
            "Connecting to `{}' ({})",
            device.name,
            format_address(device.address)
        );

        let result = central.connect_to_device();
        self.central = Some(central);

        if let Err(e) = result {
            self.raise_error(e.into());
            self.reset_central();
            return;
        }

        self.check_state();
    }

    fn on_device_connected(&mut self) {
        let Some(central) = self.central.as_mut() else {
            return;
        };

        info!(
            "Connected to {} ({})",
            central.remote_name(),
            format_address(central.remote_address())
        );

        if let Err(e) = central.discover_services() {
            self.raise_error(e.into());
            self.reset_central();
            return;
        }

        self.check_state();
    }

    fn on_service_discovery_finished(&mut self) {
        let Some(central) = self.central.as_mut() else {
            return;
        };

        info!("Service discovery has finished");

        match self.session.attach(&mut *central) {
            Ok(()) => {}
            Err(Error::AlreadyConnected) => {}
            Err(e) => {
                warn!(
                    "Could not find Evolution Robot service at `{}' ({}): {}",
                    central.remote_name(),
                    format_address(central.remote_address()),
                    e
                );
                self.reset_central();
                self.raise_error(e);
            }
        }

        self.check_state();
    }

    /// Publish `error`. Terminal errors also latch the Error state.
    fn raise_error(&mut self, error: Error) {
        let _ = self.event_sender.send(AppEvent::ErrorOccurred(error.clone()));

        if error.is_terminal() {
            error!("{}", error);
            self.error = Some(error);
        }

        self.check_state();
    }

    /// Release the connection. The session stops transmitting first.
    fn reset_central(&mut self) {
        if let Some(mut central) = self.central.take() {
            self.session.detach();
            central.disconnect_from_device();
        }

        self.check_state();
    }

    fn check_state(&mut self) {
        let new_state = self.state();

        if self.old_state != new_state {
            info!("state changed: {} => {}", self.old_state, new_state);
            let _ = self.event_sender.send(AppEvent::ControllerStateChanged {
                new: new_state,
                old: self.old_state,
            });
            self.old_state = new_state;
        }
    }
}
