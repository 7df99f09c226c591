//! Robot Session Module
//!
//! Keeps the robot's control message, pushes it over the write
//! characteristic with at most one write in flight, and tracks sound
//! playback reported through notifications.
//!
//! The session never owns the GATT connection. Every operation that may
//! transmit borrows the central from the caller; without one the message is
//! still updated but nothing is sent.

use crate::domain::models::{AppEvent, SessionState};
use crate::error::{Error, Result};
use crate::infrastructure::bluetooth::protocol::{
    channel, parse_notification, Action, ControlMessage, FirmwareRevision, SoundNotification,
    CLIENT_CONFIGURATION_UUID, DEVICE_INFORMATION_UUID, ENABLE_NOTIFICATION_VALUE,
    FIRMWARE_REVISION_UUID, NOTIFY_CHAR_UUID, PAUSE_MESSAGE, SERVICE_UUID, WRITE_CHAR_UUID,
};
use crate::infrastructure::bluetooth::transport::{
    Characteristic, GattCentral, ServiceHandle, ServiceState,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

fn hex(value: &[u8]) -> String {
    value.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Control session with one connected robot
pub struct RobotSession {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    old_state: SessionState,

    device_information: Option<ServiceHandle>,
    robot_control: Option<ServiceHandle>,
    write_characteristic: Option<Characteristic>,
    firmware_revision: FirmwareRevision,

    message: ControlMessage,
    last_sent: Option<ControlMessage>,
    pending_writes: u32,
    transmitter_armed: bool,

    current_sound: i32,
    audio_loop: bool,
}

impl RobotSession {
    pub fn new(event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            event_sender,
            old_state: SessionState::Disconnected,
            device_information: None,
            robot_control: None,
            write_characteristic: None,
            firmware_revision: FirmwareRevision::Unknown,
            message: PAUSE_MESSAGE,
            last_sent: None,
            pending_writes: 0,
            transmitter_armed: false,
            current_sound: 0,
            audio_loop: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match (
            &self.write_characteristic,
            &self.device_information,
            &self.robot_control,
        ) {
            (Some(_), _, _) => SessionState::Connected,
            (None, Some(_), Some(_)) => SessionState::Connecting,
            _ => SessionState::Disconnected,
        }
    }

    pub fn current_message(&self) -> ControlMessage {
        self.message
    }

    /// Index of the playing sound; `-n` once sound `n` has finished
    pub fn current_sound(&self) -> i32 {
        self.current_sound
    }

    pub fn firmware_revision(&self) -> FirmwareRevision {
        self.firmware_revision
    }

    /// Writes issued but not yet acknowledged
    pub fn pending_writes(&self) -> u32 {
        self.pending_writes
    }

    pub fn is_looping(&self) -> bool {
        self.audio_loop
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitter_armed
    }

    /// Resolve the robot's services on a freshly discovered central.
    pub fn attach<C: GattCentral + ?Sized>(&mut self, central: &mut C) -> Result<()> {
        if self.state() == SessionState::Connected {
            warn!("Connected already");
            return Err(Error::AlreadyConnected);
        }

        let device_information = central.create_service(DEVICE_INFORMATION_UUID);
        let robot_control = central.create_service(SERVICE_UUID);

        let (Some(device_information), Some(robot_control)) = (device_information, robot_control)
        else {
            warn!("Could not resolve required services");
            return Err(Error::RequiredServicesMissing);
        };

        self.device_information = Some(device_information);
        self.robot_control = Some(robot_control);
        self.check_state();

        for service in [device_information, robot_control] {
            let state = central.service_state(service);
            self.on_service_state_changed(central, service.uuid(), state);
        }

        Ok(())
    }

    /// Forget all handles of a released central and stop transmitting.
    pub fn detach(&mut self) {
        self.transmitter_armed = false;
        self.write_characteristic = None;
        self.device_information = None;
        self.robot_control = None;
        self.pending_writes = 0;
        self.last_sent = None;
        self.audio_loop = false;
        self.firmware_revision = FirmwareRevision::Unknown;
        self.check_state();
    }

    pub fn start_action<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        action: char,
        index: i32,
    ) -> Result<()> {
        let parsed = Action::parse(action, index).inspect_err(|_| {
            warn!("Could not start unknown action {} (index={})", action, index);
        })?;

        let Some(fragment) = parsed.fragment(index, self.firmware_revision) else {
            info!("Pausing the robot");
            self.replace_message(central, PAUSE_MESSAGE);
            return Ok(());
        };

        info!("Starting {} action (index={})", action, index);

        if fragment.offset == channel::SOUND {
            self.audio_loop = parsed == Action::Loop;
        }

        self.set_message_byte(central, fragment.offset, fragment.value);
        Ok(())
    }

    pub fn stop_action<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        action: char,
        index: i32,
    ) -> Result<()> {
        let parsed = Action::parse(action, index).inspect_err(|_| {
            warn!("Could not stop unknown action {} (index={})", action, index);
        })?;

        let Some(fragment) = parsed.fragment(index, self.firmware_revision) else {
            info!("Pausing the robot");
            self.replace_message(central, PAUSE_MESSAGE);
            return Ok(());
        };

        if self.message.get(fragment.offset) != Some(fragment.value) {
            warn!("Could not stop inactive action {} (index={})", action, index);
            return Err(Error::ActionNotActive { action, index });
        }

        info!("Stopping {} action (index={})", action, index);
        let baseline = PAUSE_MESSAGE.get(fragment.offset).unwrap_or_default();
        self.set_message_byte(central, fragment.offset, baseline);
        Ok(())
    }

    pub fn play_sound<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        index: i32,
    ) -> Result<()> {
        self.start_action(central, Action::Sound.as_char(), index)
    }

    pub fn play_loop<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        index: i32,
    ) -> Result<()> {
        self.start_action(central, Action::Loop.as_char(), index)
    }

    /// Replace the whole message. Returns `false` when `message` is not a
    /// valid control message or equals the current one.
    pub fn set_current_message<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        message: &[u8],
    ) -> bool {
        match ControlMessage::from_slice(message) {
            Some(message) => self.replace_message(central, message),
            None => {
                debug!("Ignoring malformed control message: {}", hex(message));
                false
            }
        }
    }

    /// Retransmission timer tick
    pub fn on_transmit_tick<C: GattCentral + ?Sized>(&mut self, central: &mut C) {
        if self.transmitter_armed && self.pending_writes == 0 {
            self.transmit_message(central);
        }
    }

    pub fn on_service_state_changed<C: GattCentral + ?Sized>(
        &mut self,
        central: &mut C,
        service: Uuid,
        state: ServiceState,
    ) {
        info!("State of service {} has changed: {}", service, state.as_str());

        let Some(handle) = [self.device_information, self.robot_control]
            .into_iter()
            .flatten()
            .find(|handle| handle.uuid() == service)
        else {
            return;
        };

        match state {
            ServiceState::DiscoveryRequired => {
                if let Err(e) = central.discover_details(handle) {
                    warn!("Could not discover details of service {}: {}", service, e);
                }
            }
            ServiceState::ServiceDiscovered if Some(handle) == self.device_information => {
                if let Err(e) = self.read_firmware_version(central) {
                    warn!("{}", e);
                }
            }
            ServiceState::ServiceDiscovered => {
                if self.write_characteristic.is_none() && self.start_notification(central) {
                    self.start_transmission(central);
                }
            }
            ServiceState::InvalidService | ServiceState::DiscoveringServices => {}
        }
    }

    /// Notification from the robot
    pub fn on_characteristic_changed<C: GattCentral + ?Sized>(
        &mut self,
        mut central: Option<&mut C>,
        characteristic: Uuid,
        value: &[u8],
    ) {
        debug!(
            "Value of characteristic {} has changed: {}",
            characteristic,
            hex(value)
        );

        // Sound reports are only tracked once the write channel is up
        if characteristic != NOTIFY_CHAR_UUID || self.write_characteristic.is_none() {
            return;
        }

        match parse_notification(value) {
            Some(SoundNotification::Playing(index)) => {
                self.current_sound = index;

                if !self.audio_loop {
                    let _ = self.stop_action(central.as_deref_mut(), 'V', index);
                }
            }
            Some(SoundNotification::Finished(index)) => {
                self.current_sound = index;

                if self.audio_loop {
                    let _ = self.start_action(central.as_deref_mut(), 'M', index);
                } else {
                    self.current_sound = -index;
                    let _ = self.stop_action(central.as_deref_mut(), 'V', index);
                }
            }
            None => {
                debug!("Ignoring notification: {:?}", String::from_utf8_lossy(value));
                return;
            }
        }

        let _ = self
            .event_sender
            .send(AppEvent::SoundChanged(self.current_sound));
    }

    /// Write acknowledgment from the transport
    pub fn on_characteristic_written<C: GattCentral + ?Sized>(
        &mut self,
        central: &mut C,
        characteristic: Uuid,
        value: &[u8],
    ) {
        debug!(
            "Value of characteristic {} has been written: {}",
            characteristic,
            hex(value)
        );

        let is_write_channel = self
            .write_characteristic
            .as_ref()
            .is_some_and(|c| c.uuid == characteristic);

        if !is_write_channel {
            return;
        }

        self.pending_writes = self.pending_writes.saturating_sub(1);

        // The auxiliary function is a single pulse, cleared once it went out
        let pulse = self.message.get(channel::AUXILIARY);
        let sent = self.last_sent.and_then(|m| m.get(channel::AUXILIARY));

        if pulse != Some(0) && pulse != sent {
            self.transmit_message(central);
        } else {
            self.set_message_byte(Some(central), channel::AUXILIARY, 0);
        }
    }

    fn read_firmware_version<C: GattCentral + ?Sized>(
        &mut self,
        central: &C,
    ) -> Result<FirmwareRevision> {
        let revision = self
            .device_information
            .and_then(|service| central.characteristic(service, FIRMWARE_REVISION_UUID))
            .and_then(|c| FirmwareRevision::from_version_string(&c.value));

        match revision {
            Some(revision) => {
                info!("Firmware revision: {:?}", revision);
                self.firmware_revision = revision;
                Ok(revision)
            }
            None => Err(Error::UnknownFirmwareRevision),
        }
    }

    fn start_notification<C: GattCentral + ?Sized>(&mut self, central: &mut C) -> bool {
        let descriptor = self
            .robot_control
            .and_then(|service| central.characteristic(service, NOTIFY_CHAR_UUID))
            .and_then(|c| central.descriptor(&c, CLIENT_CONFIGURATION_UUID));

        let Some(descriptor) = descriptor else {
            warn!("Could not setup notification characteristic");
            return false;
        };

        match central.write_descriptor(&descriptor, &ENABLE_NOTIFICATION_VALUE) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not enable notifications: {}", e);
                false
            }
        }
    }

    fn start_transmission<C: GattCentral + ?Sized>(&mut self, central: &mut C) -> bool {
        let characteristic = self
            .robot_control
            .and_then(|service| central.characteristic(service, WRITE_CHAR_UUID));

        let Some(characteristic) = characteristic else {
            warn!("Could not setup write characteristic");
            return false;
        };

        self.write_characteristic = Some(characteristic);
        self.check_state();

        self.transmitter_armed = true;
        self.on_transmit_tick(central);
        true
    }

    fn set_message_byte<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        offset: usize,
        value: u8,
    ) {
        if self.message.set(offset, value) {
            self.message_changed(central);
        }
    }

    fn replace_message<C: GattCentral + ?Sized>(
        &mut self,
        central: Option<&mut C>,
        message: ControlMessage,
    ) -> bool {
        if message == self.message {
            return false;
        }

        self.message = message;
        self.message_changed(central);
        true
    }

    fn message_changed<C: GattCentral + ?Sized>(&mut self, central: Option<&mut C>) {
        let _ = self
            .event_sender
            .send(AppEvent::MessageChanged(self.message));

        if let Some(central) = central {
            self.transmit_message(central);
        }
    }

    /// Send the current message unless a write is still in flight.
    fn transmit_message<C: GattCentral + ?Sized>(&mut self, central: &mut C) {
        if self.pending_writes > 0 {
            trace!("Write in flight, deferring {}", self.message);
            return;
        }

        let Some(characteristic) = &self.write_characteristic else {
            return;
        };

        match central.write_characteristic(characteristic, self.message.as_bytes()) {
            Ok(()) => {
                self.pending_writes += 1;
                self.last_sent = Some(self.message);
                trace!("Transmitted {}", self.message);
            }
            Err(e) => warn!("Could not transmit {}: {}", self.message, e),
        }
    }

    fn check_state(&mut self) {
        let new_state = self.state();

        if new_state != self.old_state {
            info!("state changed: {} => {}", self.old_state, new_state);
            let _ = self.event_sender.send(AppEvent::SessionStateChanged {
                new: new_state,
                old: self.old_state,
            });
            self.old_state = new_state;
        }
    }
}
