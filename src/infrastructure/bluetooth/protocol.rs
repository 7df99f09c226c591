//! Evolution Robot Protocol
//!
//! This module contains the protocol definitions for communicating with
//! the Evolution Robot: GATT identifiers, the 6-byte control message,
//! the action encoding and the sound notification format.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Expands a 16-bit assigned number onto the Bluetooth base UUID
pub const fn uuid16(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

/// Device Information service (0x180a)
pub const DEVICE_INFORMATION_UUID: Uuid = uuid16(0x180a);

/// Firmware Revision String characteristic (0x2a26)
pub const FIRMWARE_REVISION_UUID: Uuid = uuid16(0x2a26);

/// Client Characteristic Configuration descriptor (0x2902)
pub const CLIENT_CONFIGURATION_UUID: Uuid = uuid16(0x2902);

/// Robot control service
pub const SERVICE_UUID: Uuid = uuid16(0xfff3);

/// Notification characteristic - sound playback reports arrive here
pub const NOTIFY_CHAR_UUID: Uuid = uuid16(0xfff4);

/// Write characteristic - the control message is sent here
pub const WRITE_CHAR_UUID: Uuid = uuid16(0xfff5);

/// Value written to the client configuration descriptor to enable notifications
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Advertised name of the robot
pub const ROBOT_NAME: &str = "Evolution-Robot";

/// Period of the retransmission timer
pub const TRANSMIT_INTERVAL: Duration = Duration::from_millis(100);

pub const MESSAGE_LEN: usize = 6;

/// Leading synchronization byte
pub const SYNC_BYTE: u8 = b'X';

/// Baseline message: robot stands still, gripper and lift idle, silent
pub const PAUSE_MESSAGE: ControlMessage = ControlMessage([SYNC_BYTE, 0x11, 0x40, 0x40, 0x00, 0x00]);

/// Channel offsets within the control message
pub mod channel {
    pub const MOVEMENT: usize = 1;
    pub const GRIPPER: usize = 2;
    pub const LIFT: usize = 3;
    pub const SOUND: usize = 4;
    pub const AUXILIARY: usize = 5;
}

/// The fixed-size command buffer sent to the robot
///
/// # Layout (6 bytes)
///
/// ```text
/// [0] : Synchronization byte 'X', never changes
/// [1] : Movement - direction and speed
/// [2] : Gripper - open / close
/// [3] : Lift - up / down
/// [4] : Sound - one-shot or loop selector
/// [5] : Auxiliary function, cleared after every acknowledged write
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlMessage([u8; MESSAGE_LEN]);

impl ControlMessage {
    pub fn as_bytes(&self) -> &[u8; MESSAGE_LEN] {
        &self.0
    }

    pub fn get(&self, offset: usize) -> Option<u8> {
        self.0.get(offset).copied()
    }

    /// Replace a single channel. Returns `true` if the byte changed.
    pub fn set(&mut self, offset: usize, value: u8) -> bool {
        match self.0.get_mut(offset) {
            Some(byte) if offset != 0 && *byte != value => {
                *byte = value;
                true
            }
            _ => false,
        }
    }

    /// Accepts exactly six bytes starting with the synchronization byte.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; MESSAGE_LEN] = bytes.try_into().ok()?;
        (bytes[0] == SYNC_BYTE).then_some(Self(bytes))
    }
}

impl Default for ControlMessage {
    fn default() -> Self {
        PAUSE_MESSAGE
    }
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControlMessage({})", self)
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Firmware revision of the connected robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirmwareRevision {
    #[default]
    Unknown,
    Revision1,
    Revision2,
}

impl FirmwareRevision {
    /// Interpret the Device Information firmware revision string
    pub fn from_version_string(value: &[u8]) -> Option<Self> {
        match value {
            b"Ver2.0" => Some(Self::Revision2),
            b"Ver1.0" => Some(Self::Revision1),
            _ => None,
        }
    }
}

/// Actions understood by the robot, keyed by their single letter identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Backward,
    Left,
    Right,
    GripperOpen,
    GripperClose,
    LiftUp,
    LiftDown,
    /// Sound that restarts when it ends
    Loop,
    /// Sound played once
    Sound,
    /// Auxiliary function, pulsed for one write
    Extra,
    /// Reset everything to the pause message
    Stop,
}

impl Action {
    pub fn from_char(action: char) -> Option<Self> {
        Some(match action {
            'F' => Self::Forward,
            'B' => Self::Backward,
            'L' => Self::Left,
            'R' => Self::Right,
            'O' => Self::GripperOpen,
            'C' => Self::GripperClose,
            'U' => Self::LiftUp,
            'D' => Self::LiftDown,
            'M' => Self::Loop,
            'V' => Self::Sound,
            'E' => Self::Extra,
            'S' => Self::Stop,
            _ => return None,
        })
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Forward => 'F',
            Self::Backward => 'B',
            Self::Left => 'L',
            Self::Right => 'R',
            Self::GripperOpen => 'O',
            Self::GripperClose => 'C',
            Self::LiftUp => 'U',
            Self::LiftDown => 'D',
            Self::Loop => 'M',
            Self::Sound => 'V',
            Self::Extra => 'E',
            Self::Stop => 'S',
        }
    }

    /// Parse an identifier, failing with [`Error::UnknownAction`]
    pub fn parse(action: char, index: i32) -> Result<Self> {
        Self::from_char(action).ok_or(Error::UnknownAction { action, index })
    }

    /// Encode this action into a single channel update.
    ///
    /// Returns `None` for [`Action::Stop`], which replaces the whole message.
    pub fn fragment(&self, index: i32, revision: FirmwareRevision) -> Option<MessageFragment> {
        let speed = || index.clamp(0, 3) as u8;

        let (offset, value) = match self {
            Self::Forward => (channel::MOVEMENT, speed() + 1),
            Self::Backward => (channel::MOVEMENT, speed() + 5),
            Self::Left => (channel::MOVEMENT, speed() + 9),
            Self::Right => (channel::MOVEMENT, speed() + 13),
            Self::GripperOpen => (channel::GRIPPER, 0x3c),
            Self::GripperClose => (channel::GRIPPER, 0x3d),
            Self::LiftUp => (channel::LIFT, 0x3e),
            Self::LiftDown => (channel::LIFT, 0x3f),
            Self::Loop | Self::Sound => (channel::SOUND, index.clamp(0, MAX_SOUND_INDEX) as u8 + 21),
            Self::Extra if index == 0 => (channel::AUXILIARY, 0x3b),
            Self::Extra => {
                let base = match revision {
                    FirmwareRevision::Revision1 => 0x35,
                    // Unresolved revisions use the current firmware's table
                    FirmwareRevision::Revision2 | FirmwareRevision::Unknown => 0x47,
                };
                (channel::AUXILIARY, index.clamp(1, 63) as u8 + base)
            }
            Self::Stop => return None,
        };

        Some(MessageFragment { offset, value })
    }
}

/// Largest sound index whose encoding still fits a byte
pub const MAX_SOUND_INDEX: i32 = (u8::MAX - 21) as i32;

/// A single byte update of the control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFragment {
    pub offset: usize,
    pub value: u8,
}

/// Sound playback report received on the notification characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundNotification {
    /// `V<n>Play`
    Playing(i32),
    /// `V<n>End`
    Finished(i32),
}

/// Parse a notification payload.
///
/// Payloads are Latin-1 text. A `V<digits>Play` anywhere in the text wins
/// over `V<digits>End`. Digit runs that do not fit an `i32` read as 0.
pub fn parse_notification(value: &[u8]) -> Option<SoundNotification> {
    let text: String = value.iter().map(|&b| b as char).collect();

    find_sound_report(&text, "Play")
        .map(SoundNotification::Playing)
        .or_else(|| find_sound_report(&text, "End").map(SoundNotification::Finished))
}

fn find_sound_report(text: &str, suffix: &str) -> Option<i32> {
    text.match_indices('V').find_map(|(start, _)| {
        let rest = &text[start + 1..];
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();

        if digits > 0 && rest[digits..].starts_with(suffix) {
            Some(rest[..digits].parse().unwrap_or(0))
        } else {
            None
        }
    })
}
