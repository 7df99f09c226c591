//! Error types for EvoBot Remote

use crate::infrastructure::bluetooth::transport::TransportError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// EvoBot Remote error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No usable local Bluetooth adapter
    #[error("No Bluetooth controller available")]
    AdapterUnavailable,

    /// Low energy device discovery reported an error
    #[error("Device discovery failed: {message} ({code})")]
    DiscoveryFailed {
        /// Backend specific error code
        code: i32,
        /// Backend supplied description
        message: String,
    },

    /// The connection to the robot failed or broke down
    #[error("Device communication failed ({message} ({code}))")]
    DeviceConnectionFailed {
        /// Backend specific error code
        code: i32,
        /// Backend supplied description
        message: String,
    },

    /// Device information or robot control service is missing
    #[error("Required services not available")]
    RequiredServicesMissing,

    /// The firmware revision string was missing or not recognized
    #[error("Could not identify firmware revision")]
    UnknownFirmwareRevision,

    /// Action identifier without an encoding
    #[error("Unknown action {action} (index={index})")]
    UnknownAction { action: char, index: i32 },

    /// Stop requested for an action that is not encoded in the message
    #[error("Inactive action {action} (index={index})")]
    ActionNotActive { action: char, index: i32 },

    /// Attach called on a session that is already connected
    #[error("Connected already")]
    AlreadyConnected,

    /// Synchronous failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Stable numeric code for the error, for consumers that only show a number.
    pub fn code(&self) -> u32 {
        match self {
            Self::AdapterUnavailable => 1,
            Self::DiscoveryFailed { .. } => 2,
            Self::DeviceConnectionFailed { .. } => 3,
            Self::RequiredServicesMissing => 4,
            Self::UnknownFirmwareRevision => 5,
            Self::UnknownAction { .. } => 6,
            Self::ActionNotActive { .. } => 7,
            Self::AlreadyConnected => 8,
            Self::Transport(_) => 9,
        }
    }

    /// Terminal errors put the controller into its error state for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AdapterUnavailable
                | Self::DiscoveryFailed { .. }
                | Self::DeviceConnectionFailed { .. }
                | Self::Transport(_)
        )
    }
}
