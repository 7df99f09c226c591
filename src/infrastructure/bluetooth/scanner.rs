//! BLE Scanner Module
//!
//! Filters low energy discovery results down to the robot.

use crate::domain::models::{format_address, DeviceAddress, DeviceInfo};
use std::collections::HashSet;
use tracing::debug;

/// What to do with a discovered device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Address reported before
    Duplicate,
    /// New device that is not the robot
    Ignored,
    /// New device advertising the robot's name
    Robot,
}

/// Remembers every address seen during discovery
pub struct DeviceScanner {
    robot_name: String,
    known_devices: HashSet<DeviceAddress>,
}

impl DeviceScanner {
    pub fn new(robot_name: impl Into<String>) -> Self {
        Self {
            robot_name: robot_name.into(),
            known_devices: HashSet::new(),
        }
    }

    pub fn robot_name(&self) -> &str {
        &self.robot_name
    }

    pub fn observe(&mut self, device: &DeviceInfo) -> ScanOutcome {
        if !self.known_devices.insert(device.address) {
            return ScanOutcome::Duplicate;
        }

        debug!(
            "Bluetooth device `{}' ({}) discovered",
            device.name,
            format_address(device.address)
        );

        if device.name == self.robot_name {
            ScanOutcome::Robot
        } else {
            ScanOutcome::Ignored
        }
    }
}
