//! Robot Remote Service Module
//!
//! Single-threaded event pump around the [`Controller`]: Bluetooth
//! completions, UI commands and the retransmission tick are processed one at
//! a time, in that priority.

use crate::domain::models::AppEvent;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::connection::{ConnectionConfig, Controller};
use crate::infrastructure::bluetooth::transport::{BluetoothBackend, BluetoothEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Requests from the user interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotCommand {
    StartAction { action: char, index: i32 },
    StopAction { action: char, index: i32 },
    PlaySound(i32),
    PlayLoop(i32),
    SetMessage(Vec<u8>),
}

/// Main service coordinating the robot connection
pub struct RobotRemoteService<B: BluetoothBackend> {
    controller: Controller<B>,
    transmit_interval: Duration,
}

impl<B: BluetoothBackend> RobotRemoteService<B> {
    pub fn new(
        backend: B,
        settings: &Settings,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            controller: Controller::new(backend, ConnectionConfig::from(settings), event_sender),
            transmit_interval: settings.transmit_interval(),
        }
    }

    pub fn controller(&self) -> &Controller<B> {
        &self.controller
    }

    /// Apply one command. Returns whether it was accepted.
    pub fn dispatch(&mut self, command: RobotCommand) -> bool {
        match command {
            RobotCommand::StartAction { action, index } => {
                self.controller.start_action(action, index).is_ok()
            }
            RobotCommand::StopAction { action, index } => {
                self.controller.stop_action(action, index).is_ok()
            }
            RobotCommand::PlaySound(index) => self.controller.play_sound(index).is_ok(),
            RobotCommand::PlayLoop(index) => self.controller.play_loop(index).is_ok(),
            RobotCommand::SetMessage(message) => self.controller.set_current_message(&message),
        }
    }

    /// Run until the command channel closes.
    pub async fn run(
        &mut self,
        mut bluetooth_events: mpsc::UnboundedReceiver<BluetoothEvent>,
        mut commands: mpsc::UnboundedReceiver<RobotCommand>,
    ) {
        let mut transmitter = tokio::time::interval(self.transmit_interval);
        transmitter.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                Some(event) = bluetooth_events.recv() => self.controller.handle_event(event),

                command = commands.recv() => match command {
                    Some(command) => {
                        self.dispatch(command);
                    }
                    None => {
                        info!("Command channel closed, stopping robot service");
                        break;
                    }
                },

                _ = transmitter.tick() => self.controller.on_transmit_tick(),
            }
        }
    }
}
