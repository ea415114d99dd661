//! Shared outgoing command state.
//!
//! Two producers write here: the operator's pointer/console input on the
//! consumer side, and the gamepad poller on the link thread. The link loop
//! reads a snapshot each tick. Writes are last-writer-wins with no
//! arbitration between the two producers.

use std::sync::{Mutex, MutexGuard, PoisonError};

use car_proto::{DriveMode, OutgoingCommand};

/// Lock-guarded [`OutgoingCommand`].
#[derive(Debug, Default)]
pub struct ControlState {
    inner: Mutex<OutgoingCommand>,
}

impl ControlState {
    /// Autonomous mode, axes centered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded value is three plain bytes; a panicked writer cannot leave
    // it half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, OutgoingCommand> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write axes from the pointer/console input.
    pub fn set(&self, axis_x: i8, axis_y: i8) {
        self.write_axes(axis_x, axis_y);
    }

    /// Write axes from the gamepad poller.
    pub fn set_from_gamepad(&self, axis_x: i8, axis_y: i8) {
        self.write_axes(axis_x, axis_y);
    }

    fn write_axes(&self, axis_x: i8, axis_y: i8) {
        let mut cmd = self.lock();
        *cmd = OutgoingCommand::new(axis_x, axis_y, cmd.mode);
    }

    /// Copy of the current command.
    #[must_use]
    pub fn snapshot(&self) -> OutgoingCommand {
        *self.lock()
    }

    #[must_use]
    pub fn mode(&self) -> DriveMode {
        self.lock().mode
    }

    /// Switch mode. Axes are re-centered.
    pub fn set_mode(&self, mode: DriveMode) {
        *self.lock() = OutgoingCommand::neutral(mode);
    }

    /// Flip between autonomous and manual, re-centering the axes.
    pub fn toggle_mode(&self) -> DriveMode {
        let mut cmd = self.lock();
        let mode = cmd.mode.toggled();
        *cmd = OutgoingCommand::neutral(mode);
        mode
    }

    /// Input released: re-center the axes, keep the mode.
    pub fn release(&self) {
        let mut cmd = self.lock();
        *cmd = OutgoingCommand::neutral(cmd.mode);
    }
}
