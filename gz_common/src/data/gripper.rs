//! `gripper` interface: two degree of freedom paddle gripper.

use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Device marker for the `gripper` kind.
pub enum Gripper {}

impl Device for Gripper {
    const KIND: DeviceKind = DeviceKind::Gripper;
    type Payload = GripperData;
}

/// Gripper commands carried in [`GripperCmd::cmd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GripperCommand {
    Open = 1,
    Close = 2,
    Stop = 3,
    Store = 4,
    Retrieve = 5,
}

impl GripperCommand {
    /// Decode a raw command field; `None` for idle or unknown values.
    pub const fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Open),
            2 => Some(Self::Close),
            3 => Some(Self::Stop),
            4 => Some(Self::Store),
            5 => Some(Self::Retrieve),
            _ => None,
        }
    }
}

/// Gripper status carried in [`GripperState::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GripperStatus {
    Open = 1,
    Closed = 2,
    Moving = 3,
    Error = 4,
}

impl GripperStatus {
    /// Decode a raw status field.
    pub const fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Open),
            2 => Some(Self::Closed),
            3 => Some(Self::Moving),
            4 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Client command.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct GripperCmd {
    /// Raw [`GripperCommand`] value, 0 when idle.
    pub cmd: i32,
}

impl GripperCmd {
    pub fn set(&mut self, command: GripperCommand) {
        self.cmd = command as i32;
    }

    pub fn command(&self) -> Option<GripperCommand> {
        GripperCommand::from_i32(self.cmd)
    }
}

/// Gripper status published by the simulator. All flags are 0/1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct GripperState {
    /// Raw [`GripperStatus`] value.
    pub state: i32,
    pub grip_limit_reach: i32,
    pub lift_limit_reach: i32,
    pub outer_beam_obstruct: i32,
    pub inner_beam_obstruct: i32,
    pub left_paddle_open: i32,
    pub right_paddle_open: i32,
    pub lift_up: i32,
    pub lift_down: i32,
}

impl GripperState {
    pub fn status(&self) -> Option<GripperStatus> {
        GripperStatus::from_i32(self.state)
    }
}

/// Payload of a `gripper` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct GripperData {
    /// Client-owned command.
    pub cmd: GripperCmd,
    /// Simulator-owned state.
    pub state: GripperState,
}

const_assert_eq!(size_of::<GripperCmd>(), 4);
const_assert_eq!(size_of::<GripperState>(), 36);
const_assert_eq!(size_of::<GripperData>(), 40);

shm_payload!(GripperData);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_decode() {
        let mut cmd = GripperCmd::default();
        assert_eq!(cmd.command(), None);
        cmd.set(GripperCommand::Retrieve);
        assert_eq!(cmd.cmd, 5);
        assert_eq!(cmd.command(), Some(GripperCommand::Retrieve));
        assert_eq!(GripperStatus::from_i32(3), Some(GripperStatus::Moving));
        assert_eq!(GripperStatus::from_i32(9), None);
    }
}
