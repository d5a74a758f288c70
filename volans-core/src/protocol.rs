//! Volans wire protocol: datagram layout, command codes, heartbeat pose.

use std::net::Ipv4Addr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::identity::AgentId;

/// Shared UDP port every agent binds and broadcasts on.
pub const DEFAULT_PORT: u16 = 37020;

/// Token value for fire-and-forget datagrams (no correlation).
pub const TOKEN_NONE: i64 = -1;

/// Command code carried by heartbeats (no command).
pub const CODE_HEARTBEAT: u8 = 0;
pub const CODE_SET_SPEED: u8 = 1;
pub const CODE_GOTO: u8 = 2;
pub const CODE_TAKEOFF: u8 = 3;
pub const CODE_LAND: u8 = 4;
pub const CODE_ARM: u8 = 5;
pub const CODE_DISARM: u8 = 6;
pub const CODE_SMART_GOTO: u8 = 7;
pub const CODE_SET_LED: u8 = 8;

/// Payload floats in a heartbeat pose: encoded ip + position + attitude.
pub const POSE_PAYLOAD_LEN: usize = 7;

/// One broadcast datagram. Header integers are fixed-width on the wire,
/// `target_id` is a one-byte presence tag plus the id, and the payload is a
/// length-prefixed sequence of f64 values (see the wire module).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datagram {
    /// Correlation/ack placeholder, `TOKEN_NONE` when unused.
    pub token: i64,
    /// Numeric id of the sending agent.
    pub sender_id: AgentId,
    /// Reserved, always 0.
    pub source: u64,
    /// Command code, `CODE_HEARTBEAT` for pose announcements.
    pub command: u8,
    /// Addressed delivery: `None` lets every receiver execute the command.
    pub target_id: Option<AgentId>,
    /// Command arguments or heartbeat pose, depending on `command`.
    pub payload: Vec<f64>,
}

impl Datagram {
    /// Heartbeat announcing the sender's pose.
    pub fn heartbeat(sender_id: AgentId, pose: &HeartbeatPose) -> Self {
        Datagram {
            token: TOKEN_NONE,
            sender_id,
            source: 0,
            command: CODE_HEARTBEAT,
            target_id: None,
            payload: pose.to_payload(),
        }
    }

    /// Command datagram, optionally addressed to a single agent.
    pub fn command(sender_id: AgentId, target_id: Option<AgentId>, command: &Command) -> Self {
        Datagram {
            token: TOKEN_NONE,
            sender_id,
            source: 0,
            command: command.code(),
            target_id,
            payload: command.args(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.command == CODE_HEARTBEAT
    }
}

/// Typed view of a non-heartbeat command code and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetSpeed { vx: f64, vy: f64, vz: f64, yaw_rate: f64 },
    Goto { x: f64, y: f64, z: f64, yaw: f64 },
    Takeoff,
    Land,
    Arm,
    Disarm,
    SmartGoto { x: f64, y: f64, z: f64, yaw: f64 },
    SetLed { led_id: f64, r: f64, g: f64, b: f64 },
}

impl Command {
    /// Wire code for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::SetSpeed { .. } => CODE_SET_SPEED,
            Command::Goto { .. } => CODE_GOTO,
            Command::Takeoff => CODE_TAKEOFF,
            Command::Land => CODE_LAND,
            Command::Arm => CODE_ARM,
            Command::Disarm => CODE_DISARM,
            Command::SmartGoto { .. } => CODE_SMART_GOTO,
            Command::SetLed { .. } => CODE_SET_LED,
        }
    }

    /// Payload floats for this command.
    pub fn args(&self) -> Vec<f64> {
        match *self {
            Command::SetSpeed { vx, vy, vz, yaw_rate } => vec![vx, vy, vz, yaw_rate],
            Command::Goto { x, y, z, yaw } => vec![x, y, z, yaw],
            Command::Takeoff | Command::Land | Command::Arm | Command::Disarm => Vec::new(),
            Command::SmartGoto { x, y, z, yaw } => vec![x, y, z, yaw],
            Command::SetLed { led_id, r, g, b } => vec![led_id, r, g, b],
        }
    }

    /// Parse a wire code and payload into a typed command.
    pub fn from_wire(code: u8, payload: &[f64]) -> Result<Self, CommandError> {
        match code {
            CODE_SET_SPEED => match *payload {
                [vx, vy, vz, yaw_rate] => Ok(Command::SetSpeed { vx, vy, vz, yaw_rate }),
                _ => Err(CommandError::arity(code, 4, payload.len())),
            },
            CODE_GOTO => match *payload {
                [x, y, z, yaw] => Ok(Command::Goto { x, y, z, yaw }),
                _ => Err(CommandError::arity(code, 4, payload.len())),
            },
            CODE_TAKEOFF => match *payload {
                [] => Ok(Command::Takeoff),
                _ => Err(CommandError::arity(code, 0, payload.len())),
            },
            CODE_LAND => match *payload {
                [] => Ok(Command::Land),
                _ => Err(CommandError::arity(code, 0, payload.len())),
            },
            CODE_ARM => match *payload {
                [] => Ok(Command::Arm),
                _ => Err(CommandError::arity(code, 0, payload.len())),
            },
            CODE_DISARM => match *payload {
                [] => Ok(Command::Disarm),
                _ => Err(CommandError::arity(code, 0, payload.len())),
            },
            CODE_SMART_GOTO => match *payload {
                [x, y, z, yaw] => Ok(Command::SmartGoto { x, y, z, yaw }),
                _ => Err(CommandError::arity(code, 4, payload.len())),
            },
            CODE_SET_LED => match *payload {
                [led_id, r, g, b] => Ok(Command::SetLed { led_id, r, g, b }),
                _ => Err(CommandError::arity(code, 4, payload.len())),
            },
            other => Err(CommandError::UnknownCode(other)),
        }
    }
}

/// Pose carried in a heartbeat payload: sender ip packed as an integer,
/// position, attitude. Layout: [ip, x, y, z, roll, pitch, yaw].
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatPose {
    pub ip: Ipv4Addr,
    pub position: Vector3<f64>,
    pub attitude: Vector3<f64>,
}

impl HeartbeatPose {
    pub fn to_payload(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(POSE_PAYLOAD_LEN);
        out.push(u32::from(self.ip) as f64);
        out.extend_from_slice(self.position.as_slice());
        out.extend_from_slice(self.attitude.as_slice());
        out
    }

    pub fn from_payload(payload: &[f64]) -> Result<Self, CommandError> {
        match *payload {
            [ip, x, y, z, roll, pitch, yaw] => Ok(HeartbeatPose {
                // saturating cast: out-of-range or NaN ip floats collapse to 0.0.0.0
                ip: Ipv4Addr::from(ip as u32),
                position: Vector3::new(x, y, z),
                attitude: Vector3::new(roll, pitch, yaw),
            }),
            _ => Err(CommandError::arity(
                CODE_HEARTBEAT,
                POSE_PAYLOAD_LEN,
                payload.len(),
            )),
        }
    }
}

/// Error mapping a wire (code, payload) pair onto a typed command or pose.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command code {0}")]
    UnknownCode(u8),
    #[error("command {code} expects {expected} payload floats, got {got}")]
    Arity {
        code: u8,
        expected: usize,
        got: usize,
    },
}

impl CommandError {
    fn arity(code: u8, expected: usize, got: usize) -> Self {
        CommandError::Arity {
            code,
            expected,
            got,
        }
    }
}
