//! Message types carried as frame payloads
//!
//! Every payload starts with a version byte and a message type, followed by a
//! fixed little-endian body:
//!
//! ```text
//! [VERSION][TYPE][BODY...]
//!   0x01 Command   : leftState, leftDuty, rightState, rightDuty
//!   0x02 Status    : leftState, leftDuty, rightState, rightDuty
//!   0x10 Telemetry : timestamp u32, id i32, value f32
//! ```
//!
//! The layout is spelled out byte by byte so both boards agree on it
//! regardless of compiler or struct padding.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Current payload schema version
pub const PROTOCOL_VERSION: u8 = 1;

// Message type IDs: input board → actuator board
pub const MSG_COMMAND: u8 = 0x01;

// Message type IDs: actuator board → input board
pub const MSG_STATUS: u8 = 0x02;
pub const MSG_TELEMETRY: u8 = 0x10;

/// Header length (version + type)
const HEADER_LEN: usize = 2;

/// Body length of a command or status pair
const PAIR_BODY_LEN: usize = 4;

/// Body length of a telemetry record
const TELEMETRY_BODY_LEN: usize = 12;

/// Largest serialized message
pub const MAX_MESSAGE_LEN: usize = HEADER_LEN + TELEMETRY_BODY_LEN;

/// Errors from decoding a payload into a [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchemaError {
    /// Payload shorter than the header
    Truncated,
    /// Version byte does not match [`PROTOCOL_VERSION`]
    UnsupportedVersion(u8),
    /// Unknown message type
    UnknownType(u8),
    /// Body length does not match the message type
    BadLength,
    /// Motor state code out of range
    InvalidState(u8),
    /// Duty above 100%
    InvalidDuty(u8),
}

/// Motor operating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotorState {
    /// Relays open, no drive
    #[default]
    Idle,
    /// Driving in the forward (recline) direction
    Forward,
    /// Driving in the reverse (return) direction
    Reverse,
    /// Motor terminals shorted for dynamic braking
    Brake,
}

// Wire format values
const STATE_IDLE: u8 = 0;
const STATE_FORWARD: u8 = 1;
const STATE_REVERSE: u8 = 2;
const STATE_BRAKE: u8 = 3;

impl MotorState {
    /// Parse a state from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            STATE_IDLE => Some(MotorState::Idle),
            STATE_FORWARD => Some(MotorState::Forward),
            STATE_REVERSE => Some(MotorState::Reverse),
            STATE_BRAKE => Some(MotorState::Brake),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            MotorState::Idle => STATE_IDLE,
            MotorState::Forward => STATE_FORWARD,
            MotorState::Reverse => STATE_REVERSE,
            MotorState::Brake => STATE_BRAKE,
        }
    }

    /// Returns true for the two driving directions
    pub fn is_drive(self) -> bool {
        matches!(self, MotorState::Forward | MotorState::Reverse)
    }

    /// Returns true if switching from `self` to `other` flips relay polarity
    pub fn opposes(self, other: MotorState) -> bool {
        matches!(
            (self, other),
            (MotorState::Forward, MotorState::Reverse) | (MotorState::Reverse, MotorState::Forward)
        )
    }
}

/// A single motor instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorCommand {
    pub state: MotorState,
    /// Duty in percent (0-100)
    pub duty: u8,
}

impl MotorCommand {
    /// Create a command
    pub const fn new(state: MotorState, duty: u8) -> Self {
        Self { state, duty }
    }

    /// Relays open, zero duty
    pub const fn idle() -> Self {
        Self::new(MotorState::Idle, 0)
    }

    fn write(&self, out: &mut [u8]) {
        out[0] = self.state.to_byte();
        out[1] = self.duty;
    }

    fn read(bytes: &[u8]) -> Result<Self, SchemaError> {
        let state = MotorState::from_byte(bytes[0]).ok_or(SchemaError::InvalidState(bytes[0]))?;
        let duty = bytes[1];
        if duty > 100 {
            return Err(SchemaError::InvalidDuty(duty));
        }
        Ok(Self { state, duty })
    }
}

/// Commands for both motors, exchanged and applied as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorCommandPair {
    pub left: MotorCommand,
    pub right: MotorCommand,
}

impl MotorCommandPair {
    /// Create a pair
    pub const fn new(left: MotorCommand, right: MotorCommand) -> Self {
        Self { left, right }
    }

    /// Both motors idle
    pub const fn idle() -> Self {
        Self::new(MotorCommand::idle(), MotorCommand::idle())
    }

    /// Same command for both motors
    pub const fn both(command: MotorCommand) -> Self {
        Self::new(command, command)
    }

    fn write(&self, out: &mut [u8]) {
        self.left.write(&mut out[0..2]);
        self.right.write(&mut out[2..4]);
    }

    fn read(body: &[u8]) -> Result<Self, SchemaError> {
        if body.len() != PAIR_BODY_LEN {
            return Err(SchemaError::BadLength);
        }
        Ok(Self {
            left: MotorCommand::read(&body[0..2])?,
            right: MotorCommand::read(&body[2..4])?,
        })
    }
}

/// Well-known telemetry record identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryId {
    /// Left motor current in amps
    LeftCurrent,
    /// Right motor current in amps
    RightCurrent,
    /// Left motor speed pulse period in microseconds
    LeftPulse,
    /// Right motor speed pulse period in microseconds
    RightPulse,
    /// Number of ticks spent current limiting since boot
    LimitTicks,
}

impl TelemetryId {
    /// Wire id
    pub const fn id(self) -> i32 {
        match self {
            TelemetryId::LeftCurrent => 1,
            TelemetryId::RightCurrent => 2,
            TelemetryId::LeftPulse => 3,
            TelemetryId::RightPulse => 4,
            TelemetryId::LimitTicks => 5,
        }
    }

    /// Look up a well-known id
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(TelemetryId::LeftCurrent),
            2 => Some(TelemetryId::RightCurrent),
            3 => Some(TelemetryId::LeftPulse),
            4 => Some(TelemetryId::RightPulse),
            5 => Some(TelemetryId::LimitTicks),
            _ => None,
        }
    }
}

/// A single timestamped measurement
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Telemetry {
    /// Sender uptime in milliseconds
    pub timestamp: u32,
    /// Record identifier, see [`TelemetryId`]
    pub id: i32,
    pub value: f32,
}

impl Telemetry {
    /// Create a record for a well-known id
    pub fn new(timestamp: u32, id: TelemetryId, value: f32) -> Self {
        Self {
            timestamp,
            id: id.id(),
            value,
        }
    }

    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        out[4..8].copy_from_slice(&self.id.to_le_bytes());
        out[8..12].copy_from_slice(&self.value.to_le_bytes());
    }

    fn read(body: &[u8]) -> Result<Self, SchemaError> {
        if body.len() != TELEMETRY_BODY_LEN {
            return Err(SchemaError::BadLength);
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&body[0..4]);
        let timestamp = u32::from_le_bytes(word);
        word.copy_from_slice(&body[4..8]);
        let id = i32::from_le_bytes(word);
        word.copy_from_slice(&body[8..12]);
        let value = f32::from_le_bytes(word);
        Ok(Self {
            timestamp,
            id,
            value,
        })
    }
}

/// Every message that travels over the link
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// New target for both motors
    Command(MotorCommandPair),
    /// Applied state and duty of both motors
    Status(MotorCommandPair),
    /// Measurement record
    Telemetry(Telemetry),
}

impl Message {
    /// Serialize into a payload (not yet framed)
    pub fn to_payload(&self) -> Vec<u8, MAX_MESSAGE_LEN> {
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        buf[0] = PROTOCOL_VERSION;
        let len = match self {
            Message::Command(pair) => {
                buf[1] = MSG_COMMAND;
                pair.write(&mut buf[HEADER_LEN..]);
                HEADER_LEN + PAIR_BODY_LEN
            }
            Message::Status(pair) => {
                buf[1] = MSG_STATUS;
                pair.write(&mut buf[HEADER_LEN..]);
                HEADER_LEN + PAIR_BODY_LEN
            }
            Message::Telemetry(record) => {
                buf[1] = MSG_TELEMETRY;
                record.write(&mut buf[HEADER_LEN..]);
                HEADER_LEN + TELEMETRY_BODY_LEN
            }
        };

        let mut payload = Vec::new();
        // Capacity is MAX_MESSAGE_LEN and len never exceeds it
        let _ = payload.extend_from_slice(&buf[..len]);
        payload
    }

    /// Parse a message from a decoded frame payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, SchemaError> {
        if payload.len() < HEADER_LEN {
            return Err(SchemaError::Truncated);
        }
        if payload[0] != PROTOCOL_VERSION {
            return Err(SchemaError::UnsupportedVersion(payload[0]));
        }

        let body = &payload[HEADER_LEN..];
        match payload[1] {
            MSG_COMMAND => MotorCommandPair::read(body).map(Message::Command),
            MSG_STATUS => MotorCommandPair::read(body).map(Message::Status),
            MSG_TELEMETRY => Telemetry::read(body).map(Message::Telemetry),
            other => Err(SchemaError::UnknownType(other)),
        }
    }
}
