//! Inter-board Communication Protocol
//!
//! This crate defines the UART-based protocol between the input board (joystick,
//! buttons, mode selection) and the actuator board (motor drivers). The protocol
//! is designed to survive line noise, partial frames and link loss.
//!
//! # Protocol Overview
//!
//! Messages are byte-stuffed between start and end markers:
//! ```text
//! ┌───────┬──────────────────────────────┬─────┐
//! │ START │ PAYLOAD (escaped)            │ END │
//! │ 0xAA  │ 0–1024B before stuffing      │ 0xBB│
//! └───────┴──────────────────────────────┴─────┘
//! ```
//!
//! Any payload byte equal to a marker is preceded by ESCAPE (0xCC). The payload
//! itself carries a version byte and a message type, see [`messages`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod frame;
pub mod messages;

pub use frame::{
    encode, encode_to_vec, encoded_len, DecoderStats, FrameDecoder, FrameError, FRAME_END,
    FRAME_ESCAPE, FRAME_START, MAX_ENCODED_LEN, MAX_FRAME_LEN,
};
pub use messages::{
    Message, MotorCommand, MotorCommandPair, MotorState, SchemaError, Telemetry, TelemetryId,
    MAX_MESSAGE_LEN, PROTOCOL_VERSION,
};
