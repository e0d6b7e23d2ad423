//! Frame encoding and decoding for the inter-board protocol.
//!
//! Frame format:
//! - START (1 byte): 0xAA synchronization byte
//! - PAYLOAD (0-1024 bytes before stuffing): message bytes, with every byte
//!   equal to START, END or ESCAPE preceded by ESCAPE
//! - END (1 byte): 0xBB terminator
//!
//! Decoding is resumable one byte at a time and never fails: malformed or
//! oversized frames are dropped, counted in [`DecoderStats`], and the decoder
//! resynchronizes on the next START.

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0xAA;

/// Frame terminator byte
pub const FRAME_END: u8 = 0xBB;

/// Escape prefix for payload bytes that collide with a marker
pub const FRAME_ESCAPE: u8 = 0xCC;

/// Maximum payload length in bytes (before stuffing)
pub const MAX_FRAME_LEN: usize = 1024;

/// Worst-case encoded size: every payload byte escaped plus START and END
pub const MAX_ENCODED_LEN: usize = 2 * MAX_FRAME_LEN + 2;

/// Errors that can occur while encoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds [`MAX_FRAME_LEN`]
    PayloadTooLarge,
    /// Output buffer too small for the stuffed frame
    BufferTooSmall,
}

#[inline]
fn is_marker(byte: u8) -> bool {
    matches!(byte, FRAME_START | FRAME_END | FRAME_ESCAPE)
}

/// Number of bytes `payload` occupies once framed and stuffed
pub fn encoded_len(payload: &[u8]) -> usize {
    2 + payload.len() + payload.iter().filter(|&&b| is_marker(b)).count()
}

/// Encode `payload` into `buffer`
///
/// Returns the number of bytes written.
pub fn encode(payload: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::PayloadTooLarge);
    }
    if buffer.len() < encoded_len(payload) {
        return Err(FrameError::BufferTooSmall);
    }

    let mut pos = 0;
    buffer[pos] = FRAME_START;
    pos += 1;

    for &byte in payload {
        if is_marker(byte) {
            buffer[pos] = FRAME_ESCAPE;
            pos += 1;
        }
        buffer[pos] = byte;
        pos += 1;
    }

    buffer[pos] = FRAME_END;
    Ok(pos + 1)
}

/// Encode `payload` into a bounded heapless Vec
///
/// `N` only needs to cover the frames actually sent; message-sized buffers
/// are far smaller than [`MAX_ENCODED_LEN`].
pub fn encode_to_vec<const N: usize>(payload: &[u8]) -> Result<Vec<u8, N>, FrameError> {
    let len = encoded_len(payload);
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::PayloadTooLarge);
    }
    if len > N {
        return Err(FrameError::BufferTooSmall);
    }

    let mut vec = Vec::new();
    // Length checked above, resize cannot fail
    vec.resize(len, 0).map_err(|_| FrameError::BufferTooSmall)?;
    encode(payload, &mut vec)?;
    Ok(vec)
}

/// Decoder drop/delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderStats {
    /// Complete frames handed to the consumer
    pub frames: u32,
    /// Frames discarded for exceeding [`MAX_FRAME_LEN`]
    pub oversized: u32,
    /// Partial frames abandoned because a new START arrived
    pub resyncs: u32,
    /// Bytes ignored while waiting for START
    pub idle_bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for START byte
    WaitStart,
    /// Accumulating payload bytes
    InFrame,
    /// Previous byte was ESCAPE; next byte is stored literally
    Escaped,
}

/// Byte-at-a-time frame decoder
///
/// The accumulation buffer persists across calls, so bytes may arrive in any
/// chunking. A completed payload is borrowed from the decoder and stays valid
/// until the next byte is fed.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    buffer: Vec<u8, MAX_FRAME_LEN>,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder waiting for START
    pub const fn new() -> Self {
        Self {
            state: DecodeState::WaitStart,
            buffer: Vec::new(),
            stats: DecoderStats {
                frames: 0,
                oversized: 0,
                resyncs: 0,
                idle_bytes: 0,
            },
        }
    }

    /// Drop any partial frame and wait for the next START
    pub fn reset(&mut self) {
        self.state = DecodeState::WaitStart;
        self.buffer.clear();
    }

    /// Drop/delivery counters since construction
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Whether the decoder is in the middle of a frame
    pub fn in_frame(&self) -> bool {
        self.state != DecodeState::WaitStart
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns the payload when this byte completes a frame.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        match self.state {
            DecodeState::WaitStart => {
                if byte == FRAME_START {
                    self.buffer.clear();
                    self.state = DecodeState::InFrame;
                } else {
                    // Silently ignore bytes outside a frame
                    self.stats.idle_bytes = self.stats.idle_bytes.wrapping_add(1);
                }
                None
            }
            DecodeState::InFrame => match byte {
                FRAME_START => {
                    if !self.buffer.is_empty() {
                        self.stats.resyncs = self.stats.resyncs.wrapping_add(1);
                    }
                    self.buffer.clear();
                    None
                }
                FRAME_ESCAPE => {
                    self.state = DecodeState::Escaped;
                    None
                }
                FRAME_END => {
                    self.state = DecodeState::WaitStart;
                    self.stats.frames = self.stats.frames.wrapping_add(1);
                    Some(self.buffer.as_slice())
                }
                _ => {
                    self.push(byte);
                    None
                }
            },
            DecodeState::Escaped => {
                self.state = DecodeState::InFrame;
                self.push(byte);
                None
            }
        }
    }

    /// Feed a chunk of bytes, handing every completed payload to `consumer`
    ///
    /// Returns the number of frames delivered.
    pub fn feed_with<F>(&mut self, bytes: &[u8], mut consumer: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let mut delivered = 0;
        for &byte in bytes {
            if let Some(payload) = self.feed(byte) {
                consumer(payload);
                delivered += 1;
            }
        }
        delivered
    }

    fn push(&mut self, byte: u8) {
        if self.buffer.push(byte).is_err() {
            self.stats.oversized = self.stats.oversized.wrapping_add(1);
            self.reset();
        }
    }
}
