//! Frame encoding and reassembly for the gatelink wire protocol.
//!
//! Every message travels in one frame:
//!
//! ```text
//! +-------+------------------------+----------------------+
//! | flags | length (24-bit, BE)    | payload (length)     |
//! +-------+------------------------+----------------------+
//!   1 byte        3 bytes
//! ```
//!
//! Bit 0 of `flags` marks a cipher-scrambled payload. The length is
//! recomputed from the built header and checked against the payload before a
//! frame leaves [`encode_frame`]; a mismatch means a local codec or cipher
//! bug and is logged with a diagnostic dump.

use crate::FRAME_HEADER_SIZE;
use crate::error::FrameError;

/// Largest payload the 24-bit length field can describe.
pub const MAX_FRAME_PAYLOAD: usize = 0x00FF_FFFF;

/// Frame flags bitmap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Payload is scrambled with the link cipher
    pub const ENCRYPTED: u8 = 0b0000_0001;

    /// Create new empty flags
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Wrap a raw flags byte
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        Self(value)
    }

    /// Add ENCRYPTED flag
    #[must_use]
    pub fn with_encrypted(mut self) -> Self {
        self.0 |= Self::ENCRYPTED;
        self
    }

    /// Check if ENCRYPTED is set
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }

    /// Get raw byte value
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Read the 24-bit big-endian length from a frame header.
#[must_use]
pub fn header_length(header: &[u8; FRAME_HEADER_SIZE]) -> usize {
    (usize::from(header[1]) << 16) | (usize::from(header[2]) << 8) | usize::from(header[3])
}

/// Build a complete frame (header + payload).
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] when the payload cannot be
/// described by the length field and [`FrameError::LengthMismatch`] if the
/// header fails verification.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_frame(flags: FrameFlags, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = payload.len();
    let header = [
        flags.as_u8(),
        (len >> 16) as u8,
        (len >> 8) as u8,
        len as u8,
    ];

    let declared = header_length(&header);
    if declared != len {
        tracing::error!(
            flags = flags.as_u8(),
            declared,
            payload_len = len,
            header = %hex_excerpt(&header, 0, FRAME_HEADER_SIZE),
            payload_head = %hex_excerpt(payload, 0, 16),
            payload_tail = %hex_excerpt(payload, len.saturating_sub(16), 16),
            "encoded frame length mismatch, dumping debug state"
        );
        if len > MAX_FRAME_PAYLOAD {
            return Err(FrameError::PayloadTooLarge(len));
        }
        return Err(FrameError::LengthMismatch {
            declared,
            actual: len,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + len);
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Hex rendering of up to `len` bytes of `data` starting at `offset`.
///
/// Out-of-range requests are clipped rather than rejected so the helper is
/// safe to use while dumping a corrupted buffer.
#[must_use]
pub fn hex_excerpt(data: &[u8], offset: usize, len: usize) -> String {
    let start = offset.min(data.len());
    let end = start.saturating_add(len).min(data.len());
    let mut out = String::with_capacity((end - start) * 3);
    for (i, b) in data[start..end].iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// One complete frame peeled off the read stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Header flags
    pub flags: FrameFlags,
    /// Declared (and actual) payload length
    pub declared_len: usize,
    /// Payload bytes
    pub payload: Vec<u8>,
}

/// Accumulates stream bytes and yields complete frames.
///
/// Bytes arrive in arbitrary chunks; [`FrameAssembler::next_frame`] returns
/// `Ok(None)` until a whole frame is buffered.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    max_payload: usize,
}

impl FrameAssembler {
    /// Create an assembler accepting payloads up to `max_payload` bytes
    /// (clamped to [`MAX_FRAME_PAYLOAD`]).
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_payload: max_payload.min(MAX_FRAME_PAYLOAD),
        }
    }

    /// Append newly read bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as frames.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffered bytes not yet returned as frames.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Peel one complete frame off the front of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidLength`] for a zero or oversized declared
    /// length. The stream cannot be resynchronized after this.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, FrameError> {
        let Some(header) = self.buffer.first_chunk::<FRAME_HEADER_SIZE>() else {
            return Ok(None);
        };

        let declared_len = header_length(header);
        if declared_len == 0 || declared_len > self.max_payload {
            return Err(FrameError::InvalidLength {
                length: declared_len,
                max: self.max_payload,
            });
        }

        let total = FRAME_HEADER_SIZE + declared_len;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let flags = FrameFlags::from_u8(header[0]);
        let payload = self.buffer[FRAME_HEADER_SIZE..total].to_vec();
        self.buffer.drain(..total);

        Ok(Some(RawFrame {
            flags,
            declared_len,
            payload,
        }))
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(MAX_FRAME_PAYLOAD)
    }
}
