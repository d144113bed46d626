//! Wire-format definitions for protocol frames.
//!
//! Every datagram exchanged between sender and receiver is a [`Frame`].
//! This module is responsible for:
//! - Defining the on-wire binary layout (header fields, payload).
//! - Serialising a [`Frame`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Frame`], returning errors
//!   for truncated, malformed, or corrupted input.
//! - Classifying a decoded frame as data or acknowledgment ([`Message`]).
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  offset  0                               8
//!         +--------------------------------+--------------------------------+
//!         |          seq_no (i64)          |       seq_expected (i64)       |
//!         +----------------+---------------+--------------------------------+
//!  16     |   size (u32)   | checksum (u32)|          payload ...           |
//!         +----------------+---------------+--------------------------------+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 24 bytes.
//! `seq_no` is −1 on acknowledgments; `seq_expected` is −1 on data frames.
//! `size` always equals header + payload length.  The checksum is a CRC-32
//! over the entire frame image with the checksum field zeroed.

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 24;

/// Maximum payload bytes carried by one data frame (one file chunk).
pub const MAX_PAYLOAD: usize = 1024;

/// Largest datagram either side ever produces.
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_EXPECTED: usize = 8;
const OFF_SIZE: usize = 16;
const OFF_CHECKSUM: usize = 20;

/// A protocol frame: fixed header plus payload bytes.
///
/// One wire layout serves both logical variants; use [`Frame::message`] to
/// obtain the decoded sum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based chunk index for data frames; −1 on acknowledgments.
    pub seq_no: i64,
    /// Next sequence number the receiver expects (cumulative ack);
    /// −1 on data frames.
    pub seq_expected: i64,
    /// Chunk bytes.  Empty on acknowledgments and on the terminal data frame.
    pub payload: Vec<u8>,
}

/// A frame classified at the codec boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A file chunk.  An empty payload is the terminal (end-of-stream) frame.
    Data { seq: i64, payload: Vec<u8> },
    /// Cumulative acknowledgment: everything before `expected` has arrived.
    Ack { expected: i64 },
}

impl Frame {
    /// Build a data frame carrying one file chunk.
    ///
    /// An empty `payload` produces the terminal frame.
    ///
    /// # Panics
    ///
    /// Panics if `payload` exceeds [`MAX_PAYLOAD`] — chunking is the
    /// caller's job.
    pub fn data(seq_no: i64, payload: Vec<u8>) -> Self {
        assert!(
            payload.len() <= MAX_PAYLOAD,
            "payload of {} bytes exceeds chunk size {MAX_PAYLOAD}",
            payload.len()
        );
        Self {
            seq_no,
            seq_expected: -1,
            payload,
        }
    }

    /// Build an acknowledgment naming the next expected sequence number.
    pub fn ack(expected: i64) -> Self {
        Self {
            seq_no: -1,
            seq_expected: expected,
            payload: Vec::new(),
        }
    }

    /// Total frame length on the wire (header + payload).
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialise this frame into a newly allocated byte vector.
    ///
    /// The `size` field is computed from the actual payload length and the
    /// checksum is computed last, over the image with its field zeroed.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_len()];

        buf[OFF_SEQ..OFF_SEQ + 8].copy_from_slice(&self.seq_no.to_be_bytes());
        buf[OFF_EXPECTED..OFF_EXPECTED + 8].copy_from_slice(&self.seq_expected.to_be_bytes());
        buf[OFF_SIZE..OFF_SIZE + 4].copy_from_slice(&(self.wire_len() as u32).to_be_bytes());
        // Checksum field stays zero while the checksum is computed.
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        let csum = checksum_of(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&csum.to_be_bytes());

        buf
    }

    /// Parse a [`Frame`] from a raw datagram.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the `size` field disagrees with `buf.len()` (truncated or padded
    ///   datagram), or
    /// - the checksum does not verify.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::TooShort { len: buf.len() });
        }

        let seq_no = i64::from_be_bytes(buf[OFF_SEQ..OFF_SEQ + 8].try_into().unwrap());
        let seq_expected =
            i64::from_be_bytes(buf[OFF_EXPECTED..OFF_EXPECTED + 8].try_into().unwrap());
        let size = u32::from_be_bytes(buf[OFF_SIZE..OFF_SIZE + 4].try_into().unwrap());
        let checksum = u32::from_be_bytes(buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].try_into().unwrap());

        if size as usize != buf.len() {
            return Err(FrameError::SizeMismatch {
                declared: size,
                actual: buf.len(),
            });
        }

        if checksum_of_zeroed(buf) != checksum {
            return Err(FrameError::ChecksumFailed);
        }

        Ok(Self {
            seq_no,
            seq_expected,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// Classify this frame: `seq_no < 0` marks an acknowledgment.
    pub fn message(self) -> Message {
        if self.seq_no < 0 {
            Message::Ack {
                expected: self.seq_expected,
            }
        } else {
            Message::Data {
                seq: self.seq_no,
                payload: self.payload,
            }
        }
    }
}

/// Errors that can arise when parsing a raw datagram.
///
/// None of these are fatal to a transfer — the engines treat an undecodable
/// frame exactly like a lost one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("datagram of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    TooShort { len: usize },
    #[error("size field declares {declared} bytes but datagram holds {actual}")]
    SizeMismatch { declared: u32, actual: usize },
    #[error("checksum verification failed")]
    ChecksumFailed,
}

/// CRC-32 over a frame image whose checksum field is already zero.
fn checksum_of(buf: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(buf);
    hasher.finalize()
}

/// CRC-32 over a frame image, treating the stored checksum field as zero.
fn checksum_of_zeroed(buf: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[..OFF_CHECKSUM]);
    hasher.update(&[0u8; 4]);
    hasher.update(&buf[OFF_CHECKSUM + 4..]);
    hasher.finalize()
}
