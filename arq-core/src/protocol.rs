//! ARQ wire frames, constants, and the integrity checksum
//!
//! # Wire format
//!
//! Frames are textual and colon-delimited, five fields in fixed order:
//!
//! ```text
//! seq:ack:checksum:kind:payload
//! ```
//!
//! Numbers are decimal ASCII. `kind` is `data` or `error`. The payload is the
//! unsplit remainder of the datagram, so it may itself contain colons or any
//! other bytes.

use crate::error::{ArqCoreError, ArqCoreResult};
use bytes::{BufMut, Bytes, BytesMut};
use std::str::FromStr;

/// ARQ protocol constants
pub mod constants {
    pub const FIELD_DELIMITER: u8 = b':'; // field separator on the wire
    pub const FIELD_COUNT: usize = 5; // seq, ack, checksum, kind, payload
    pub const KIND_DATA: &str = "data";
    pub const KIND_ERROR: &str = "error";
    pub const END_OF_STREAM: &[u8] = b"END"; // default end-of-stream marker
    pub const ERROR_PAYLOAD: &[u8] = b"Error: Data corrupted";
    pub const DEFAULT_WINDOW_SIZE: u32 = 5; // flow-control window, frames
    pub const DEFAULT_SSTHRESH: f64 = 64.0; // initial slow start threshold
    pub const DUP_ACK_THRESHOLD: u32 = 3; // duplicate ACKs before fast retransmit
    pub const MIN_CWND: f64 = 1.0;
    pub const MIN_SSTHRESH: f64 = 1.0;
    pub const MAX_DATAGRAM: usize = 65_535;
    pub const LINGER_TIMEOUTS: u32 = 3; // default receiver linger, in timeouts
}

/// Sequence number type
pub type SeqNum = u32;

/// Frame kind carried in the fourth wire field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Regular data or acknowledgment
    Data,
    /// Substitute emitted by a corrupting channel
    Error,
}

impl FrameKind {
    /// Wire spelling of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Data => constants::KIND_DATA,
            FrameKind::Error => constants::KIND_ERROR,
        }
    }

    fn parse(field: &[u8]) -> ArqCoreResult<Self> {
        match field {
            b"data" => Ok(FrameKind::Data),
            b"error" => Ok(FrameKind::Error),
            other => Err(ArqCoreError::malformed(format!(
                "unknown frame kind {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// One protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: SeqNum,
    pub ack: SeqNum,
    pub checksum: u8,
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl Frame {
    /// Create a data frame with a freshly computed checksum
    pub fn data(seq: SeqNum, payload: Bytes) -> Self {
        Self {
            seq,
            ack: 0,
            checksum: checksum_of(&payload),
            kind: FrameKind::Data,
            payload,
        }
    }

    /// Create a pure acknowledgment (empty payload)
    pub fn ack(ack: SeqNum) -> Self {
        Self {
            seq: 0,
            ack,
            checksum: 0,
            kind: FrameKind::Data,
            payload: Bytes::new(),
        }
    }

    /// Create the error-kind frame a corrupting channel substitutes
    pub fn error(seq: SeqNum, ack: SeqNum) -> Self {
        let payload = Bytes::from_static(constants::ERROR_PAYLOAD);
        Self {
            seq,
            ack,
            checksum: checksum_of(&payload),
            kind: FrameKind::Error,
            payload,
        }
    }

    /// Encode frame into buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        let header = format!(
            "{}:{}:{}:{}:",
            self.seq,
            self.ack,
            self.checksum,
            self.kind.as_str()
        );
        buf.reserve(header.len() + self.payload.len());
        buf.put_slice(header.as_bytes());
        buf.put_slice(&self.payload);
    }

    /// Encode frame into a new buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_hint());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode frame from a received datagram
    pub fn decode(buf: Bytes) -> ArqCoreResult<Self> {
        let mut bounds = [0usize; constants::FIELD_COUNT - 1];
        let mut found = 0;
        for (i, b) in buf.iter().enumerate() {
            if *b == constants::FIELD_DELIMITER {
                bounds[found] = i;
                found += 1;
                if found == bounds.len() {
                    break;
                }
            }
        }

        if found < bounds.len() {
            return Err(ArqCoreError::malformed(format!(
                "expected {} fields, found {}",
                constants::FIELD_COUNT,
                found + 1
            )));
        }

        let seq = parse_field::<SeqNum>(&buf[..bounds[0]], "sequence number")?;
        let ack = parse_field::<SeqNum>(&buf[bounds[0] + 1..bounds[1]], "acknowledgment number")?;
        let checksum = parse_field::<u8>(&buf[bounds[1] + 1..bounds[2]], "checksum")?;
        let kind = FrameKind::parse(&buf[bounds[2] + 1..bounds[3]])?;
        let payload = buf.slice(bounds[3] + 1..);

        Ok(Self {
            seq,
            ack,
            checksum,
            kind,
            payload,
        })
    }

    /// `true` if the checksum does not match or the frame is an error substitute
    pub fn is_corrupt(&self) -> bool {
        is_corrupt(self)
    }

    /// `Err(CorruptFrame)` when the frame fails the integrity check
    pub fn check(&self) -> ArqCoreResult<()> {
        if self.is_corrupt() {
            Err(ArqCoreError::CorruptFrame { seq: self.seq })
        } else {
            Ok(())
        }
    }

    /// Pure acknowledgments carry no payload
    pub fn is_ack(&self) -> bool {
        self.payload.is_empty()
    }

    /// `true` if the payload equals the given end-of-stream marker
    pub fn is_end_of_stream(&self, marker: &[u8]) -> bool {
        self.payload.as_ref() == marker
    }

    /// Upper bound on the encoded size, used for buffer preallocation
    pub fn size_hint(&self) -> usize {
        // three u32-ish decimals, a u8, the longest kind and four delimiters
        10 + 10 + 3 + 5 + 4 + self.payload.len()
    }
}

/// Sum of payload bytes modulo 256
pub fn checksum_of(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Checksum mismatch or explicit error-kind frame
pub fn is_corrupt(frame: &Frame) -> bool {
    frame.kind == FrameKind::Error || checksum_of(&frame.payload) != frame.checksum
}

fn parse_field<T: FromStr>(field: &[u8], name: &str) -> ArqCoreResult<T> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| {
            ArqCoreError::malformed(format!(
                "unparseable {name} {:?}",
                String::from_utf8_lossy(field)
            ))
        })
}
