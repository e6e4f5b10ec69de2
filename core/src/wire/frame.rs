use thiserror::Error;

use super::netinfo::{NetInfo, UnknownNetInfo};

/// Every wire record is exactly this many bytes (spec I1, §6 `L = 32768`).
pub const FRAME_SIZE: usize = 32_768;

const HEADER_SIZE: usize = 1 /* net_info */ + 1 /* msg_type */ + 4 /* payload len */;

/// Largest payload a single frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = FRAME_SIZE - HEADER_SIZE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is {0} bytes, expected exactly {FRAME_SIZE}")]
    WrongLength(usize),
    #[error("unrecognized net_info byte")]
    UnknownNetInfo(#[from] UnknownNetInfo),
    #[error("payload of {0} bytes exceeds the {MAX_FRAME_PAYLOAD}-byte frame budget")]
    PayloadTooLarge(usize),
    #[error("declared payload length {declared} does not fit the frame ({available} bytes available)")]
    DeclaredLengthOverflow { declared: usize, available: usize },
}

/// A single framed record, replacing the original `net_info|msg_type|payload`
/// pipe-delimited string join with a length-prefixed binary layout (Design
/// Notes: "string-delimited framing ... re-architect to a length-prefixed
/// binary frame of exactly `L` bytes").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub net_info: NetInfo,
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(net_info: NetInfo, msg_type: u8, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { net_info, msg_type, payload })
    }

    /// Serialize to exactly [`FRAME_SIZE`] bytes, zero-filling the unused tail.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        buf[0] = self.net_info.into();
        buf[1] = self.msg_type;
        let len = self.payload.len() as u32;
        buf[2..6].copy_from_slice(&len.to_be_bytes());
        buf[HEADER_SIZE..HEADER_SIZE + self.payload.len()].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a frame. Any malformation (wrong length, unknown `net_info`,
    /// an over-long declared payload) is a [`FrameError`], which callers
    /// drop silently per spec §7's `MalformedFrame` policy.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_SIZE {
            return Err(FrameError::WrongLength(bytes.len()));
        }
        let net_info = NetInfo::try_from(bytes[0])?;
        let msg_type = bytes[1];
        let len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(FrameError::DeclaredLengthOverflow {
                declared: len,
                available: MAX_FRAME_PAYLOAD,
            });
        }
        let payload = bytes[HEADER_SIZE..HEADER_SIZE + len].to_vec();
        Ok(Self { net_info, msg_type, payload })
    }
}
