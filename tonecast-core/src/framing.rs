//! Frame layouts, packetization and the receive-side frame collector.
//!
//! Header frame, exactly 12 bytes on the wire before FEC:
//!
//! | bytes | field |
//! |-------|-------|
//! | 0-1   | magic `'N' '1'` |
//! | 2-3   | session id, u16 LE |
//! | 4-5   | payload length, u16 LE (post-compression/encryption) |
//! | 6-8   | original length, u24 LE (pre-compression, <= 16 MiB) |
//! | 9     | flags: bit0 compressed, bit1 encrypted, bits2-3 algo, bits4-7 zero |
//! | 10-11 | CRC-16 LE over bytes 0-9 |
//!
//! The data-frame count is not carried: both ends derive it from the
//! payload length and the frame-size rule, so the twelve bytes close
//! over every field a receiver needs.
//!
//! Data frame: magic `'D'` (1) | frame index u16 LE (2) | payload
//! (0-128) | CRC-16 LE (2) over the preceding bytes.

use std::collections::HashMap;

use crc::{Crc, CRC_16_IBM_3740};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compress::CompressionAlgo;
use crate::errors::{DecodeError, FrameError};

pub const HEADER_MAGIC: [u8; 2] = *b"N1";
pub const DATA_MAGIC: u8 = b'D';

/// Full header frame length including its CRC.
pub const HEADER_FRAME_LEN: usize = 12;

/// Data frame bytes beyond the payload: magic, index, CRC.
pub const DATA_FRAME_OVERHEAD: usize = 5;

/// Largest per-frame payload chunk.
pub const MAX_FRAME_PAYLOAD: usize = 128;

/// Upper bound of the 24-bit original-length field.
pub const MAX_ORIGINAL_LENGTH: usize = (1 << 24) - 1;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Chunk size for a transmission carrying `payload_len` bytes.
pub fn frame_size_for(payload_len: usize) -> usize {
    match payload_len {
        0..=32 => 32,
        33..=64 => 64,
        _ => MAX_FRAME_PAYLOAD,
    }
}

/// Parsed header fields. `total_frames` and per-frame sizes derive from
/// `payload_length`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub session_id: u16,
    pub payload_length: usize,
    pub original_length: usize,
    pub compressed: bool,
    pub encrypted: bool,
    pub algo: CompressionAlgo,
    pub crc_valid: bool,
}

impl HeaderInfo {
    pub fn frame_size(&self) -> usize {
        frame_size_for(self.payload_length)
    }

    /// Data frames in this session; an empty payload still ships one.
    pub fn total_frames(&self) -> usize {
        self.payload_length.div_ceil(self.frame_size()).max(1)
    }

    /// Payload bytes carried by frame `index`.
    pub fn payload_size_for(&self, index: usize) -> usize {
        let size = self.frame_size();
        self.payload_length.saturating_sub(index * size).min(size)
    }
}

/// One parsed data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub frame_index: u16,
    pub payload: Vec<u8>,
    pub crc_valid: bool,
}

/// Output of [`packetize`].
#[derive(Debug, Clone)]
pub struct Packetized {
    pub header: HeaderInfo,
    pub header_frame: [u8; HEADER_FRAME_LEN],
    pub data_frames: Vec<Vec<u8>>,
    pub session_id: u16,
}

fn build_header_frame(header: &HeaderInfo) -> [u8; HEADER_FRAME_LEN] {
    let mut frame = [0u8; HEADER_FRAME_LEN];
    frame[0..2].copy_from_slice(&HEADER_MAGIC);
    frame[2..4].copy_from_slice(&(header.session_id).to_le_bytes());
    frame[4..6].copy_from_slice(&(header.payload_length as u16).to_le_bytes());
    let original = header.original_length as u32;
    frame[6] = (original & 0xFF) as u8;
    frame[7] = ((original >> 8) & 0xFF) as u8;
    frame[8] = ((original >> 16) & 0xFF) as u8;
    frame[9] = (header.compressed as u8)
        | ((header.encrypted as u8) << 1)
        | (header.algo.tag() << 2);
    let crc = crc16(&frame[..10]);
    frame[10..12].copy_from_slice(&crc.to_le_bytes());
    frame
}

fn build_data_frame(index: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + DATA_FRAME_OVERHEAD);
    frame.push(DATA_MAGIC);
    frame.extend_from_slice(&index.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Split a payload into data frames and build the matching header with
/// a freshly drawn session id.
pub fn packetize(
    payload: &[u8],
    original_length: usize,
    compressed: bool,
    encrypted: bool,
    algo: CompressionAlgo,
) -> Result<Packetized, FrameError> {
    if payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u16::MAX as usize,
        });
    }
    if original_length > MAX_ORIGINAL_LENGTH {
        return Err(FrameError::FieldOutOfRange {
            field: "original_length",
        });
    }

    let session_id: u16 = rand::thread_rng().gen();
    let header = HeaderInfo {
        session_id,
        payload_length: payload.len(),
        original_length,
        compressed,
        encrypted,
        algo,
        crc_valid: true,
    };

    let frame_size = header.frame_size();
    let total = header.total_frames();
    let mut data_frames = Vec::with_capacity(total);
    for index in 0..total {
        let start = index * frame_size;
        let end = (start + frame_size).min(payload.len());
        data_frames.push(build_data_frame(index as u16, &payload[start..end]));
    }

    Ok(Packetized {
        header_frame: build_header_frame(&header),
        header,
        data_frames,
        session_id,
    })
}

/// Parse a header frame. `None` for wrong magic, wrong length or
/// malformed fields; a CRC mismatch is reported through `crc_valid`.
pub fn parse_header_frame(bytes: &[u8]) -> Option<HeaderInfo> {
    if bytes.len() != HEADER_FRAME_LEN || bytes[0..2] != HEADER_MAGIC {
        return None;
    }

    let flags = bytes[9];
    if flags & 0xF0 != 0 {
        return None;
    }
    let algo = CompressionAlgo::from_tag((flags >> 2) & 0b11)?;

    let stored_crc = u16::from_le_bytes([bytes[10], bytes[11]]);
    let crc_valid = stored_crc == crc16(&bytes[..10]);

    Some(HeaderInfo {
        session_id: u16::from_le_bytes([bytes[2], bytes[3]]),
        payload_length: u16::from_le_bytes([bytes[4], bytes[5]]) as usize,
        original_length: bytes[6] as usize | (bytes[7] as usize) << 8 | (bytes[8] as usize) << 16,
        compressed: flags & 0b01 != 0,
        encrypted: flags & 0b10 != 0,
        algo,
        crc_valid,
    })
}

/// Parse a data frame of known payload length.
pub fn parse_data_frame(bytes: &[u8]) -> Option<DataFrame> {
    if bytes.len() < DATA_FRAME_OVERHEAD || bytes[0] != DATA_MAGIC {
        return None;
    }

    let crc_at = bytes.len() - 2;
    let stored_crc = u16::from_le_bytes([bytes[crc_at], bytes[crc_at + 1]]);
    Some(DataFrame {
        frame_index: u16::from_le_bytes([bytes[1], bytes[2]]),
        payload: bytes[3..crc_at].to_vec(),
        crc_valid: stored_crc == crc16(&bytes[..crc_at]),
    })
}

/// Receive-side collector binding data frames to one header/session.
/// The first successful decode of an index wins; duplicates are dropped.
#[derive(Debug, Default)]
pub struct FrameCollector {
    header: Option<HeaderInfo>,
    frames: HashMap<u16, Vec<u8>>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Option<&HeaderInfo> {
        self.header.as_ref()
    }

    /// Install the session header. Idempotent for the same session;
    /// a different session id is rejected.
    pub fn set_header(&mut self, header: HeaderInfo) -> Result<(), FrameError> {
        match &self.header {
            None => {
                self.header = Some(header);
                Ok(())
            }
            Some(existing) if existing.session_id == header.session_id => Ok(()),
            Some(existing) => Err(FrameError::SessionConflict {
                expected: existing.session_id,
                got: header.session_id,
            }),
        }
    }

    /// Record one decoded frame. Returns true when newly stored, false
    /// for duplicates; frames from another session are rejected.
    pub fn add_frame(
        &mut self,
        index: u16,
        payload: Vec<u8>,
        session_id: u16,
    ) -> Result<bool, DecodeError> {
        let header = self.header.as_ref().ok_or(DecodeError::InvalidHeader)?;
        if session_id != header.session_id {
            return Err(DecodeError::SessionMismatch {
                expected: header.session_id,
                got: session_id,
            });
        }
        if index as usize >= header.total_frames() {
            return Ok(false);
        }
        if self.frames.contains_key(&index) {
            return Ok(false);
        }
        self.frames.insert(index, payload);
        Ok(true)
    }

    pub fn frames_received(&self) -> usize {
        self.frames.len()
    }

    /// All indices 0..total_frames present.
    pub fn is_complete(&self) -> bool {
        match &self.header {
            Some(header) => self.frames.len() == header.total_frames(),
            None => false,
        }
    }

    /// Concatenate payloads by ascending index. The result must match
    /// the header's payload length exactly.
    pub fn reassemble(&self) -> Result<Vec<u8>, DecodeError> {
        let header = self.header.as_ref().ok_or(DecodeError::InvalidHeader)?;
        let mut payload = Vec::with_capacity(header.payload_length);
        for index in 0..header.total_frames() as u16 {
            let frame = self.frames.get(&index).ok_or(DecodeError::ReassemblyFailed {
                expected: header.payload_length,
                actual: payload.len(),
            })?;
            payload.extend_from_slice(frame);
        }
        if payload.len() != header.payload_length {
            return Err(DecodeError::ReassemblyFailed {
                expected: header.payload_length,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }

    pub fn clear(&mut self) {
        self.header = None;
        self.frames.clear();
    }
}
