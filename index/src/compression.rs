//! Framing and compression of store snapshot payloads.
//!
//! ```text
//! codec: u8 | decoded length: u32 LE | body
//! ```
//!
//! `codec` is 0 when the body is stored as is and 1 when it is zstd. Payloads
//! that zstd does not shrink are stored even when compression is configured,
//! so tiny indexes never pay for a zstd frame.

use crate::error::StorageError;
use crate::error::StorageResult;
use serde::Deserialize;
use serde::Serialize;

const CODEC_STORED: u8 = 0;
const CODEC_ZSTD: u8 = 1;
const FRAME_HEADER_LEN: usize = 5;

/// How hard snapshots are compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Store payloads uncompressed
    Off,
    Fast,
    #[default]
    Balanced,
    Maximum,
    /// Explicit zstd level, clamped to 1..=22
    Custom(i32),
}

impl CompressionLevel {
    /// Zstd level to use, `None` when payloads are stored
    pub fn zstd_level(self) -> Option<i32> {
        match self {
            Self::Off => None,
            Self::Fast => Some(1),
            Self::Balanced => Some(3),
            Self::Maximum => Some(9),
            Self::Custom(level) => Some(level.clamp(1, 22)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: CompressionLevel,
}

impl Compressor {
    pub const fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub const fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Frame `data`, compressed when that makes it smaller
    pub fn pack(&self, data: &[u8]) -> StorageResult<Vec<u8>> {
        let decoded_len = u32::try_from(data.len()).map_err(|_| {
            StorageError::Compression(format!("payload of {} bytes is too large", data.len()))
        })?;
        let compressed = match self.level.zstd_level() {
            Some(level) => Some(
                zstd::bulk::compress(data, level)
                    .map_err(|e| StorageError::Compression(e.to_string()))?,
            ),
            None => None,
        };
        let (codec, body) = match &compressed {
            Some(body) if body.len() < data.len() => (CODEC_ZSTD, body.as_slice()),
            _ => (CODEC_STORED, data),
        };

        let mut framed = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        framed.push(codec);
        framed.extend_from_slice(&decoded_len.to_le_bytes());
        framed.extend_from_slice(body);
        Ok(framed)
    }

    /// Decode a frame written by [`Compressor::pack`], whatever its level
    pub fn unpack(framed: &[u8]) -> StorageResult<Vec<u8>> {
        if framed.len() < FRAME_HEADER_LEN {
            return Err(StorageError::Corrupted(format!(
                "payload frame of {} bytes",
                framed.len()
            )));
        }
        let decoded_len = u32::from_le_bytes([framed[1], framed[2], framed[3], framed[4]]) as usize;
        let body = &framed[FRAME_HEADER_LEN..];

        let data = match framed[0] {
            CODEC_STORED => body.to_vec(),
            CODEC_ZSTD => zstd::bulk::decompress(body, decoded_len)
                .map_err(|e| StorageError::Compression(e.to_string()))?,
            codec => {
                return Err(StorageError::Corrupted(format!(
                    "unknown payload codec {codec}"
                )));
            }
        };
        if data.len() != decoded_len {
            return Err(StorageError::Corrupted(format!(
                "payload decoded to {} bytes, frame says {decoded_len}",
                data.len()
            )));
        }
        Ok(data)
    }

    /// Whether a frame holds a zstd body
    pub fn is_compressed(framed: &[u8]) -> bool {
        framed.first() == Some(&CODEC_ZSTD)
    }
}
