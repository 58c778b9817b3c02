//! Chunk metadata wire format.
//!
//! Every chunk of an oversized command is replicated as an ordinary log
//! entry whose `extensions` field starts with a [`ChunkInfoHeader`]. The
//! bytes after the header are the caller's trailing extension, carried only
//! on the final chunk and handed to the application once the command has
//! been rebuilt.
//!
//! The header is `#[repr(C, packed)]` with big-endian integers so the
//! encoding is byte-exact on every replica regardless of architecture.
//! Changing anything here breaks replicas that still hold chunks in flight.

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Chunk Info Header ────────────────────────────────────────────────────────

/// Fixed prefix of a chunked entry's extensions.
///
/// Wire size: 22 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ChunkInfoHeader {
    /// Always [`CHUNK_INFO_MAGIC`]. Entries whose extensions do not start
    /// with it are not chunks and pass straight through.
    pub magic: [u8; 4],

    /// Wire format version. Currently 0x01.
    pub version: u8,

    /// Reserved, must be zero.
    pub flags: u8,

    /// Random identifier shared by every chunk of one command. Never zero.
    pub op_id: U64<BigEndian>,

    /// Zero-based position of this chunk within the command.
    pub sequence: U32<BigEndian>,

    /// Number of chunks the command was split into.
    pub total: U32<BigEndian>,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(ChunkInfoHeader, [u8; 22]);

// ── Chunk Info ───────────────────────────────────────────────────────────────

/// Decoded chunk metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub op_id: u64,
    pub sequence: u32,
    pub total: u32,
    /// Trailing extension. Only meaningful when `sequence == total - 1`.
    pub next_extensions: Bytes,
}

impl ChunkInfo {
    /// True if `raw` claims to carry chunk metadata. A claim is not a
    /// guarantee: [`ChunkInfo::decode`] may still reject it.
    pub fn is_tagged(raw: &[u8]) -> bool {
        raw.starts_with(&CHUNK_INFO_MAGIC)
    }

    pub fn is_final(&self) -> bool {
        self.total > 0 && self.sequence == self.total - 1
    }

    /// Encode header plus trailing extension.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        if self.total == 0 {
            return Err(WireError::ZeroTotal);
        }
        if self.sequence >= self.total {
            return Err(WireError::SequenceOutOfRange {
                sequence: self.sequence,
                total: self.total,
            });
        }

        let header = ChunkInfoHeader {
            magic: CHUNK_INFO_MAGIC,
            version: CHUNK_INFO_VERSION,
            flags: 0,
            op_id: U64::new(self.op_id),
            sequence: U32::new(self.sequence),
            total: U32::new(self.total),
        };

        let mut out = BytesMut::with_capacity(CHUNK_INFO_HEADER_LEN + self.next_extensions.len());
        out.put_slice(header.as_bytes());
        out.put_slice(&self.next_extensions);
        Ok(out.freeze())
    }

    /// Decode chunk metadata from an entry's extensions.
    ///
    /// Sequence numbers are not checked against the total here;
    /// sequencing is the reassembler's job.
    pub fn decode(raw: &Bytes) -> Result<Self, WireError> {
        if raw.len() < CHUNK_INFO_HEADER_LEN {
            return Err(WireError::Truncated(raw.len()));
        }
        let header = ChunkInfoHeader::read_from_prefix(&raw[..CHUNK_INFO_HEADER_LEN])
            .ok_or(WireError::Truncated(raw.len()))?;

        if header.magic != CHUNK_INFO_MAGIC {
            return Err(WireError::BadMagic(header.magic));
        }
        if header.version != CHUNK_INFO_VERSION {
            return Err(WireError::UnknownVersion(header.version));
        }
        if header.flags != 0 {
            return Err(WireError::ReservedFlagsSet(header.flags));
        }

        let total = header.total.get();
        if total == 0 {
            return Err(WireError::ZeroTotal);
        }

        Ok(Self {
            op_id: header.op_id.get(),
            sequence: header.sequence.get(),
            total,
            next_extensions: raw.slice(CHUNK_INFO_HEADER_LEN..),
        })
    }
}

/// Render an op id the way it appears in logs.
pub fn op_id_hex(op_id: u64) -> String {
    hex::encode(op_id.to_be_bytes())
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Magic prefix identifying chunk metadata.
pub const CHUNK_INFO_MAGIC: [u8; 4] = *b"RCHK";

/// Current chunk metadata version.
pub const CHUNK_INFO_VERSION: u8 = 0x01;

/// Encoded header length in bytes.
pub const CHUNK_INFO_HEADER_LEN: usize = 22;

/// Largest entry payload the consensus log is expected to carry.
/// Commands larger than this are split by the encoder.
pub const SUGGESTED_MAX_DATA_SIZE: usize = 512 * 1024;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when encoding or interpreting chunk metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("chunk info truncated: {0} bytes, need {}", CHUNK_INFO_HEADER_LEN)]
    Truncated(usize),

    #[error("bad chunk info magic: {}", hex::encode(.0))]
    BadMagic([u8; 4]),

    #[error("unknown chunk info version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("reserved flags are non-zero: 0x{0:02x}")]
    ReservedFlagsSet(u8),

    #[error("chunk total must be non-zero")]
    ZeroTotal,

    #[error("sequence number {sequence} out of range for {total} chunks")]
    SequenceOutOfRange { sequence: u32, total: u32 },

    #[error("command needs {0} chunks, more than a u32 can count")]
    TooManyChunks(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
