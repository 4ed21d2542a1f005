//! Entry codec (C1): the framed on-disk representation of a single log
//! entry, and the trailer that follows it.
//!
//! ```text
//! Header+Data (variable):
//!   hash(20) || kind(1) || term(8) || index(8) || data_size(4) || data(data_size)
//! Trailer (28):
//!   crc32(4)  || config_offset(8) || entry_start_offset(8) || MAGIC(8)
//! ```
//!
//! All integers are big-endian. `hash` is the SHA-1 digest of everything from
//! `kind` through the end of `data`; `crc32` covers the 24 trailer bytes that
//! follow it.

use std::io::IoSlice;

use sha1::{Digest, Sha1};
use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::{Error, Result};

/// Version written into the one-byte file header.
pub const VERSION: u8 = 1;
/// Size of the file header written once at offset 0.
pub const FILE_HEADER_SIZE: u64 = 1;
/// Size of the hash+kind+term+index+data_size prefix that precedes `data`.
pub const HEADER_SIZE: u64 = 41;
/// Size of the trailer that follows `data`.
pub const TRAILER_SIZE: u64 = 28;
/// Fixed sentinel closing every trailer.
pub const MAGIC: [u8; 8] = [0xFE, 0xED, 0xFE, 0xED, 0xFE, 0xED, 0xFE, 0xED];

const HASH_SIZE: usize = 20;

/// The byte offset at which the entry following the one at `loc` (with the
/// given `data_size`) begins.
pub fn next_entry_offset(loc: u64, data_size: u32) -> u64 {
    loc + HEADER_SIZE + data_size as u64 + TRAILER_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Noop = 0,
    Config = 1,
    Op = 2,
}

impl EntryKind {
    fn from_byte(b: u8, offset: u64) -> Result<Self> {
        match b {
            0 => Ok(EntryKind::Noop),
            1 => Ok(EntryKind::Config),
            2 => Ok(EntryKind::Op),
            _ => Err(Error::MalformedHeader {
                offset,
                reason: "unrecognized entry kind byte",
            }),
        }
    }
}

/// A single log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub term: u64,
    pub index: u64,
    pub kind: EntryKind,
    pub payload: Vec<u8>,
}

impl Entry {
    /// The canonical empty payload written for `noop` entries.
    pub fn noop(term: u64, index: u64) -> Self {
        Entry {
            term,
            index,
            kind: EntryKind::Noop,
            payload: Vec::new(),
        }
    }
}

/// The fixed 41-byte prefix of a frame, decoded but not yet hash-checked.
struct RawHeader {
    hash: [u8; HASH_SIZE],
    kind: u8,
    term: u64,
    index: u64,
    data_size: u32,
}

fn parse_raw_header(buf: &[u8], offset: u64) -> Result<RawHeader> {
    if buf.len() != HEADER_SIZE as usize {
        return Err(Error::MalformedHeader {
            offset,
            reason: "short header read",
        });
    }
    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&buf[0..20]);
    let kind = buf[20];
    let term = u64::from_be_bytes(buf[21..29].try_into().unwrap());
    let index = u64::from_be_bytes(buf[29..37].try_into().unwrap());
    let data_size = u32::from_be_bytes(buf[37..41].try_into().unwrap());
    Ok(RawHeader {
        hash,
        kind,
        term,
        index,
        data_size,
    })
}

/// Just the header fields needed to walk the log without paying for a data
/// read: used by the read/seek and reconcile paths (§4.5, §4.6).
#[derive(Debug, Clone, Copy)]
pub struct HeaderPeek {
    pub term: u64,
    pub index: u64,
    pub data_size: u32,
}

/// Decode the 41-byte header at `buf` without validating the hash (the
/// caller has not yet read `data`, so the hash cannot be checked here).
pub fn peek_header(buf: &[u8], offset: u64) -> Result<HeaderPeek> {
    let raw = parse_raw_header(buf, offset)?;
    EntryKind::from_byte(raw.kind, offset)?;
    Ok(HeaderPeek {
        term: raw.term,
        index: raw.index,
        data_size: raw.data_size,
    })
}

/// Decode and hash-verify a full header+data frame read from `offset`.
pub fn decode_entry(header_buf: &[u8], data: Vec<u8>, offset: u64) -> Result<Entry> {
    let raw = parse_raw_header(header_buf, offset)?;
    if raw.data_size as usize != data.len() {
        return Err(Error::MalformedHeader {
            offset,
            reason: "data_size does not match bytes read",
        });
    }
    let kind = EntryKind::from_byte(raw.kind, offset)?;

    let mut hasher = Sha1::new();
    hasher.update(&header_buf[20..41]);
    hasher.update(&data);
    let computed: [u8; HASH_SIZE] = hasher.finalize().into();
    if computed != raw.hash {
        return Err(Error::HashMismatch { offset });
    }

    Ok(Entry {
        term: raw.term,
        index: raw.index,
        kind,
        payload: data,
    })
}

/// Encode `entry` into its 41-byte header followed by `data`, with the hash
/// filled in. Returns the full header+data buffer (not including the
/// trailer).
pub fn encode_header_and_data(entry: &Entry) -> Vec<u8> {
    let data_size = entry.payload.len() as u32;
    let mut post_hash = Vec::with_capacity(21 + entry.payload.len());
    post_hash.push(entry.kind as u8);
    post_hash.extend_from_slice(&entry.term.to_be_bytes());
    post_hash.extend_from_slice(&entry.index.to_be_bytes());
    post_hash.extend_from_slice(&data_size.to_be_bytes());
    post_hash.extend_from_slice(&entry.payload);

    let mut hasher = Sha1::new();
    hasher.update(&post_hash[0..21]);
    hasher.update(&entry.payload);
    let hash: [u8; HASH_SIZE] = hasher.finalize().into();

    let mut buf = Vec::with_capacity(HEADER_SIZE as usize + entry.payload.len());
    buf.extend_from_slice(&hash);
    buf.extend_from_slice(&post_hash);
    buf
}

/// The 28-byte trailer following every entry.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct Trailer {
    crc32: U32,
    config_offset: U64,
    entry_start_offset: U64,
    magic: [u8; 8],
}

impl Trailer {
    pub fn new(config_offset: u64, entry_start_offset: u64) -> Self {
        let mut t = Trailer {
            crc32: 0.into(),
            config_offset: config_offset.into(),
            entry_start_offset: entry_start_offset.into(),
            magic: MAGIC,
        };
        t.crc32 = t.compute_crc().into();
        t
    }

    fn compute_crc(&self) -> u32 {
        let bytes = self.as_bytes();
        crc32fast::hash(&bytes[4..])
    }

    pub fn check(&self, offset: u64) -> Result<()> {
        if self.crc32.get() == self.compute_crc() {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch { offset })
        }
    }

    pub fn config_offset(&self) -> u64 {
        self.config_offset.get()
    }

    pub fn entry_start_offset(&self) -> u64 {
        self.entry_start_offset.get()
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        Trailer::read_from(buf)
    }
}

/// Build the `header+data || trailer` buffer for a single write, as one
/// contiguous set of `IoSlice`s suitable for a single positional `pwritev`.
pub fn frame_slices<'a>(header_and_data: &'a [u8], trailer: &'a Trailer) -> [IoSlice<'a>; 2] {
    [
        IoSlice::new(header_and_data),
        IoSlice::new(trailer.as_bytes()),
    ]
}
