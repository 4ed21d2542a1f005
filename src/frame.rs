//! Shared low-level frame reads used by the recovery, read/seek and
//! reconcile paths (C3, C5, C6).

use std::io;

use crate::codec::{decode_entry, peek_header, Entry, HeaderPeek, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::file::FileExt;

/// Peek the 41-byte header at `offset`, or `Ok(None)` on end-of-file. A clean
/// EOF here just means the scan has run off the retained prefix (§4.5 step
/// 4); it is not_found, not corruption.
pub fn read_peek_at(file: &impl FileExt, offset: u64) -> Result<Option<HeaderPeek>> {
    let mut header_buf = [0u8; HEADER_SIZE as usize];
    match file.read_exact_at(&mut header_buf, offset) {
        Ok(()) => Ok(Some(peek_header(&header_buf, offset)?)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read and hash-verify the full entry at `offset`. Unlike [`read_peek_at`],
/// the caller already knows an entry is supposed to start here (a prior peek
/// matched, or a trailer pointed here); hitting EOF mid-read is interior
/// corruption (§7 class 2), not an absent entry, so it surfaces as
/// `Error::UnexpectedEof` rather than the environmental `Error::Io`.
pub fn read_entry_at(file: &impl FileExt, offset: u64) -> Result<Entry> {
    let mut header_buf = [0u8; HEADER_SIZE as usize];
    read_exact_at_checked(file, &mut header_buf, offset)?;
    let peek = peek_header(&header_buf, offset)?;
    let mut data = vec![0u8; peek.data_size as usize];
    if peek.data_size > 0 {
        read_exact_at_checked(file, &mut data, offset + HEADER_SIZE)?;
    }
    decode_entry(&header_buf, data, offset)
}

fn read_exact_at_checked(file: &impl FileExt, buf: &mut [u8], offset: u64) -> Result<()> {
    match file.read_exact_at(buf, offset) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof { offset }),
        Err(e) => Err(e.into()),
    }
}
