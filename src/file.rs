//! Positioned file I/O primitives (C2).
//!
//! A thin `pread`/`pwrite`/`pwritev` wrapper around [`std::fs::File`]. Every
//! write the log performs goes through `write_at_vectored` so that an entry's
//! header, data and trailer land on disk with a single positional write, as
//! required by §4.3 step 4.

use std::fs::File;
use std::io::{self, ErrorKind, IoSlice};

pub trait FileExt {
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;
    fn write_at_vectored(&self, bufs: &[IoSlice], offset: u64) -> io::Result<usize>;
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
    fn sync_all(&self) -> io::Result<()>;
    fn set_len(&self, len: u64) -> io::Result<()>;
    fn len(&self) -> io::Result<u64>;
}

impl FileExt for File {
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        let mut written = 0;
        while written != buf.len() {
            written += nix::sys::uio::pwrite(self, &buf[written..], (offset + written as u64) as _)
                .map_err(io::Error::from)?;
        }
        Ok(())
    }

    fn write_at_vectored(&self, bufs: &[IoSlice], offset: u64) -> io::Result<usize> {
        nix::sys::uio::pwritev(self, bufs, offset as _).map_err(io::Error::from)
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut read = 0;
        while read != buf.len() {
            let n = nix::sys::uio::pread(self, &mut buf[read..], (offset + read as u64) as _)
                .map_err(io::Error::from)?;
            if n == 0 {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "unexpected end-of-file",
                ));
            }
            read += n;
        }
        Ok(())
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}
