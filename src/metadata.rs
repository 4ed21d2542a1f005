//! Metadata store (C8): the small `{current_term, voted_for}` record kept in
//! a separate file and overwritten atomically (§4.8).

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// `{current_term, voted_for}`, as returned by `get_metadata`/written by
/// `set_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pub current_term: u64,
    pub voted_for: Option<String>,
}

/// On-disk encoding: `current_term(8) || has_voted_for(1) || voted_for_len(4) || voted_for`.
fn encode(meta: &Metadata) -> Vec<u8> {
    let mut buf = Vec::with_capacity(13);
    buf.extend_from_slice(&meta.current_term.to_be_bytes());
    match &meta.voted_for {
        Some(v) => {
            buf.push(1);
            buf.extend_from_slice(&(v.len() as u32).to_be_bytes());
            buf.extend_from_slice(v.as_bytes());
        }
        None => {
            buf.push(0);
            buf.extend_from_slice(&0u32.to_be_bytes());
        }
    }
    buf
}

fn decode(buf: &[u8]) -> Option<Metadata> {
    if buf.len() < 13 {
        return None;
    }
    let current_term = u64::from_be_bytes(buf[0..8].try_into().ok()?);
    let has_voted_for = buf[8];
    let len = u32::from_be_bytes(buf[9..13].try_into().ok()?) as usize;
    let voted_for = if has_voted_for == 1 {
        let bytes = buf.get(13..13 + len)?;
        Some(String::from_utf8(bytes.to_vec()).ok()?)
    } else {
        None
    };
    Some(Metadata {
        current_term,
        voted_for,
    })
}

/// Owns the path to a peer's metadata file and its adjacent temporary path
/// used for the atomic write-then-rename (§4.8).
pub struct MetadataStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl MetadataStore {
    pub fn new(logdir: &Path, peer: &str) -> Self {
        let path = logdir.join(format!("rafter_{peer}.meta"));
        let tmp_path = logdir.join(format!("rafter_{peer}.meta.tmp"));
        MetadataStore { path, tmp_path }
    }

    /// Load the metadata record, or a default `{0, None}` if the file is
    /// absent or unreadable (§4.8, §7 class: tolerated at open).
    pub fn load(&self, log_file_size: u64) -> Result<Metadata> {
        match fs::read(&self.path) {
            Ok(bytes) => match decode(&bytes) {
                Some(meta) => Ok(meta),
                None => {
                    tracing::warn!(
                        path = %self.path.display(),
                        "metadata file present but malformed; returning default metadata"
                    );
                    Ok(Metadata::default())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if log_file_size > crate::codec::FILE_HEADER_SIZE {
                    tracing::warn!(
                        path = %self.path.display(),
                        "metadata file missing for a non-empty log; returning default metadata"
                    );
                }
                Ok(Metadata::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Durably overwrite the metadata file: write to a temporary file in the
    /// same directory, fsync it, then rename over the target (§4.8).
    pub fn store(&self, meta: &Metadata) -> Result<()> {
        let bytes = encode(meta);
        let mut tmp = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        tmp.write_all(&bytes)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;
        Ok(())
    }
}

/// Best-effort directory fsync so the rename itself survives a crash. Not
/// supported on all platforms; failures here are not surfaced as fatal since
/// the rename has already completed.
fn sync_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    match fs::File::open(parent) {
        Ok(dir) => match dir.sync_all() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(()),
            Err(e) => Err(e.into()),
        },
        Err(_) => Ok(()),
    }
}
