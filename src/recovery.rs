//! Recovery scanner (C3): reconstructs `LogState` from an on-disk log file
//! after an unclean shutdown (§4.4).

use crate::codec::{EntryKind, Trailer, FILE_HEADER_SIZE, MAGIC, TRAILER_SIZE, VERSION};
use crate::error::{Error, Result};
use crate::file::FileExt;
use crate::frame::read_entry_at;
use crate::hints::HintCache;
use crate::state::{ConfigValue, LogState};

/// Default size of the backward-scanning window (§4.4 step 1).
pub const DEFAULT_RECOVERY_BLOCK_SIZE: u64 = 1 << 20;

/// Reconstruct `LogState` for `file`, repairing a crash-time garbage tail in
/// place. Returns an error only for interior corruption (§7 class 2) or an
/// environmental I/O failure (§7 class 3).
pub fn recover(file: &impl FileExt, block_size: u64, hint_capacity: usize) -> Result<LogState> {
    let file_size = file.len()?;

    if file_size <= FILE_HEADER_SIZE {
        return bootstrap_empty(file, file_size, hint_capacity);
    }

    let found = locate_last_intact_trailer(file, file_size, block_size)?;

    let (trailer_start, trailer) = match found {
        Some(found) => found,
        None => {
            tracing::warn!(
                file_size,
                "no intact trailer found in non-empty log file; resetting to empty"
            );
            return bootstrap_empty_truncated(file, hint_capacity);
        }
    };

    let truncate_at = trailer_start + TRAILER_SIZE;
    if truncate_at < file_size {
        tracing::warn!(
            discarded_bytes = file_size - truncate_at,
            "truncating crash-time garbage tail"
        );
        file.set_len(truncate_at)?;
    }

    let mut version_buf = [0u8; FILE_HEADER_SIZE as usize];
    file.read_exact_at(&mut version_buf, 0)?;
    let version = version_buf[0];
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let entry_start = trailer.entry_start_offset();
    let last_entry = read_entry_at(file, entry_start)?;
    let last_index = last_entry.index;

    let config_start = trailer.config_offset();
    let config = if config_start != 0 {
        let entry = read_entry_at(file, config_start)?;
        if entry.kind != EntryKind::Config {
            return Err(Error::MalformedHeader {
                offset: config_start,
                reason: "config_offset does not point at a config entry",
            });
        }
        ConfigValue::Present(entry.payload)
    } else {
        ConfigValue::Blank
    };

    Ok(LogState {
        write_offset: truncate_at,
        last_index,
        last_entry: Some(last_entry),
        config_offset: config_start,
        config,
        hints: HintCache::with_capacity(hint_capacity),
        version,
    })
}

/// Scan backward in `block_size` windows for the rightmost trailer whose
/// CRC32 checks out, per §4.4 step 1.
fn locate_last_intact_trailer(
    file: &impl FileExt,
    file_size: u64,
    block_size: u64,
) -> Result<Option<(u64, Trailer)>> {
    let mut block_hi = file_size;

    while block_hi > FILE_HEADER_SIZE {
        let block_lo = block_hi.saturating_sub(block_size).max(FILE_HEADER_SIZE);
        // Extend the read past block_hi by up to 7 bytes so a MAGIC value
        // straddling this block's upper boundary is not missed.
        let read_hi = (block_hi + (MAGIC.len() as u64 - 1)).min(file_size);
        let len = (read_hi - block_lo) as usize;
        let mut buf = vec![0u8; len];
        file.read_exact_at(&mut buf, block_lo)?;

        // `upper` narrows every time a candidate MAGIC fails its CRC check,
        // so the next search pass considers only strictly lower offsets.
        let mut upper = read_hi;
        loop {
            let candidate = rightmost_magic_before(&buf, block_lo, upper);
            let Some(magic_abs) = candidate else {
                break;
            };
            let Some(trailer_start) = magic_abs.checked_sub(TRAILER_SIZE - MAGIC.len() as u64)
            else {
                upper = magic_abs;
                continue;
            };
            let mut trailer_buf = [0u8; TRAILER_SIZE as usize];
            file.read_exact_at(&mut trailer_buf, trailer_start)?;
            if let Some(trailer) = Trailer::decode(&trailer_buf) {
                if trailer.check(trailer_start).is_ok() {
                    return Ok(Some((trailer_start, trailer)));
                }
            }
            upper = magic_abs;
        }

        block_hi = block_lo;
    }

    Ok(None)
}

/// The rightmost absolute offset in `[block_lo, upper)` at which `MAGIC`
/// occurs, searching within `buf` (which starts at `block_lo`).
fn rightmost_magic_before(buf: &[u8], block_lo: u64, upper: u64) -> Option<u64> {
    if buf.len() < MAGIC.len() {
        return None;
    }
    for rel in (0..=buf.len() - MAGIC.len()).rev() {
        let abs = block_lo + rel as u64;
        if abs + MAGIC.len() as u64 > upper {
            continue;
        }
        if buf[rel..rel + MAGIC.len()] == MAGIC {
            return Some(abs);
        }
    }
    None
}

fn bootstrap_empty(file: &impl FileExt, file_size: u64, hint_capacity: usize) -> Result<LogState> {
    if file_size == 0 {
        file.write_all_at(&[VERSION], 0)?;
        file.sync_all()?;
    } else {
        let mut version_buf = [0u8; FILE_HEADER_SIZE as usize];
        file.read_exact_at(&mut version_buf, 0)?;
        if version_buf[0] != VERSION {
            return Err(Error::UnsupportedVersion(version_buf[0]));
        }
    }
    Ok(LogState::new(HintCache::with_capacity(hint_capacity)))
}

fn bootstrap_empty_truncated(file: &impl FileExt, hint_capacity: usize) -> Result<LogState> {
    file.set_len(0)?;
    file.write_all_at(&[VERSION], 0)?;
    file.sync_all()?;
    Ok(LogState::new(HintCache::with_capacity(hint_capacity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Entry;
    use crate::write::write_entry;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    fn open_file(dir: &std::path::Path, name: &str) -> std::fs::File {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(dir.join(name))
            .unwrap()
    }

    #[test]
    fn recover_bootstraps_a_fresh_empty_file() {
        let dir = tempdir().unwrap();
        let file = open_file(dir.path(), "log");
        let state = recover(&file, DEFAULT_RECOVERY_BLOCK_SIZE, 10).unwrap();
        assert_eq!(state.last_index, 0);
        assert_eq!(state.write_offset, FILE_HEADER_SIZE);
        assert_eq!(file.len().unwrap(), FILE_HEADER_SIZE);
    }

    #[test]
    fn recover_resets_a_file_with_only_garbage() {
        let dir = tempdir().unwrap();
        let file = open_file(dir.path(), "log");
        file.write_all_at(&[VERSION], 0).unwrap();
        file.write_all_at(&[1, 2, 3, 4, 5], FILE_HEADER_SIZE).unwrap();

        let state = recover(&file, DEFAULT_RECOVERY_BLOCK_SIZE, 10).unwrap();
        assert_eq!(state.last_index, 0);
        assert_eq!(file.len().unwrap(), FILE_HEADER_SIZE);
    }

    #[test]
    fn recover_discards_tail_garbage_after_last_intact_trailer() {
        let dir = tempdir().unwrap();
        let file = open_file(dir.path(), "log");
        file.write_all_at(&[VERSION], 0).unwrap();
        let mut state = LogState::default();
        write_entry(&file, &mut state, Entry::noop(1, 1)).unwrap();
        let good_write_offset = state.write_offset;

        file.write_all_at(&[0xAAu8; 64], good_write_offset).unwrap();

        let recovered = recover(&file, DEFAULT_RECOVERY_BLOCK_SIZE, 10).unwrap();
        assert_eq!(recovered.last_index, 1);
        assert_eq!(recovered.write_offset, good_write_offset);
        assert_eq!(file.len().unwrap(), good_write_offset);
    }

    #[test]
    fn recover_finds_magic_straddling_a_block_boundary() {
        let dir = tempdir().unwrap();
        let file = open_file(dir.path(), "log");
        file.write_all_at(&[VERSION], 0).unwrap();
        let mut state = LogState::default();
        write_entry(&file, &mut state, Entry::noop(1, 1)).unwrap();
        write_entry(&file, &mut state, Entry::noop(1, 2)).unwrap();
        let write_offset = state.write_offset;

        // Force a tiny block size so the backward scan must cross a boundary
        // that falls inside the last entry's trailer/MAGIC.
        let tiny_block = 6u64;
        let recovered = recover(&file, tiny_block, 10).unwrap();
        assert_eq!(recovered.last_index, 2);
        assert_eq!(recovered.write_offset, write_offset);
    }

    #[test]
    fn recover_rejects_unsupported_version() {
        let dir = tempdir().unwrap();
        let file = open_file(dir.path(), "log");
        let mut state = LogState::default();
        write_entry(&file, &mut state, Entry::noop(1, 1)).unwrap();
        file.write_all_at(&[99], 0).unwrap();

        let err = recover(&file, DEFAULT_RECOVERY_BLOCK_SIZE, 10).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(99)));
    }

    #[test]
    fn recover_adopts_config_entry_pointed_to_by_trailer() {
        let dir = tempdir().unwrap();
        let file = open_file(dir.path(), "log");
        file.write_all_at(&[VERSION], 0).unwrap();
        let mut state = LogState::default();
        let config_entry = Entry {
            term: 1,
            index: 1,
            kind: EntryKind::Config,
            payload: b"stable".to_vec(),
        };
        write_entry(&file, &mut state, config_entry).unwrap();
        write_entry(&file, &mut state, Entry::noop(1, 2)).unwrap();

        let recovered = recover(&file, DEFAULT_RECOVERY_BLOCK_SIZE, 10).unwrap();
        match recovered.config {
            ConfigValue::Present(bytes) => assert_eq!(bytes, b"stable"),
            ConfigValue::Blank => panic!("expected recovered config"),
        }
        assert_eq!(recovered.config_offset, FILE_HEADER_SIZE);
    }
}
