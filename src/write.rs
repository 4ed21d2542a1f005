//! Write path (C4): append a single entry at the current tail (§4.3), and the
//! leader-mode batch append that assigns sequential indices.

use crate::codec::{encode_header_and_data, frame_slices, Entry, EntryKind, Trailer};
use crate::error::Result;
use crate::file::FileExt;
use crate::state::{ConfigValue, LogState};

/// A caller-supplied entry awaiting an index, as passed to leader-mode
/// `append` (§4.1): the log assigns `last_index+1, last_index+2, …`.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub term: u64,
    pub kind: EntryKind,
    pub payload: Vec<u8>,
}

impl NewEntry {
    pub fn noop(term: u64) -> Self {
        NewEntry {
            term,
            kind: EntryKind::Noop,
            payload: Vec::new(),
        }
    }
}

/// Leader-mode `append`: assign sequential indices starting at
/// `last_index+1`, write each entry, and fsync once at the end of the batch
/// (§4.3). Returns the resulting `last_index`.
pub fn append(file: &impl FileExt, state: &mut LogState, entries: Vec<NewEntry>) -> Result<u64> {
    if entries.is_empty() {
        return Ok(state.last_index);
    }

    for new_entry in entries {
        let index = state.last_index + 1;
        let entry = Entry {
            term: new_entry.term,
            index,
            kind: new_entry.kind,
            payload: new_entry.payload,
        };
        write_entry(file, state, entry)?;
    }
    file.sync_all()?;

    Ok(state.last_index)
}

/// Write `entry` at `state.write_offset`, without syncing. The caller
/// (leader append or follower reconcile) batches entries and issues a single
/// fsync at the end, per §4.3.
pub fn write_entry(file: &impl FileExt, state: &mut LogState, entry: Entry) -> Result<()> {
    let w = state.write_offset;
    let header_and_data = encode_header_and_data(&entry);

    let (new_config_offset, new_config) = if entry.kind == EntryKind::Config {
        (w, ConfigValue::Present(entry.payload.clone()))
    } else {
        (state.config_offset, state.config.clone())
    };

    let trailer = Trailer::new(new_config_offset, w);
    let slices = frame_slices(&header_and_data, &trailer);
    file.write_at_vectored(&slices, w)?;

    state.write_offset = w + header_and_data.len() as u64 + crate::codec::TRAILER_SIZE;
    state.last_index = entry.index;
    state.config_offset = new_config_offset;
    state.config = new_config;
    state.last_entry = Some(entry);

    Ok(())
}
