//! Follower reconcile (C6): compare an incoming batch of leader-assigned
//! entries against what is already on disk, truncating only a diverging
//! suffix (§4.6).

use crate::codec::{next_entry_offset, Entry, Trailer, FILE_HEADER_SIZE, TRAILER_SIZE};
use crate::error::{Error, Result};
use crate::file::FileExt;
use crate::frame::{read_entry_at, read_peek_at};
use crate::state::{ConfigValue, LogState};
use crate::write::write_entry;

/// `check_and_append(entries, start_index)`. `entries[0].index` must equal
/// `start_index`.
pub fn check_and_append(
    file: &impl FileExt,
    state: &mut LogState,
    entries: Vec<Entry>,
    start_index: u64,
) -> Result<u64> {
    let Some(first) = entries.first() else {
        return Ok(state.last_index);
    };
    if first.index != start_index {
        return Err(Error::InvalidStartIndex {
            expected: start_index,
            got: first.index,
        });
    }

    // Step 1-2: find the on-disk offset of `start_index`, or fall straight
    // through to a pure append if the on-disk log doesn't reach that far.
    let mut loc = state.hints.closest_forward_offset(start_index);
    let mut cur = loop {
        match read_peek_at(file, loc)? {
            None => break None,
            Some(peek) if peek.index == start_index => break Some(peek),
            Some(peek) => loc = next_entry_offset(loc, peek.data_size),
        }
    };

    // Step 3: walk forward matching input entries against on-disk frames.
    let mut matched = 0usize;
    while matched < entries.len() {
        let Some(peek) = cur else { break };
        let e = &entries[matched];
        if peek.index == e.index && peek.term == e.term {
            loc = next_entry_offset(loc, peek.data_size);
            matched += 1;
            cur = read_peek_at(file, loc)?;
        } else {
            break;
        }
    }

    if matched == entries.len() {
        // Every input entry already matches what's on disk; nothing to
        // write, and a pure match performs no I/O beyond the reads above.
        return Ok(state.last_index);
    }

    // Step 4: truncate-and-write at `loc`.
    maybe_reset_config(file, state, loc)?;
    file.set_len(loc)?;
    state.hints.invalidate_from(loc);
    state.write_offset = loc;

    for entry in entries.into_iter().skip(matched) {
        write_entry(file, state, entry)?;
    }
    file.sync_all()?;

    Ok(state.last_index)
}

/// After truncating the file at `truncate_at`, restore the config pointer if
/// the currently-tracked config entry fell inside the truncated region.
fn maybe_reset_config(file: &impl FileExt, state: &mut LogState, truncate_at: u64) -> Result<()> {
    if state.config_offset < truncate_at {
        return Ok(());
    }

    if truncate_at <= FILE_HEADER_SIZE {
        state.config_offset = 0;
        state.config = ConfigValue::Blank;
        return Ok(());
    }

    let trailer_start = truncate_at - TRAILER_SIZE;
    let mut trailer_buf = [0u8; TRAILER_SIZE as usize];
    file.read_exact_at(&mut trailer_buf, trailer_start)?;
    let trailer = Trailer::decode(&trailer_buf).ok_or(Error::MalformedHeader {
        offset: trailer_start,
        reason: "trailer could not be parsed",
    })?;
    trailer.check(trailer_start)?;

    let prev_config_offset = trailer.config_offset();
    if prev_config_offset == 0 {
        state.config_offset = 0;
        state.config = ConfigValue::Blank;
    } else {
        let entry = read_entry_at(file, prev_config_offset)?;
        state.config_offset = prev_config_offset;
        state.config = ConfigValue::Present(entry.payload);
    }

    Ok(())
}
