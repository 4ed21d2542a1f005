//! Read/seek path (C5): locate an entry by index via the hint cache plus a
//! forward scan (§4.5).

use crate::codec::next_entry_offset;
use crate::error::Result;
use crate::file::FileExt;
use crate::frame::{read_entry_at, read_peek_at};
use crate::state::LogState;

/// Locate and decode the entry at `index`, or `Ok(None)` if `index < 1` or
/// `index > last_index`.
pub fn get_entry(
    file: &impl FileExt,
    state: &mut LogState,
    index: u64,
) -> Result<Option<crate::codec::Entry>> {
    if index == 0 || index > state.last_index {
        return Ok(None);
    }

    let mut loc = state.hints.closest_forward_offset(index);
    let mut steps = 0u64;

    loop {
        let Some(peek) = read_peek_at(file, loc)? else {
            state.hints.record_seek(steps);
            return Ok(None);
        };

        if peek.index == index {
            let entry = read_entry_at(file, loc)?;
            state.hints.insert(index, loc);
            state.hints.record_seek(steps);
            return Ok(Some(entry));
        }

        loc = next_entry_offset(loc, peek.data_size);
        steps += 1;
    }
}
