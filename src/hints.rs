//! Hint cache (C7): a bounded `index -> offset` map used to skip forward
//! scanning on repeated random reads.

use std::collections::BTreeMap;

use crate::codec::FILE_HEADER_SIZE;

/// `hints: index -> offset`, capacity `MAX_HINTS`.
pub const MAX_HINTS: usize = 1000;

#[derive(Debug)]
pub struct HintCache {
    map: BTreeMap<u64, u64>,
    capacity: usize,
    prunes: u64,
    /// Histogram of how many entries a `get_entry` call had to scan forward
    /// past its starting hint, keyed by scan length. Observability only.
    seek_counts: BTreeMap<u64, u64>,
}

impl Default for HintCache {
    fn default() -> Self {
        HintCache::with_capacity(MAX_HINTS)
    }
}

impl HintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HintCache {
            map: BTreeMap::new(),
            capacity,
            prunes: 0,
            seek_counts: BTreeMap::new(),
        }
    }

    /// The offset stored under the greatest key strictly less than `index`,
    /// or `FILE_HEADER_SIZE` if none.
    pub fn closest_forward_offset(&self, index: u64) -> u64 {
        self.map
            .range(..index)
            .next_back()
            .map(|(_, &offset)| offset)
            .unwrap_or(FILE_HEADER_SIZE)
    }

    /// Record that `index` was found at `offset`, evicting if the cache is
    /// full.
    pub fn insert(&mut self, index: u64, offset: u64) {
        if self.map.len() >= self.capacity && !self.map.contains_key(&index) {
            self.decimate();
        }
        self.map.insert(index, offset);
    }

    /// Delete every 10th entry in iteration order, starting from the first.
    /// A deterministic decimation that frees ~10% of the cache per pass.
    fn decimate(&mut self) {
        let doomed: Vec<u64> = self
            .map
            .keys()
            .enumerate()
            .filter_map(|(i, &k)| (i % 10 == 0).then_some(k))
            .collect();
        for k in doomed {
            self.map.remove(&k);
        }
        self.prunes += 1;
    }

    pub fn record_seek(&mut self, steps: u64) {
        *self.seek_counts.entry(steps).or_insert(0) += 1;
    }

    pub fn prune_count(&self) -> u64 {
        self.prunes
    }

    pub fn seek_histogram(&self) -> &BTreeMap<u64, u64> {
        &self.seek_counts
    }

    /// Drop every hint at or beyond `offset`: used after a truncation so the
    /// cache never points past the new `write_offset`.
    pub fn invalidate_from(&mut self, offset: u64) {
        self.map.retain(|_, &mut v| v < offset);
    }
}
