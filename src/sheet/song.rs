// Song - order list of pattern instances with song-level defaults

use serde::{Deserialize, Serialize};

/// Weak reference to one instance of a pattern
///
/// Stored as `[pattern, instance]`. Removing the pattern leaves the
/// reference dangling; `Module::resolve` then returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct PatternInstanceRef {
    pub pattern: usize,
    pub instance: usize,
}

impl PatternInstanceRef {
    pub fn new(pattern: usize, instance: usize) -> Self {
        Self { pattern, instance }
    }
}

impl From<(usize, usize)> for PatternInstanceRef {
    fn from((pattern, instance): (usize, usize)) -> Self {
        Self { pattern, instance }
    }
}

impl From<PatternInstanceRef> for (usize, usize) {
    fn from(r: PatternInstanceRef) -> Self {
        (r.pattern, r.instance)
    }
}

/// Song header as stored in `song_XX/p_song.json`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SongHeader {
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default)]
    pub global_vol: f64,
}

fn default_tempo() -> f64 {
    120.0
}

impl Default for SongHeader {
    fn default() -> Self {
        Self {
            tempo: default_tempo(),
            global_vol: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    pub header: SongHeader,
    order: Vec<PatternInstanceRef>,
}

impl Song {
    pub fn new(header: SongHeader) -> Self {
        Self {
            header,
            order: Vec::new(),
        }
    }

    pub fn with_order(header: SongHeader, order: Vec<PatternInstanceRef>) -> Self {
        Self { header, order }
    }

    pub fn order(&self) -> &[PatternInstanceRef] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn push(&mut self, item: PatternInstanceRef) {
        self.order.push(item);
    }

    /// Insert at `index`, appending when past the end
    pub fn insert(&mut self, index: usize, item: PatternInstanceRef) {
        let index = index.min(self.order.len());
        self.order.insert(index, item);
    }

    pub fn remove(&mut self, index: usize) -> Option<PatternInstanceRef> {
        if index < self.order.len() {
            Some(self.order.remove(index))
        } else {
            None
        }
    }

    /// Positions in the order list that refer to `pattern`
    pub fn systems_of(&self, pattern: usize) -> impl Iterator<Item = usize> + '_ {
        self.order
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.pattern == pattern)
            .map(|(i, _)| i)
    }
}
