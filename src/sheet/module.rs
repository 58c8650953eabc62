// Module - the whole composition: patterns, songs, control map, environment

use crate::sheet::pattern::Pattern;
use crate::sheet::song::{PatternInstanceRef, Song};
use crate::sheet::trigger::{FieldType, FieldValue};
use crate::sheet::{
    CONTROLS_MAX, INSTRUMENTS_MAX, PATTERN_INSTANCES_MAX, PATTERNS_MAX, SONGS_MAX, SheetError,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Prefixes of the opaque parameter subtrees
pub const BLOB_PREFIXES: [&str; 3] = ["ins_", "eff_", "gen_"];

/// A typed environment variable
#[derive(Debug, Clone, PartialEq)]
pub struct EnvVar {
    pub ty: FieldType,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    patterns: BTreeMap<usize, Pattern>,
    songs: BTreeMap<usize, Song>,
    control_map: BTreeMap<usize, usize>,
    environment: BTreeMap<String, EnvVar>,
    blobs: BTreeMap<String, Vec<u8>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    // Patterns

    pub fn pattern(&self, id: usize) -> Option<&Pattern> {
        self.patterns.get(&id)
    }

    pub fn pattern_mut(&mut self, id: usize) -> Option<&mut Pattern> {
        self.patterns.get_mut(&id)
    }

    pub fn try_pattern_mut(&mut self, id: usize) -> Result<&mut Pattern, SheetError> {
        self.patterns.get_mut(&id).ok_or(SheetError::NoSuchPattern(id))
    }

    pub fn patterns(&self) -> impl Iterator<Item = (usize, &Pattern)> {
        self.patterns.iter().map(|(id, p)| (*id, p))
    }

    /// Store a pattern under the lowest free id
    pub fn add_pattern(&mut self, pattern: Pattern) -> Result<usize, SheetError> {
        let id = (0..PATTERNS_MAX)
            .find(|id| !self.patterns.contains_key(id))
            .ok_or(SheetError::LimitReached("patterns"))?;
        self.patterns.insert(id, pattern);
        Ok(id)
    }

    pub fn insert_pattern(&mut self, id: usize, pattern: Pattern) -> Result<Option<Pattern>, SheetError> {
        if id >= PATTERNS_MAX {
            return Err(SheetError::NoSuchPattern(id));
        }
        Ok(self.patterns.insert(id, pattern))
    }

    /// Remove a pattern; song references to it are left dangling
    pub fn remove_pattern(&mut self, id: usize) -> Option<Pattern> {
        self.patterns.remove(&id)
    }

    /// Register a new instance of `pattern`
    pub fn new_instance(&mut self, pattern: usize) -> Result<PatternInstanceRef, SheetError> {
        let pat = self.try_pattern_mut(pattern)?;
        let instance = pat.next_free_instance();
        if instance >= PATTERN_INSTANCES_MAX {
            return Err(SheetError::LimitReached("pattern instances"));
        }
        pat.add_instance(instance);
        Ok(PatternInstanceRef::new(pattern, instance))
    }

    /// Follow a weak instance reference
    pub fn resolve(&self, r: PatternInstanceRef) -> Option<&Pattern> {
        self.patterns
            .get(&r.pattern)
            .filter(|p| p.has_instance(r.instance))
    }

    // Songs

    pub fn song(&self, id: usize) -> Option<&Song> {
        self.songs.get(&id)
    }

    pub fn song_mut(&mut self, id: usize) -> Option<&mut Song> {
        self.songs.get_mut(&id)
    }

    pub fn songs(&self) -> impl Iterator<Item = (usize, &Song)> {
        self.songs.iter().map(|(id, s)| (*id, s))
    }

    pub fn add_song(&mut self, song: Song) -> Result<usize, SheetError> {
        let id = (0..SONGS_MAX)
            .find(|id| !self.songs.contains_key(id))
            .ok_or(SheetError::LimitReached("songs"))?;
        self.songs.insert(id, song);
        Ok(id)
    }

    pub fn insert_song(&mut self, id: usize, song: Song) -> Result<Option<Song>, SheetError> {
        if id >= SONGS_MAX {
            return Err(SheetError::NoSuchSong(id));
        }
        Ok(self.songs.insert(id, song))
    }

    pub fn remove_song(&mut self, id: usize) -> Option<Song> {
        self.songs.remove(&id)
    }

    /// Order list positions of a song whose references no longer resolve
    pub fn dangling_refs(&self, song: usize) -> Vec<(usize, PatternInstanceRef)> {
        self.songs
            .get(&song)
            .map(|s| {
                s.order()
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| self.resolve(**r).is_none())
                    .map(|(i, r)| (i, *r))
                    .collect()
            })
            .unwrap_or_default()
    }

    // Control map

    pub fn set_control(&mut self, slot: usize, instrument: usize) -> Result<(), SheetError> {
        if slot >= CONTROLS_MAX || instrument >= INSTRUMENTS_MAX {
            return Err(SheetError::LimitReached("control map"));
        }
        self.control_map.insert(slot, instrument);
        Ok(())
    }

    pub fn clear_control(&mut self, slot: usize) -> Option<usize> {
        self.control_map.remove(&slot)
    }

    pub fn control_target(&self, slot: usize) -> Option<usize> {
        self.control_map.get(&slot).copied()
    }

    pub fn control_map(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.control_map.iter().map(|(s, i)| (*s, *i))
    }

    // Environment

    /// Set a typed environment variable from raw input
    pub fn set_env(&mut self, name: &str, ty: FieldType, raw: &Value) -> Result<(), SheetError> {
        let value = ty
            .construct(raw)
            .ok_or_else(|| SheetError::InvalidVariable(name.to_string()))?;
        self.environment
            .insert(name.to_string(), EnvVar { ty, value });
        Ok(())
    }

    pub fn env(&self, name: &str) -> Option<&EnvVar> {
        self.environment.get(name)
    }

    pub fn remove_env(&mut self, name: &str) -> Option<EnvVar> {
        self.environment.remove(name)
    }

    pub fn environment(&self) -> impl Iterator<Item = (&str, &EnvVar)> {
        self.environment.iter().map(|(k, v)| (k.as_str(), v))
    }

    // Opaque instrument, effect and generator parameters

    pub fn set_blob(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), SheetError> {
        if !BLOB_PREFIXES.iter().any(|p| key.starts_with(p)) {
            return Err(SheetError::InvalidBlobKey(key.to_string()));
        }
        self.blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    pub fn blob(&self, key: &str) -> Option<&[u8]> {
        self.blobs.get(key).map(Vec::as_slice)
    }

    pub fn blobs(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.blobs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Instrument slots that carry any parameters
    pub fn instruments(&self) -> BTreeSet<usize> {
        self.blobs
            .keys()
            .filter_map(|key| key.strip_prefix("ins_"))
            .filter_map(|rest| rest.get(..2))
            .filter_map(|hex| usize::from_str_radix(hex, 16).ok())
            .collect()
    }
}
