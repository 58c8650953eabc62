// Module codec - reads and writes a composition through a project store
// Malformed stored data never aborts a load: the offending key is treated
// as missing and reported once.

use crate::project::ProjectError;
use crate::project::keys::{self, parse_column, parse_indexed};
use crate::project::store::Store;
use crate::sheet::column::{Column, ColumnId};
use crate::sheet::module::{BLOB_PREFIXES, Module};
use crate::sheet::pattern::Pattern;
use crate::sheet::song::{PatternInstanceRef, Song, SongHeader};
use crate::sheet::trigger::{FieldType, Trigger};
use crate::sheet::tstamp::Tstamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

/// Stored form of `pat_XXX/p_pattern.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PatternHeader {
    length: Tstamp,
    #[serde(default)]
    instances: Vec<usize>,
}

/// Result of loading a module
#[derive(Debug, Default)]
pub struct LoadReport {
    pub module: Module,
    /// Keys that were skipped or partly read, with the reason
    pub problems: Vec<ProjectError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

struct Loader<'a> {
    store: &'a dyn Store,
    reported: HashSet<String>,
    problems: Vec<ProjectError>,
}

impl<'a> Loader<'a> {
    fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            reported: HashSet::new(),
            problems: Vec::new(),
        }
    }

    /// Record a format problem; each key is logged once per load
    fn report(&mut self, key: &str, reason: impl Into<String>) {
        if !self.reported.insert(key.to_string()) {
            return;
        }
        let error = ProjectError::StoreFormat {
            key: key.to_string(),
            reason: reason.into(),
        };
        log::warn!("{}", error);
        self.problems.push(error);
    }

    fn read<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, ProjectError> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.report(key, e.to_string());
                Ok(None)
            }
        }
    }

    /// Ids of the top-level `<prefix>_<hex>` directories present in the store
    fn indexed_dirs(&self, prefix: &str, width: usize) -> Result<BTreeSet<usize>, ProjectError> {
        Ok(self
            .store
            .keys(&format!("{}_", prefix))?
            .iter()
            .filter_map(|key| key.split('/').next())
            .filter_map(|dir| parse_indexed(dir, prefix, width))
            .collect())
    }

    fn load_pattern(&mut self, id: usize) -> Result<Pattern, ProjectError> {
        let header_key = keys::pattern_header(id);
        let mut pattern = match self.read::<PatternHeader>(&header_key)? {
            Some(header) => {
                let mut pattern = Pattern::new(header.length);
                if header.length.is_negative() {
                    self.report(&header_key, "negative pattern length");
                }
                for instance in header.instances {
                    pattern.add_instance(instance);
                }
                pattern
            }
            None => Pattern::default(),
        };

        let dir = format!("{}/", keys::pattern_dir(id));
        for key in self.store.keys(&dir)? {
            let mut parts = key[dir.len()..].split('/');
            let (Some(column_dir), Some(keys::TRIGGERS), None) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            let Some(column) = parse_column(column_dir) else {
                self.report(&key, "unknown column directory");
                continue;
            };
            let Some(entries) = self.read::<Vec<(Tstamp, Value)>>(&key)? else {
                continue;
            };
            self.load_column(&mut pattern, column, &key, entries);
        }
        Ok(pattern)
    }

    fn load_column(&mut self, pattern: &mut Pattern, id: ColumnId, key: &str, entries: Vec<(Tstamp, Value)>) {
        let Some(column) = pattern.column_mut(id) else {
            self.report(key, format!("column {} is out of range", id));
            return;
        };
        for (ts, raw) in entries {
            let Some(trigger) = Trigger::from_json(&raw) else {
                self.report(key, format!("malformed trigger at {}", ts));
                continue;
            };
            if let Err(e) = column.load_trigger(ts, trigger) {
                self.report(key, e.to_string());
            }
        }
    }

    fn load_song(&mut self, id: usize) -> Result<Song, ProjectError> {
        let header = self
            .read::<SongHeader>(&keys::song_header(id))?
            .unwrap_or_default();
        let order = self
            .read::<Vec<PatternInstanceRef>>(&keys::order_list(id))?
            .unwrap_or_default();
        Ok(Song::with_order(header, order))
    }

    fn load_control_map(&mut self, module: &mut Module) -> Result<(), ProjectError> {
        let entries = self
            .read::<Vec<(usize, usize)>>(keys::CONTROL_MAP)?
            .unwrap_or_default();
        for (slot, instrument) in entries {
            if let Err(e) = module.set_control(slot, instrument) {
                self.report(keys::CONTROL_MAP, e.to_string());
            }
        }
        Ok(())
    }

    fn load_environment(&mut self, module: &mut Module) -> Result<(), ProjectError> {
        let entries = self
            .read::<Vec<(String, String, Value)>>(keys::ENVIRONMENT)?
            .unwrap_or_default();
        for (name, type_name, value) in entries {
            let Some(ty) = FieldType::from_name(&type_name) else {
                self.report(keys::ENVIRONMENT, format!("unknown type {}", type_name));
                continue;
            };
            if let Err(e) = module.set_env(&name, ty, &value) {
                self.report(keys::ENVIRONMENT, e.to_string());
            }
        }
        Ok(())
    }

    fn load_blobs(&mut self, module: &mut Module) -> Result<(), ProjectError> {
        for prefix in BLOB_PREFIXES {
            for key in self.store.keys(prefix)? {
                if let Some(bytes) = self.store.get(&key)? {
                    if let Err(e) = module.set_blob(&key, bytes) {
                        self.report(&key, e.to_string());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Read a whole module from `store`
///
/// Only store access failures are errors; format problems end up in the
/// report and the affected data is left out.
pub fn load_module(store: &dyn Store) -> Result<LoadReport, ProjectError> {
    let mut loader = Loader::new(store);
    let mut module = Module::new();

    for id in loader.indexed_dirs("pat", 3)? {
        let pattern = loader.load_pattern(id)?;
        if let Err(e) = module.insert_pattern(id, pattern) {
            loader.report(&keys::pattern_header(id), e.to_string());
        }
    }
    for id in loader.indexed_dirs("song", 2)? {
        let song = loader.load_song(id)?;
        if let Err(e) = module.insert_song(id, song) {
            loader.report(&keys::song_header(id), e.to_string());
        }
    }
    loader.load_control_map(&mut module)?;
    loader.load_environment(&mut module)?;
    loader.load_blobs(&mut module)?;

    log::debug!(
        "Loaded {} patterns and {} songs ({} problems)",
        module.patterns().count(),
        module.songs().count(),
        loader.problems.len()
    );
    Ok(LoadReport {
        module,
        problems: loader.problems,
    })
}

fn put_json<T: Serialize + ?Sized>(store: &mut dyn Store, key: &str, value: &T) -> Result<(), ProjectError> {
    store.put(key, serde_json::to_vec(value)?)
}

/// Column content in stored form, sorted by timestamp
pub fn column_to_json(column: &Column) -> Value {
    Value::Array(
        column
            .iter()
            .flat_map(|(ts, row)| {
                row.iter().map(move |trigger| {
                    Value::Array(vec![serde_json::json!(ts), trigger.to_json()])
                })
            })
            .collect(),
    )
}

/// Write `module` to `store`, replacing any composition data already there
pub fn save_module(module: &Module, store: &mut dyn Store) -> Result<(), ProjectError> {
    for prefix in ["pat_", "song_", keys::CONTROL_MAP, keys::ENVIRONMENT] {
        store.delete_subtree(prefix)?;
    }
    for prefix in BLOB_PREFIXES {
        store.delete_subtree(prefix)?;
    }

    for (id, pattern) in module.patterns() {
        let header = PatternHeader {
            length: pattern.length(),
            instances: pattern.instances().collect(),
        };
        put_json(store, &keys::pattern_header(id), &header)?;
        for column in pattern.columns().filter(|c| !c.is_empty()) {
            put_json(store, &keys::triggers(id, column.id()), &column_to_json(column))?;
        }
    }

    for (id, song) in module.songs() {
        put_json(store, &keys::song_header(id), &song.header)?;
        put_json(store, &keys::order_list(id), song.order())?;
    }

    let controls: Vec<(usize, usize)> = module.control_map().collect();
    if !controls.is_empty() {
        put_json(store, keys::CONTROL_MAP, &controls)?;
    }

    let environment: Vec<Value> = module
        .environment()
        .map(|(name, var)| serde_json::json!([name, var.ty.name(), var.value.to_json()]))
        .collect();
    if !environment.is_empty() {
        put_json(store, keys::ENVIRONMENT, &environment)?;
    }

    for (key, bytes) in module.blobs() {
        store.put(key, bytes.to_vec())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::store::MemoryStore;
    use crate::sheet::trigger::FieldValue;
    use serde_json::json;

    #[test]
    fn test_stored_trigger_format() {
        let mut module = Module::new();
        let id = module.add_pattern(Pattern::new(Tstamp::from_beats(8))).unwrap();
        let column = module
            .pattern_mut(id)
            .unwrap()
            .column_mut(ColumnId::Channel(1))
            .unwrap();
        column.insert(Tstamp::new(1, 5), ".i", &[json!(3)]).unwrap();
        column.insert(Tstamp::new(1, 5), "n-", &[]).unwrap();

        let mut store = MemoryStore::new();
        save_module(&module, &mut store).unwrap();

        let stored: Value =
            serde_json::from_slice(&store.get("pat_000/col_01/p_triggers.json").unwrap().unwrap()).unwrap();
        assert_eq!(stored, json!([[[1, 5], [".i", [3]]], [[1, 5], ["n-", []]]]));
        let header: Value = serde_json::from_slice(&store.get("pat_000/p_pattern.json").unwrap().unwrap()).unwrap();
        assert_eq!(header["length"], json!([8, 0]));
    }

    #[test]
    fn test_save_then_load_preserves_module() {
        let mut module = Module::new();
        let id = module.add_pattern(Pattern::new(Tstamp::from_beats(4))).unwrap();
        let instance = module.new_instance(id).unwrap();
        let pattern = module.pattern_mut(id).unwrap();
        pattern
            .column_mut(ColumnId::Global)
            .unwrap()
            .insert(Tstamp::ZERO, "W.t", &[json!(140)])
            .unwrap();
        pattern
            .column_mut(ColumnId::Channel(0))
            .unwrap()
            .insert(Tstamp::from_f64(0.5), "n+", &[json!(-300.0)])
            .unwrap();
        let mut song = Song::default();
        song.push(instance);
        module.add_song(song).unwrap();
        module.set_control(2, 5).unwrap();
        module.set_env("speed", FieldType::Real, &json!(1.5)).unwrap();
        module.set_blob("ins_05/p_manifest.json", b"{}".to_vec()).unwrap();

        let mut store = MemoryStore::new();
        save_module(&module, &mut store).unwrap();
        let report = load_module(&store).unwrap();

        assert!(report.is_clean(), "{:?}", report.problems);
        assert_eq!(report.module, module);
        assert_eq!(report.module.env("speed").unwrap().value, FieldValue::Real(1.5));
    }

    #[test]
    fn test_malformed_data_treated_as_missing() {
        let mut store = MemoryStore::new();
        store.put("pat_000/p_pattern.json", b"{not json".to_vec()).unwrap();
        store
            .put("pat_000/col_00/p_triggers.json", br#"[[[0,0],["n-",[]]],[[1,0],7]]"#.to_vec())
            .unwrap();
        store
            .put("pat_000/gcol/p_triggers.json", br#"[[[0,0],["C.P",[1]]]]"#.to_vec())
            .unwrap();
        store.put("song_00/p_order_list.json", b"\"nope\"".to_vec()).unwrap();

        let report = load_module(&store).unwrap();
        let pattern = report.module.pattern(0).unwrap();

        // Missing header: default length
        assert_eq!(pattern.length(), Pattern::default().length());
        // The good trigger survives, the bad one is skipped
        assert_eq!(pattern.column(ColumnId::Channel(0)).unwrap().trigger_count(), 1);
        // Channel kind in the global column is rejected
        assert!(pattern.global().is_empty());
        assert!(report.module.song(0).unwrap().is_empty());
        // One report per key
        assert_eq!(report.problems.len(), 4);
    }

    #[test]
    fn test_unknown_kind_retained() {
        let mut store = MemoryStore::new();
        store
            .put("pat_000/col_00/p_triggers.json", br#"[[[0,0],["zz",[1,2]]]]"#.to_vec())
            .unwrap();
        let report = load_module(&store).unwrap();
        let column = report.module.pattern(0).unwrap().column(ColumnId::Channel(0)).unwrap();
        let trigger = column.trigger(Tstamp::ZERO, 0).unwrap();
        assert_eq!(trigger.kind(), "zz");
        assert!(!trigger.is_valid());
    }

    #[test]
    fn test_unknown_kind_kept_in_global_column() {
        let raw = br#"[[[0,0],["zzz",[1]]]]"#.to_vec();
        let mut store = MemoryStore::new();
        store.put("pat_000/gcol/p_triggers.json", raw.clone()).unwrap();

        let report = load_module(&store).unwrap();
        assert!(report.is_clean(), "{:?}", report.problems);
        let global = report.module.pattern(0).unwrap().global();
        let trigger = global.trigger(Tstamp::ZERO, 0).unwrap();
        assert_eq!(trigger.kind(), "zzz");
        assert!(!trigger.is_valid());

        let mut saved = MemoryStore::new();
        save_module(&report.module, &mut saved).unwrap();
        assert_eq!(saved.get("pat_000/gcol/p_triggers.json").unwrap(), Some(raw));
    }

    #[test]
    fn test_known_kind_in_wrong_column_dropped() {
        let mut store = MemoryStore::new();
        store
            .put("pat_000/gcol/p_triggers.json", br#"[[[0,0],["n-",[]]]]"#.to_vec())
            .unwrap();
        let report = load_module(&store).unwrap();
        assert_eq!(report.problems.len(), 1);
        assert!(report.module.pattern(0).unwrap().global().is_empty());
    }
}
