// Module persistence across directory stores and archives

use kunquat_sheet::project::archive::{self, ArchiveKind};
use kunquat_sheet::project::{DirStore, MemoryStore, Store, load_module, save_module};
use kunquat_sheet::sheet::Song;
use kunquat_sheet::sheet::trigger::FieldType;
use kunquat_sheet::ui::app::{read_module, write_module};
use kunquat_sheet::{CancelFlag, ColumnId, Module, Pattern, Tstamp};
use serde_json::json;
use tempfile::TempDir;

fn composition() -> Module {
    let mut module = Module::new();
    let verse = module.add_pattern(Pattern::new(Tstamp::from_beats(8))).unwrap();
    let chorus = module.add_pattern(Pattern::new(Tstamp::from_beats(4))).unwrap();

    let pattern = module.pattern_mut(verse).unwrap();
    pattern
        .column_mut(ColumnId::Global)
        .unwrap()
        .insert(Tstamp::ZERO, "W.t", &[json!(132)])
        .unwrap();
    let lead = pattern.column_mut(ColumnId::Channel(0)).unwrap();
    lead.insert(Tstamp::ZERO, ".i", &[json!(1)]).unwrap();
    lead.insert(Tstamp::ZERO, "n+", &[json!(-900)]).unwrap();
    lead.insert(Tstamp::new(3, 441_080_640), "n-", &[]).unwrap();
    module
        .pattern_mut(chorus)
        .unwrap()
        .column_mut(ColumnId::Channel(5))
        .unwrap()
        .insert(Tstamp::from_beats(1), "n+", &[json!(700)])
        .unwrap();

    let first = module.new_instance(verse).unwrap();
    let second = module.new_instance(verse).unwrap();
    let refrain = module.new_instance(chorus).unwrap();
    let mut song = Song::default();
    song.push(first);
    song.push(refrain);
    song.push(second);
    module.add_song(song).unwrap();

    module.set_control(0, 1).unwrap();
    module.set_env("swing", FieldType::Real, &json!(0.25)).unwrap();
    module.set_blob("ins_01/p_manifest.json", br#"{"type":"ins"}"#.to_vec()).unwrap();
    module
}

#[test]
fn test_dir_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let module = composition();

    let mut store = DirStore::open(dir.path().join("song")).unwrap();
    save_module(&module, &mut store).unwrap();
    assert!(dir.path().join("song/pat_000/col_00/p_triggers.json").is_file());
    assert!(dir.path().join("song/pat_000/gcol/p_triggers.json").is_file());

    let reopened = DirStore::open(dir.path().join("song")).unwrap();
    let report = load_module(&reopened).unwrap();
    assert!(report.is_clean(), "{:?}", report.problems);
    assert_eq!(report.module, module);
}

#[test]
fn test_saving_drops_removed_patterns() {
    let dir = TempDir::new().unwrap();
    let mut module = composition();
    let mut store = DirStore::open(dir.path()).unwrap();
    save_module(&module, &mut store).unwrap();

    module.remove_pattern(1);
    save_module(&module, &mut store).unwrap();
    assert!(store.keys("pat_001/").unwrap().is_empty());

    // The song still names the missing pattern
    let report = load_module(&store).unwrap();
    assert_eq!(report.module.dangling_refs(0).len(), 1);
}

#[test]
fn test_module_archive_round_trip() {
    let dir = TempDir::new().unwrap();
    let module = composition();

    for name in ["a.kqt", "b.kqt.gz", "c.kqt.bz2"] {
        let path = dir.path().join(name);
        let written = write_module(&module, &path).unwrap();
        assert!(written > 0);

        let (loaded, problems) = read_module(&path).unwrap();
        assert_eq!(problems, 0);
        assert_eq!(loaded, module);
    }
}

#[test]
fn test_instrument_archive_from_module() {
    let dir = TempDir::new().unwrap();
    let module = composition();
    let mut store = MemoryStore::new();
    save_module(&module, &mut store).unwrap();

    let path = dir.path().join("lead.kqti.gz");
    let count = archive::export(&store, &ArchiveKind::Instrument.prefix(1), &path, &CancelFlag::new()).unwrap();
    assert_eq!(count, 1);

    let (_, members) = archive::list(&path).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].key, "p_manifest.json");

    // Instrument archives are not modules
    assert!(read_module(&path).is_err());
}
