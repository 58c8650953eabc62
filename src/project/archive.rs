// Archive - tar export and import of compositions, instruments and effects
// Member names are store keys relative to the exported subtree.

use crate::engine::CancelFlag;
use crate::project::ProjectError;
use crate::project::keys::is_valid_key;
use crate::project::store::Store;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// What an archive holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A whole composition (`.kqt`)
    Module,
    /// One instrument subtree (`.kqti`)
    Instrument,
    /// One effect subtree (`.kqte`)
    Effect,
}

impl ArchiveKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Module => "kqt",
            ArchiveKind::Instrument => "kqti",
            ArchiveKind::Effect => "kqte",
        }
    }

    /// Store prefix of slot `index`; the module lives at the root
    pub fn prefix(&self, index: usize) -> String {
        match self {
            ArchiveKind::Module => String::new(),
            ArchiveKind::Instrument => format!("ins_{:02x}/", index),
            ArchiveKind::Effect => format!("eff_{:02x}/", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

/// Kind and compression of an archive file, from its suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveFormat {
    pub kind: ArchiveKind,
    pub compression: Compression,
}

impl ArchiveFormat {
    pub fn from_path(path: &Path) -> Result<Self, ProjectError> {
        let unknown = || ProjectError::UnknownArchiveFormat(path.to_path_buf());
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(unknown)?
            .to_ascii_lowercase();

        let (stem, compression) = if let Some(stem) = name.strip_suffix(".gz") {
            (stem, Compression::Gzip)
        } else if let Some(stem) = name.strip_suffix(".bz2") {
            (stem, Compression::Bzip2)
        } else {
            (name.as_str(), Compression::None)
        };

        let kind = [ArchiveKind::Module, ArchiveKind::Instrument, ArchiveKind::Effect]
            .into_iter()
            .find(|kind| {
                stem.rsplit_once('.')
                    .is_some_and(|(base, ext)| !base.is_empty() && ext == kind.extension())
            })
            .ok_or_else(unknown)?;
        Ok(Self { kind, compression })
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ArchiveKind::Module => "module",
            ArchiveKind::Instrument => "instrument",
            ArchiveKind::Effect => "effect",
        };
        match self.compression {
            Compression::None => write!(f, "{} (tar)", kind),
            Compression::Gzip => write!(f, "{} (tar.gz)", kind),
            Compression::Bzip2 => write!(f, "{} (tar.bz2)", kind),
        }
    }
}

/// One member of an archive
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub key: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

fn write_tar<W: Write>(writer: W, members: &[(String, Vec<u8>)], cancel: &CancelFlag) -> Result<W, ProjectError> {
    let mtime = Utc::now().timestamp().max(0) as u64;
    let mut builder = tar::Builder::new(writer);
    for (key, bytes) in members {
        if cancel.is_cancelled() {
            return Err(ProjectError::Cancelled);
        }
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder.append_data(&mut header, key, bytes.as_slice())?;
    }
    Ok(builder.into_inner()?)
}

/// Write the subtree of `store` under `prefix` to an archive at `path`
///
/// Returns the number of members written.
pub fn export(
    store: &dyn Store,
    prefix: &str,
    path: &Path,
    cancel: &CancelFlag,
) -> Result<usize, ProjectError> {
    let format = ArchiveFormat::from_path(path)?;
    let mut members = Vec::new();
    for key in store.keys(prefix)? {
        if let Some(bytes) = store.get(&key)? {
            members.push((key[prefix.len()..].to_string(), bytes));
        }
    }

    let file = BufWriter::new(File::create(path)?);
    let mut file = match format.compression {
        Compression::None => write_tar(file, &members, cancel)?,
        Compression::Gzip => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            write_tar(encoder, &members, cancel)?.finish()?
        }
        Compression::Bzip2 => {
            let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            write_tar(encoder, &members, cancel)?.finish()?
        }
    };
    file.flush()?;

    log::info!("Exported {} members to {} as {}", members.len(), path.display(), format);
    Ok(members.len())
}

fn open_reader(path: &Path) -> Result<(ArchiveFormat, Box<dyn Read>), ProjectError> {
    let format = ArchiveFormat::from_path(path)?;
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = match format.compression {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
    };
    Ok((format, reader))
}

/// Visit the file members of an archive in order
fn for_each_member<F>(path: &Path, cancel: &CancelFlag, mut visit: F) -> Result<ArchiveFormat, ProjectError>
where
    F: FnMut(Member, Vec<u8>) -> Result<(), ProjectError>,
{
    let (format, reader) = open_reader(path)?;
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        if cancel.is_cancelled() {
            return Err(ProjectError::Cancelled);
        }
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let key = entry
            .path()?
            .to_str()
            .map(|p| p.replace('\\', "/"))
            .ok_or_else(|| ProjectError::InvalidKey(String::from_utf8_lossy(&entry.path_bytes()).into_owned()))?;
        let key = key.trim_start_matches("./").to_string();
        if !is_valid_key(&key) {
            return Err(ProjectError::InvalidKey(key));
        }
        let modified = entry
            .header()
            .mtime()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(i64::try_from(secs).ok()?, 0));
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        let member = Member {
            key,
            size: bytes.len() as u64,
            modified,
        };
        visit(member, bytes)?;
    }
    Ok(format)
}

/// Read the archive at `path` into `store` under `prefix`
///
/// The subtree is replaced only after the whole archive has been read, so a
/// cancelled or failed import leaves the store untouched. An empty prefix
/// replaces the entire store.
pub fn import(
    path: &Path,
    store: &mut dyn Store,
    prefix: &str,
    cancel: &CancelFlag,
) -> Result<usize, ProjectError> {
    let mut staged = Vec::new();
    let format = for_each_member(path, cancel, |member, bytes| {
        staged.push((format!("{}{}", prefix, member.key), bytes));
        Ok(())
    })?;

    store.delete_subtree(prefix)?;
    let count = staged.len();
    for (key, bytes) in staged {
        store.put(&key, bytes)?;
    }
    log::info!("Imported {} members from {} as {}", count, path.display(), format);
    Ok(count)
}

/// Format and members of the archive at `path`
pub fn list(path: &Path) -> Result<(ArchiveFormat, Vec<Member>), ProjectError> {
    let mut members = Vec::new();
    let format = for_each_member(path, &CancelFlag::new(), |member, _| {
        members.push(member);
        Ok(())
    })?;
    Ok((format, members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::store::MemoryStore;
    use tempfile::TempDir;

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.put("pat_000/p_pattern.json", br#"{"length":[16,0]}"#.to_vec()).unwrap();
        store.put("song_00/p_order_list.json", b"[[0,0]]".to_vec()).unwrap();
        store.put("ins_01/p_manifest.json", b"{}".to_vec()).unwrap();
        store.put("ins_01/gen_00/p_gen_type.json", b"\"add\"".to_vec()).unwrap();
        store
    }

    #[test]
    fn test_format_from_suffix() {
        let f = |name: &str| ArchiveFormat::from_path(Path::new(name));
        assert_eq!(
            f("song.kqt").unwrap(),
            ArchiveFormat {
                kind: ArchiveKind::Module,
                compression: Compression::None
            }
        );
        assert_eq!(f("song.kqt.gz").unwrap().compression, Compression::Gzip);
        assert_eq!(f("dir/piano.KQTI.bz2").unwrap().kind, ArchiveKind::Instrument);
        assert_eq!(f("echo.kqte").unwrap().kind, ArchiveKind::Effect);
        assert!(matches!(f("song.zip"), Err(ProjectError::UnknownArchiveFormat(_))));
        assert!(f(".kqt").is_err());
    }

    #[test]
    fn test_module_archive_each_compression() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        for name in ["a.kqt", "b.kqt.gz", "c.kqt.bz2"] {
            let path = dir.path().join(name);
            assert_eq!(export(&store, "", &path, &CancelFlag::new()).unwrap(), 4);

            let mut restored = MemoryStore::new();
            import(&path, &mut restored, "", &CancelFlag::new()).unwrap();
            assert_eq!(restored, store, "{}", name);
        }
    }

    #[test]
    fn test_instrument_moves_between_slots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lead.kqti.gz");
        let store = sample_store();
        export(&store, &ArchiveKind::Instrument.prefix(1), &path, &CancelFlag::new()).unwrap();

        let (format, members) = list(&path).unwrap();
        assert_eq!(format.kind, ArchiveKind::Instrument);
        let keys: Vec<&str> = members.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["gen_00/p_gen_type.json", "p_manifest.json"]);
        assert!(members.iter().all(|m| m.modified.is_some()));

        let mut target = MemoryStore::new();
        target.put("ins_07/old.json", b"1".to_vec()).unwrap();
        import(&path, &mut target, &ArchiveKind::Instrument.prefix(7), &CancelFlag::new()).unwrap();
        assert_eq!(
            target.keys("").unwrap(),
            vec!["ins_07/gen_00/p_gen_type.json", "ins_07/p_manifest.json"]
        );
    }

    #[test]
    fn test_cancelled_import_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.kqt");
        export(&sample_store(), "", &path, &CancelFlag::new()).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut target = MemoryStore::new();
        assert!(matches!(
            import(&path, &mut target, "", &cancel),
            Err(ProjectError::Cancelled)
        ));
        assert!(target.is_empty());
    }

    #[test]
    fn test_module_import_replaces_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.kqt");
        export(&sample_store(), "", &path, &CancelFlag::new()).unwrap();

        let mut target = MemoryStore::new();
        target.put("pat_009/p_pattern.json", b"{}".to_vec()).unwrap();
        target.put("song_00/p_order_list.json", b"[]".to_vec()).unwrap();
        let count = import(&path, &mut target, "", &CancelFlag::new()).unwrap();

        assert_eq!(count, 4);
        assert_eq!(target.keys("").unwrap(), sample_store().keys("").unwrap());
        assert_eq!(target.get("song_00/p_order_list.json").unwrap(), Some(b"[[0,0]]".to_vec()));
    }

    #[test]
    fn test_rejects_escaping_member() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evil.kqt");
        let mut builder = tar::Builder::new(File::create(&path).unwrap());
        let mut header = tar::Header::new_gnu();
        header.set_size(1);
        header.set_mode(0o644);
        // Bypass the path checks of append_data
        header.as_gnu_mut().unwrap().name[..9].copy_from_slice(b"../x.json");
        header.set_cksum();
        builder.append(&header, &b"1"[..]).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let mut target = MemoryStore::new();
        assert!(matches!(
            import(&path, &mut target, "", &CancelFlag::new()),
            Err(ProjectError::InvalidKey(_))
        ));
    }
}
