// Project store - flat key-value map of store keys to stored bytes

use crate::project::ProjectError;
use crate::project::keys::is_valid_key;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key-value store holding a composition
///
/// Keys are slash-separated relative paths. The UI is the only writer.
pub trait Store {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProjectError>;

    fn put(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), ProjectError>;

    /// Keys starting with `prefix`, in lexicographic order
    fn keys(&self, prefix: &str) -> Result<Vec<String>, ProjectError>;

    /// Remove every key starting with `prefix`
    fn delete_subtree(&mut self, prefix: &str) -> Result<(), ProjectError>;
}

fn check_key(key: &str) -> Result<(), ProjectError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(ProjectError::InvalidKey(key.to_string()))
    }
}

/// In-memory store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProjectError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), ProjectError> {
        check_key(key)?;
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, ProjectError> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn delete_subtree(&mut self, prefix: &str) -> Result<(), ProjectError> {
        self.entries.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

/// Store backed by a directory tree, one file per key
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, ProjectError> {
        check_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, c| path.join(c)))
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), ProjectError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            if entry.file_type()?.is_dir() {
                self.collect(&entry.path(), &key, out)?;
            } else {
                out.push(key);
            }
        }
        Ok(())
    }
}

impl Store for DirStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProjectError> {
        let path = self.path_of(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), ProjectError> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, ProjectError> {
        let mut keys = Vec::new();
        // Only walk below the directories the prefix names in full
        match prefix.rfind('/') {
            Some(end) => {
                let dir = &prefix[..end];
                let path = self.path_of(dir)?;
                if path.is_dir() {
                    self.collect(&path, dir, &mut keys)?;
                }
            }
            None => self.collect(&self.root, "", &mut keys)?,
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn delete_subtree(&mut self, prefix: &str) -> Result<(), ProjectError> {
        for key in self.keys(prefix)? {
            let path = self.path_of(&key)?;
            fs::remove_file(&path)?;
            // Drop directories left empty
            let mut dir = path.parent().map(Path::to_path_buf);
            while let Some(d) = dir {
                if d == self.root || fs::remove_dir(&d).is_err() {
                    break;
                }
                dir = d.parent().map(Path::to_path_buf);
            }
        }
        Ok(())
    }
}
