use ferrous_doh_application::ports::PinStore;
use ferrous_doh_domain::DomainError;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use toml_edit::{DocumentMut, Item, Value};
use tracing::debug;

/// Identity of the file contents last loaded. Writes go through a rename,
/// so every rewrite lands on a fresh inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    inode: u64,
    modified: Option<SystemTime>,
    len: u64,
}

struct Snapshot {
    doc: DocumentMut,
    /// `None` while the file does not exist.
    stamp: Option<FileStamp>,
}

/// Certificate pins kept as top-level string keys of a TOML file, e.g.
/// `CERT_PIN_dns.google = "AB:CD:..."`. Every change is written through;
/// comments and unrelated keys in the file are preserved.
///
/// The file is shared with other processes (`ferrous-doh pin` while a
/// session runs), so every access reloads it when it changed on disk.
pub struct FilePinStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl FilePinStore {
    /// Opens the store, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let stamp = file_stamp(&path)?;
        let doc = match stamp {
            Some(_) => read_document(&path)?,
            None => DocumentMut::new(),
        };

        debug!(path = %path.display(), entries = doc.len(), "Pin store opened");
        Ok(Self {
            path,
            snapshot: Mutex::new(Snapshot { doc, stamp }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self, snapshot: &mut Snapshot) -> Result<(), DomainError> {
        let stamp = file_stamp(&self.path)?;
        if stamp == snapshot.stamp {
            return Ok(());
        }

        snapshot.doc = match stamp {
            Some(_) => read_document(&self.path)?,
            None => DocumentMut::new(),
        };
        snapshot.stamp = stamp;
        debug!(path = %self.path.display(), entries = snapshot.doc.len(), "Pin store reloaded");
        Ok(())
    }

    /// Applies `change` to a copy of the current document and swaps it in
    /// only once the copy is on disk.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut DocumentMut) -> Option<T>,
    ) -> Result<Option<T>, DomainError> {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        self.refresh(&mut snapshot)?;

        let mut doc = snapshot.doc.clone();
        let Some(result) = change(&mut doc) else {
            return Ok(None);
        };

        self.persist(&doc)?;
        snapshot.stamp = file_stamp(&self.path)?;
        snapshot.doc = doc;
        Ok(Some(result))
    }

    fn persist(&self, doc: &DocumentMut) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, doc.to_string()).map_err(|e| self.write_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.write_error(e))
    }

    fn write_error(&self, e: std::io::Error) -> DomainError {
        DomainError::PinStore(format!("Failed to write {}: {}", self.path.display(), e))
    }
}

fn file_stamp(path: &Path) -> Result<Option<FileStamp>, DomainError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp {
            inode: meta.ino(),
            modified: meta.modified().ok(),
            len: meta.len(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DomainError::PinStore(format!(
            "Failed to stat {}: {}",
            path.display(),
            e
        ))),
    }
}

fn read_document(path: &Path) -> Result<DocumentMut, DomainError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DocumentMut::new()),
        Err(e) => {
            return Err(DomainError::PinStore(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    contents
        .parse::<DocumentMut>()
        .map_err(|e| DomainError::PinStore(format!("Failed to parse {}: {}", path.display(), e)))
}

impl PinStore for FilePinStore {
    fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        self.refresh(&mut snapshot)?;
        Ok(snapshot.doc.get(key).and_then(Item::as_str).map(str::to_string))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.update(|doc| {
            match doc.get_mut(key) {
                Some(item @ Item::Value(_)) => {
                    let suffix = item.as_value().and_then(|v| v.decor().suffix()).cloned();
                    *item = Item::Value(Value::from(value));
                    if let (Some(s), Some(v)) = (suffix, item.as_value_mut()) {
                        v.decor_mut().set_suffix(s);
                    }
                }
                Some(item) => *item = Item::Value(Value::from(value)),
                None => {
                    doc.insert(key, Item::Value(Value::from(value)));
                }
            }
            Some(())
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, DomainError> {
        let removed = self.update(|doc| doc.remove(key).map(|_| ()))?;
        Ok(removed.is_some())
    }
}
