//! File-backed store shared between processes

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};

use crate::format::Format;
use crate::store::{Commit, Store};
use crate::{Error, Result};

/// A store persisting its document to a single file.
///
/// Every transaction takes an exclusive advisory lock on a sidecar
/// `<file>.lock`, reads the document, runs the body and, on commit, writes
/// the new document with write-to-temp-then-rename. Independent worker
/// processes pointed at the same path are therefore serialized by the
/// filesystem, not by anything in memory.
#[derive(Debug)]
pub struct FileStore<D> {
    path: PathBuf,
    format: Format,
    _doc: PhantomData<fn() -> D>,
}

impl<D> FileStore<D> {
    /// Open a store at `path`; the format is detected from the extension.
    ///
    /// The file itself is created lazily on the first committed write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = Format::from_path(&path)?;
        Ok(Self {
            path,
            format,
            _doc: PhantomData,
        })
    }

    /// Path of the persisted document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }

    fn open_lock_file(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let lock_path = self.lock_path();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::io(&lock_path, e))
    }
}

impl<D> FileStore<D>
where
    D: Serialize + DeserializeOwned + Default,
{
    fn read_doc(&self) -> Result<D> {
        if !self.path.exists() {
            return Ok(D::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        if content.trim().is_empty() {
            return Ok(D::default());
        }
        self.format.decode(&self.path, &content)
    }

    fn write_doc(&self, doc: &D) -> Result<()> {
        let content = self.format.encode(&self.path, doc)?;
        let temp_path = self.temp_path();

        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;
        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| Error::io(&self.path, e))
    }
}

impl<D> Store for FileStore<D>
where
    D: Serialize + DeserializeOwned + Default,
{
    type Doc = D;

    fn transact(&self, op: &mut dyn FnMut(&mut D) -> Commit) -> Result<()> {
        let lock_file = self.open_lock_file()?;

        // Blocks while another transaction (any process) holds the lock
        lock_file.lock_exclusive().map_err(|_| Error::LockFailed {
            path: self.lock_path(),
        })?;

        let mut doc = self.read_doc()?;
        let commit = op(&mut doc);
        if commit == Commit::Write {
            self.write_doc(&doc)?;
            tracing::trace!(path = %self.path.display(), "committed store transaction");
        }

        // Lock released when lock_file is dropped
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{update, view};
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u64,
    }

    #[test]
    fn missing_file_reads_as_default() {
        let dir = tempdir().unwrap();
        let store: FileStore<Counter> = FileStore::open(dir.path().join("state.json")).unwrap();

        let counter = view(&store, |doc| doc.clone()).unwrap();
        assert_eq!(counter, Counter::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn committed_write_is_persisted_and_temp_file_cleaned() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let store: FileStore<Counter> = FileStore::open(&path).unwrap();

        let result: Result<()> = update(&store, |doc| {
            doc.value = 3;
            Ok(())
        });
        result.unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("value = 3"));
        assert!(!store.temp_path().exists());

        let reopened: FileStore<Counter> = FileStore::open(&path).unwrap();
        assert_eq!(view(&reopened, |doc| doc.value).unwrap(), 3);
    }

    #[test]
    fn discarded_write_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let store: FileStore<Counter> = FileStore::open(dir.path().join("state.json")).unwrap();

        let result: Result<()> = update(&store, |doc| {
            doc.value = 10;
            Err(Error::Aborted)
        });

        assert!(result.is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_document_reports_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store: FileStore<Counter> = FileStore::open(&path).unwrap();

        let err = view(&store, |doc| doc.value).unwrap_err();
        assert!(matches!(err, Error::Parse { format, .. } if format == "JSON"));
    }
}
