//! JSON document persistence.
//!
//! Every feature keeps its durable state in one flat JSON file under the data
//! directory. A document is always loaded and saved whole, so files written by
//! earlier versions of the bot stay readable.
//!
//! Writers go through [`JsonStore::update`], which holds a per-document lock
//! across load, mutation and save so that two handlers touching the same
//! document never lose each other's changes. Saves write a temporary sibling
//! file, flush it to disk and rename it over the target.

/// Typed document layouts stored by the bot
pub mod documents;

use crate::errors::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex, PoisonError},
};
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, instrument};

pub use documents::*;

/// A JSON document persisted as one file in the store directory.
pub trait Document: Default + Serialize + DeserializeOwned + Send {
    /// File name inside the data directory.
    const FILE: &'static str;
}

/// Handle to the data directory. Clones share the same document locks.
#[derive(Clone)]
pub struct JsonStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    dir: PathBuf,
    locks: StdMutex<HashMap<&'static str, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("dir", &self.inner.dir)
            .finish_non_exhaustive()
    }
}

impl JsonStore {
    /// Opens a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                dir: dir.into(),
                locks: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn path_of<D: Document>(&self) -> PathBuf {
        self.inner.dir.join(D::FILE)
    }

    fn lock_of<D: Document>(&self) -> Arc<Mutex<()>> {
        let mut locks = self
            .inner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(D::FILE).or_default())
    }

    /// Loads a whole document. A missing or blank file yields the default.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the file exists but is not valid JSON
    /// for `D`, and [`Error::Io`] when it cannot be read.
    pub async fn load<D: Document>(&self) -> Result<D> {
        let path = self.path_of::<D>();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = D::FILE, "document missing, using default");
                return Ok(D::default());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(D::default());
        }

        serde_json::from_str(&contents).map_err(|e| Error::Storage {
            file: D::FILE.to_string(),
            message: e.to_string(),
        })
    }

    /// Saves a whole document, replacing the file atomically.
    pub async fn save<D: Document>(&self, document: &D) -> Result<()> {
        let _guard = self.lock_of::<D>().lock_owned().await;
        self.write(document).await
    }

    /// Loads, mutates and saves a document under its lock.
    ///
    /// Nothing is written when `mutate` fails; its error is returned as is.
    #[instrument(level = "debug", skip(self, mutate), fields(file = D::FILE))]
    pub async fn update<D, R, F>(&self, mutate: F) -> Result<R>
    where
        D: Document,
        R: Send,
        F: FnOnce(&mut D) -> Result<R> + Send,
    {
        let _guard = self.lock_of::<D>().lock_owned().await;
        let mut document = self.load::<D>().await?;
        let result = mutate(&mut document)?;
        self.write(&document).await?;
        Ok(result)
    }

    async fn write<D: Document>(&self, document: &D) -> Result<()> {
        tokio::fs::create_dir_all(&self.inner.dir).await?;

        let json = serde_json::to_string_pretty(document)?;
        let path = self.path_of::<D>();
        let tmp_path = self.inner.dir.join(format!(".{}.tmp", D::FILE));

        let mut tmp_file = tokio::fs::File::create(&tmp_path).await?;
        tmp_file.write_all(json.as_bytes()).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        tokio::fs::rename(&tmp_path, &path).await?;
        debug!(file = D::FILE, bytes = json.len(), "document saved");
        Ok(())
    }
}
