//! In-memory transport with WebDAV collection semantics.
//!
//! Directories are explicit: writing a file requires its parent collection
//! to exist, and removing a collection removes everything below it. Listing
//! or reading a missing path is reported as [`Error::NotFound`]; removing
//! one succeeds, as a WebDAV `DELETE` answered with 404 does through OpenDAL.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use opendal::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

use super::{Connector, DirEntry, ObjectStream, Transport};
use crate::path::split_dir_and_name;
use crate::{Credentials, Error, Result};

#[derive(Debug, Default)]
struct MemoryState {
    /// Directory paths without leading or trailing `/`. The root is implicit.
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Bytes>,
    unreachable: bool,
    failing_listings: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_removals: HashSet<String>,
}

impl MemoryState {
    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }

    fn create_dir_all(&mut self, path: &str) -> Result<()> {
        let mut end = 0;
        while end < path.len() {
            end = path[end..]
                .find('/')
                .map_or(path.len(), |i| end + i);
            let ancestor = &path[..end];
            if self.files.contains_key(ancestor) {
                return Err(Error::Backend(opendal::Error::new(
                    ErrorKind::NotADirectory,
                    format!("'{ancestor}' is a file"),
                )));
            }
            self.dirs.insert(ancestor.to_owned());
            end += 1;
        }
        Ok(())
    }

    fn check_listing(&self, path: &str) -> Result<()> {
        reject_if(&self.failing_listings, path, "listing")
    }

    fn check_write(&self, path: &str) -> Result<()> {
        reject_if(&self.failing_writes, path, "write")
    }

    fn check_removal(&self, path: &str) -> Result<()> {
        reject_if(&self.failing_removals, path, "removal")
    }
}

fn reject_if(failing: &HashSet<String>, path: &str, operation: &str) -> Result<()> {
    if failing.contains(path) {
        return Err(Error::Backend(opendal::Error::new(
            ErrorKind::Unexpected,
            format!("{operation} of '{path}' rejected"),
        )));
    }
    Ok(())
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn parent_of(path: &str) -> &str {
    split_dir_and_name(path).0
}

/// Opens connections to a shared in-memory tree.
///
/// Clones share the same tree, so a test can keep one handle for setup and
/// inspection while the store under test holds another.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryConnector {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent [`connect`](Connector::connect) fail.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    /// Makes listings of the directory at `path` fail with a backend error.
    pub async fn fail_listing_of(&self, path: &str) {
        let path = normalize(path).to_owned();
        self.state.write().await.failing_listings.insert(path);
    }

    /// Makes writes of the file at `path`, or creation of the directory at
    /// `path`, fail with a backend error.
    pub async fn fail_write_of(&self, path: &str) {
        let path = normalize(path).to_owned();
        self.state.write().await.failing_writes.insert(path);
    }

    /// Makes removals of `path` fail with a backend error.
    pub async fn fail_removal_of(&self, path: &str) {
        let path = normalize(path).to_owned();
        self.state.write().await.failing_removals.insert(path);
    }

    /// Creates a directory and its parents.
    pub async fn insert_dir(&self, path: &str) -> Result<()> {
        self.state.write().await.create_dir_all(normalize(path))
    }

    /// Stores a file, creating its parent directories.
    pub async fn insert_file(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state.write().await;
        state.create_dir_all(parent_of(path))?;
        state.files.insert(path.to_owned(), data.into());
        Ok(())
    }

    /// Returns `true` if a file exists at `path`.
    pub async fn contains_file(&self, path: &str) -> bool {
        self.state.read().await.files.contains_key(normalize(path))
    }

    /// Returns `true` if a directory exists at `path`.
    pub async fn contains_dir(&self, path: &str) -> bool {
        self.state.read().await.is_dir(normalize(path))
    }

    /// Returns the paths of all stored files in lexical order.
    pub async fn files(&self) -> Vec<String> {
        self.state.read().await.files.keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    const ID: &str = "memory";

    async fn connect(&self, credentials: &Credentials) -> Result<MemoryTransport> {
        if self.state.read().await.unreachable {
            return Err(Error::connection(
                &credentials.endpoint,
                "server is unreachable",
            ));
        }

        Ok(MemoryTransport {
            state: Arc::clone(&self.state),
        })
    }
}

/// A connection to a [`MemoryConnector`] tree.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<RwLock<MemoryState>>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = normalize(path);
        let state = self.state.read().await;
        state.check_listing(dir)?;
        if !state.is_dir(dir) {
            return Err(Error::not_found(path));
        }

        let child_name = |child: &str| -> Option<String> {
            let (parent, name) = split_dir_and_name(child);
            (parent == dir && !name.is_empty()).then(|| name.to_owned())
        };

        let mut entries: Vec<DirEntry> = state
            .dirs
            .iter()
            .filter_map(|d| child_name(d).map(DirEntry::dir))
            .chain(
                state
                    .files
                    .keys()
                    .filter_map(|f| child_name(f).map(DirEntry::file)),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(entries)
    }

    async fn create_dir_all(&self, path: &str) -> Result<()> {
        let dir = normalize(path);
        let mut state = self.state.write().await;
        state.check_write(dir)?;
        state.create_dir_all(dir)
    }

    async fn write(&self, path: &str, body: &mut (dyn AsyncRead + Send + Unpin)) -> Result<u64> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;

        let file = normalize(path);
        let mut state = self.state.write().await;
        state.check_write(file)?;
        if !state.is_dir(parent_of(file)) {
            return Err(Error::not_found(parent_of(file)));
        }
        if state.is_dir(file) {
            return Err(Error::Backend(opendal::Error::new(
                ErrorKind::IsADirectory,
                format!("'{file}' is a directory"),
            )));
        }

        let written = data.len() as u64;
        state.files.insert(file.to_owned(), Bytes::from(data));
        Ok(written)
    }

    async fn read(&self, path: &str) -> Result<ObjectStream> {
        let state = self.state.read().await;
        let data = state
            .files
            .get(normalize(path))
            .cloned()
            .ok_or_else(|| Error::not_found(path))?;

        Ok(stream::iter([Ok(data)]).boxed())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let file = normalize(path);
        let mut state = self.state.write().await;
        state.check_removal(file)?;

        state.files.remove(file);
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<()> {
        let dir = normalize(path);
        let mut state = self.state.write().await;
        state.check_removal(dir)?;

        state.dirs.remove(dir);
        let nested = format!("{dir}/");
        state.dirs.retain(|d| !d.starts_with(&nested));
        state.files.retain(|f, _| !f.starts_with(&nested));
        Ok(())
    }
}
