//! Hierarchical storage transports.
//!
//! The object store only needs a handful of file-system style calls from
//! the server. [`Connector`] opens a connection, [`Transport`] performs the
//! calls on it. Every store operation opens its own connection.

mod memory;
mod webdav;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

pub use self::memory::{MemoryConnector, MemoryTransport};
pub use self::webdav::{OpendalConnector, OpendalTransport};
use crate::{Credentials, Result};

/// Byte stream returned by [`Transport::read`].
///
/// The stream owns its connection resources; dropping it releases them.
pub type ObjectStream = BoxStream<'static, std::io::Result<Bytes>>;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirEntry {
    /// File or directory name, without any separator.
    pub name: String,
    /// Whether the entry is a collection.
    pub is_dir: bool,
}

impl DirEntry {
    /// Creates a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    /// Creates a directory entry.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// An open connection to a hierarchical store.
///
/// Paths use `/` as separator and are relative to the server root. Listing
/// or reading a missing path must be reported as
/// [`Error::NotFound`](crate::Error::NotFound); removing one succeeds.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Lists the direct children of the directory at `path`.
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Creates the directory at `path` and any missing parents.
    async fn create_dir_all(&self, path: &str) -> Result<()>;

    /// Streams `body` into the file at `path`, returning the bytes written.
    async fn write(&self, path: &str, body: &mut (dyn AsyncRead + Send + Unpin)) -> Result<u64>;

    /// Opens a read stream for the file at `path`.
    async fn read(&self, path: &str) -> Result<ObjectStream>;

    /// Removes the file at `path`.
    async fn remove_file(&self, path: &str) -> Result<()>;

    /// Removes the directory at `path`.
    async fn remove_dir(&self, path: &str) -> Result<()>;
}

/// Factory for transport connections.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by [`connect`](Self::connect).
    type Transport: Transport;

    /// Unique identifier (e.g. "webdav", "memory").
    const ID: &str;

    /// Opens a connection, failing with [`Error::Connection`](crate::Error::Connection)
    /// if the server is unreachable or rejects the credentials.
    async fn connect(&self, credentials: &Credentials) -> Result<Self::Transport>;
}
