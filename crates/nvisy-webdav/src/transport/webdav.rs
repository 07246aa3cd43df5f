//! WebDAV transport backed by an OpenDAL operator.

use derive_more::Deref;
use opendal::{Entry, Operator, services};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{Connector, DirEntry, ObjectStream, Transport};
use crate::path::as_dir;
use crate::{Credentials, Error, Result, TRACING_TARGET_CONNECTION};

/// Opens WebDAV connections through OpenDAL.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpendalConnector;

#[async_trait::async_trait]
impl Connector for OpendalConnector {
    type Transport = OpendalTransport;

    const ID: &str = "webdav";

    async fn connect(&self, credentials: &Credentials) -> Result<OpendalTransport> {
        let mut builder = services::Webdav::default().endpoint(&credentials.endpoint);

        if !credentials.username.is_empty() {
            builder = builder.username(&credentials.username);
        }

        if !credentials.password.is_empty() {
            builder = builder.password(&credentials.password);
        }

        let operator = Operator::new(builder)
            .map(|op| op.finish())
            .map_err(|e| Error::connection(&credentials.endpoint, e))?;

        operator.check().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                endpoint = %credentials.endpoint,
                error = %e,
                "Error connecting to WebDAV server"
            );
            Error::connection(&credentials.endpoint, e)
        })?;

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            endpoint = %credentials.endpoint,
            "Connected to WebDAV server"
        );

        Ok(OpendalTransport(operator))
    }
}

/// A WebDAV connection wrapping an OpenDAL [`Operator`].
#[derive(Debug, Clone, Deref)]
pub struct OpendalTransport(Operator);

impl OpendalTransport {
    /// Wraps an already configured operator.
    pub fn new(operator: Operator) -> Self {
        Self(operator)
    }
}

/// OpenDAL addresses collections with a trailing `/` and the root as `/`.
fn collection_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_owned()
    } else {
        as_dir(path).into_owned()
    }
}

/// Converts a listing entry, skipping the listed collection itself.
fn to_dir_entry(entry: &Entry, listed: &str) -> Option<DirEntry> {
    let name = entry.name().trim_end_matches('/');
    if name.is_empty() || entry.path() == listed {
        return None;
    }

    Some(DirEntry {
        name: name.to_owned(),
        is_dir: entry.metadata().is_dir(),
    })
}

#[async_trait::async_trait]
impl Transport for OpendalTransport {
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = collection_path(path);
        let entries = self.0.list(&dir).await?;

        // Some servers answer a PROPFIND on a missing collection with an
        // empty multistatus instead of 404.
        if entries.is_empty() {
            self.0.stat(&dir).await?;
        }

        let listed = dir.trim_start_matches('/');
        Ok(entries
            .iter()
            .filter_map(|entry| to_dir_entry(entry, listed))
            .collect())
    }

    async fn create_dir_all(&self, path: &str) -> Result<()> {
        self.0.create_dir(&collection_path(path)).await?;
        Ok(())
    }

    async fn write(&self, path: &str, body: &mut (dyn AsyncRead + Send + Unpin)) -> Result<u64> {
        // The WebDAV service uploads with a single PUT and rejects a second
        // write on the same writer, so the body is sent in one piece.
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;

        let written = data.len() as u64;
        self.0.write(path, data).await?;

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            path = %path,
            size = written,
            "Uploaded file"
        );

        Ok(written)
    }

    async fn read(&self, path: &str) -> Result<ObjectStream> {
        // Readers are lazy; stat first so a missing object fails here.
        self.0.stat(path).await?;

        let reader = self.0.reader(path).await?;
        let stream = reader.into_bytes_stream(..).await?;
        Ok(Box::pin(stream))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.0.delete(path).await?;
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<()> {
        self.0.delete(&collection_path(path)).await?;
        Ok(())
    }
}
