//! S3-style object store operations on top of a [`Transport`].
//!
//! Every operation opens its own connection, maps the bucket and key to a
//! storage path, performs the transport calls and maps results back. The
//! store keeps no mutable state and can be shared freely.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::AsyncRead;

use crate::config::{LogLevel, WebDavConfig};
use crate::listing::PrefixStrategy;
use crate::path::{PathMapper, split_dir_and_name};
use crate::transport::{Connector, ObjectStream, OpendalConnector, Transport};
use crate::{
    Error, Result, TRACING_TARGET_CONFIG, TRACING_TARGET_CONNECTION, TRACING_TARGET_LISTING,
    TRACING_TARGET_OBJECT,
};

/// Object store mapping buckets and keys onto a WebDAV directory tree.
#[derive(Debug, Clone)]
pub struct WebDavObjectStore<C = OpendalConnector> {
    config: WebDavConfig,
    mapper: PathMapper,
    strategy: PrefixStrategy,
    connector: C,
}

impl WebDavObjectStore {
    /// Initializes a store talking WebDAV from a plugin option map.
    ///
    /// Never fails: configuration problems are logged and surface on the
    /// first operation instead.
    pub fn init(options: &HashMap<String, String>) -> Self {
        Self::with_connector(WebDavConfig::from_options(options), OpendalConnector)
    }
}

impl<C: Connector> WebDavObjectStore<C> {
    /// Creates a store using `connector` for every operation.
    pub fn with_connector(config: WebDavConfig, connector: C) -> Self {
        let config = config.normalized();
        config.log_diagnostics();

        let mapper = PathMapper::new(&config.buckets_dir, config.delimiter.as_str());
        let strategy = PrefixStrategy::for_delimiter(&config.delimiter);

        if config.log_level.permits(LogLevel::Debug) {
            tracing::debug!(
                target: TRACING_TARGET_CONFIG,
                transport = C::ID,
                strategy = ?strategy,
                "WebDAV object store initialized"
            );
        }

        Self {
            config,
            mapper,
            strategy,
            connector,
        }
    }

    /// Initializes a store from a plugin option map with a custom connector.
    pub fn init_with(options: &HashMap<String, String>, connector: C) -> Self {
        Self::with_connector(WebDavConfig::from_options(options), connector)
    }

    /// Returns the normalized configuration.
    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    /// Returns the path mapper.
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Returns the listing strategy selected for the configured delimiter.
    pub fn strategy(&self) -> &PrefixStrategy {
        &self.strategy
    }

    /// Returns the connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn connect(&self) -> Result<C::Transport> {
        self.connector
            .connect(&self.config.credentials())
            .await
            .inspect_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTION,
                    root = %self.config.root,
                    error = %e,
                    "Error connecting to WebDAV server"
                );
            })
    }

    fn debug_enabled(&self) -> bool {
        self.config.log_level.permits(LogLevel::Debug)
    }

    /// Uploads `body` to `key`, creating missing parent directories.
    #[tracing::instrument(name = "webdav.put_object", skip(self, body))]
    pub async fn put_object<R>(&self, bucket: &str, key: &str, mut body: R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        let path = self.mapper.object_path(bucket, key);
        let (dir, _) = split_dir_and_name(&path);

        let transport = self.connect().await?;

        if !dir.is_empty() {
            transport
                .create_dir_all(dir)
                .await
                .map_err(|e| Error::write(dir, e))?;
        }

        let size = transport
            .write(&path, &mut body)
            .await
            .map_err(|e| Error::write(&path, e))?;

        if self.debug_enabled() {
            tracing::debug!(
                target: TRACING_TARGET_OBJECT,
                path = %path,
                size,
                "Object uploaded"
            );
        }

        Ok(())
    }

    /// Returns `true` if a file exists at `key`.
    ///
    /// A missing parent directory means the object does not exist.
    #[tracing::instrument(name = "webdav.object_exists", skip(self))]
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.mapper.object_path(bucket, key);
        let (dir, name) = split_dir_and_name(&path);

        let transport = self.connect().await?;

        let entries = match transport.read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        Ok(entries
            .iter()
            .any(|entry| !entry.is_dir && entry.name == name))
    }

    /// Opens a read stream for `key`.
    ///
    /// Unlike [`object_exists`](Self::object_exists), a missing object is an
    /// [`Error::NotFound`].
    #[tracing::instrument(name = "webdav.get_object", skip(self))]
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        let path = self.mapper.object_path(bucket, key);

        let transport = self.connect().await?;
        transport.read(&path).await
    }

    /// Lists the common prefixes below `prefix`.
    ///
    /// `delimiter` should match the configured one; a mismatch is reported
    /// and the given delimiter is used.
    #[tracing::instrument(name = "webdav.list_common_prefixes", skip(self))]
    pub async fn list_common_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> Result<Vec<String>> {
        let strategy = self.strategy_for(delimiter);

        let transport = self.connect().await?;
        let prefixes = strategy
            .common_prefixes(&transport, &self.mapper, bucket, prefix)
            .await?;

        if self.debug_enabled() {
            tracing::debug!(
                target: TRACING_TARGET_LISTING,
                count = prefixes.len(),
                "Listed common prefixes"
            );
        }

        Ok(prefixes)
    }

    /// Lists the keys directly below `prefix`.
    #[tracing::instrument(name = "webdav.list_objects", skip(self))]
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let transport = self.connect().await?;
        let objects = self
            .strategy
            .objects(&transport, &self.mapper, bucket, prefix)
            .await?;

        if self.debug_enabled() {
            tracing::debug!(
                target: TRACING_TARGET_LISTING,
                count = objects.len(),
                "Listed objects"
            );
        }

        Ok(objects)
    }

    /// Deletes `key` and, if that leaves it empty, its parent directory.
    ///
    /// Only the immediate parent is cleaned up. Failures of the removal, the
    /// parent listing or the parent removal are all reported as
    /// [`Error::Delete`].
    #[tracing::instrument(name = "webdav.delete_object", skip(self))]
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.mapper.object_path(bucket, key);
        let (dir, _) = split_dir_and_name(&path);

        let transport = self.connect().await?;

        transport
            .remove_file(&path)
            .await
            .map_err(|e| Error::delete(&path, e))?;

        // Never remove the server root.
        if dir.is_empty() {
            return Ok(());
        }

        let remaining = transport
            .read_dir(dir)
            .await
            .map_err(|e| Error::delete(dir, e))?;

        if remaining.is_empty() {
            transport
                .remove_dir(dir)
                .await
                .map_err(|e| Error::delete(dir, e))?;

            if self.debug_enabled() {
                tracing::debug!(
                    target: TRACING_TARGET_OBJECT,
                    dir = %dir,
                    "Removed empty directory"
                );
            }
        }

        Ok(())
    }

    /// Signed URLs have no WebDAV counterpart; this always fails with
    /// [`Error::Unsupported`].
    pub fn create_signed_url(&self, _bucket: &str, _key: &str, _ttl: Duration) -> Result<String> {
        Err(Error::unsupported("create_signed_url"))
    }

    fn strategy_for(&self, delimiter: &str) -> PrefixStrategy {
        if delimiter == self.config.delimiter {
            return self.strategy.clone();
        }

        tracing::warn!(
            target: TRACING_TARGET_LISTING,
            expected = %self.config.delimiter,
            actual = %delimiter,
            "Listing delimiter differs from the configured one, results may be incomplete"
        );
        PrefixStrategy::for_delimiter(delimiter)
    }
}
