//! Translation between logical bucket/key addresses and WebDAV paths.
//!
//! Storage paths are built by literal concatenation:
//!
//! ```text
//! <buckets_dir><bucket><delimiter><key>
//! ```
//!
//! Directory membership on the server is always decided by the native
//! separator `/`, even when a different logical delimiter is configured.

use std::borrow::Cow;

/// The WebDAV path separator.
pub const SEPARATOR: &str = "/";

/// Builds the storage path of an object. Key content is not normalized.
pub fn storage_path(buckets_dir: &str, bucket: &str, key: &str, delimiter: &str) -> String {
    format!("{buckets_dir}{bucket}{delimiter}{key}")
}

/// Splits a path on its last `/` into directory and file name.
///
/// A path without any separator has an empty directory.
pub fn split_dir_and_name(path: &str) -> (&str, &str) {
    match path.rfind(SEPARATOR) {
        Some(i) => (&path[..i], &path[i + SEPARATOR.len()..]),
        None => ("", path),
    }
}

/// Terminates a non-empty prefix with `delimiter`.
pub fn normalize_prefix<'a>(prefix: &'a str, delimiter: &str) -> Cow<'a, str> {
    if prefix.is_empty() || prefix.ends_with(delimiter) {
        Cow::Borrowed(prefix)
    } else {
        Cow::Owned(format!("{prefix}{delimiter}"))
    }
}

/// Terminates a non-empty buckets directory with `/`.
pub fn normalize_buckets_dir(buckets_dir: &str) -> String {
    normalize_prefix(buckets_dir, SEPARATOR).into_owned()
}

/// Terminates a non-empty directory path with `/`.
pub(crate) fn as_dir(path: &str) -> Cow<'_, str> {
    normalize_prefix(path, SEPARATOR)
}

/// Path mapping bound to one buckets directory and delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    buckets_dir: String,
    delimiter: String,
}

impl PathMapper {
    /// Creates a mapper; `buckets_dir` is normalized to end with `/`.
    pub fn new(buckets_dir: &str, delimiter: impl Into<String>) -> Self {
        Self {
            buckets_dir: normalize_buckets_dir(buckets_dir),
            delimiter: delimiter.into(),
        }
    }

    /// Returns the normalized buckets directory.
    pub fn buckets_dir(&self) -> &str {
        &self.buckets_dir
    }

    /// Returns the logical delimiter.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Returns the storage path of `key` in `bucket`.
    pub fn object_path(&self, bucket: &str, key: &str) -> String {
        storage_path(&self.buckets_dir, bucket, key, &self.delimiter)
    }

    /// Returns the part of a storage path that precedes every key of
    /// `bucket`. Stripping it from a storage path yields the logical key.
    pub fn bucket_prefix(&self, bucket: &str) -> String {
        self.bucket_prefix_with(bucket, &self.delimiter)
    }

    /// Like [`bucket_prefix`](Self::bucket_prefix), with an explicit delimiter.
    pub fn bucket_prefix_with(&self, bucket: &str, delimiter: &str) -> String {
        storage_path(&self.buckets_dir, bucket, "", delimiter)
    }

    /// Returns the directory that holds the keys under `prefix` when the
    /// delimiter is the native separator. The result ends with `/`.
    pub fn listing_root(&self, bucket: &str, prefix: &str) -> String {
        let prefix = normalize_prefix(prefix, SEPARATOR);
        format!("{}{bucket}{SEPARATOR}{prefix}", self.buckets_dir)
    }
}
