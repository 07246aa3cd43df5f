//! Object and common-prefix listings over a directory tree.
//!
//! With the native delimiter `/` the logical namespace is the directory
//! tree, so listings read only the directories below the requested prefix.
//! Any other delimiter is folded into file names, which forces a walk over
//! every file that could belong to the bucket.

use std::collections::HashSet;

use crate::path::{PathMapper, SEPARATOR, normalize_prefix, split_dir_and_name};
use crate::transport::{DirEntry, Transport};
use crate::{Result, TRACING_TARGET_LISTING};

/// How common prefixes and objects are derived from the directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixStrategy {
    /// The delimiter is `/`: prefixes are directories.
    Native,
    /// The delimiter differs from `/`: prefixes are regrouped from a flat
    /// list of every file below the bucket.
    Flattened {
        /// The logical delimiter.
        delimiter: String,
    },
}

impl PrefixStrategy {
    /// Selects the strategy for `delimiter`.
    pub fn for_delimiter(delimiter: &str) -> Self {
        if delimiter == SEPARATOR {
            Self::Native
        } else {
            Self::Flattened {
                delimiter: delimiter.to_owned(),
            }
        }
    }

    /// Returns the logical delimiter of this strategy.
    pub fn delimiter(&self) -> &str {
        match self {
            Self::Native => SEPARATOR,
            Self::Flattened { delimiter } => delimiter,
        }
    }

    /// Lists the common prefixes below `prefix` in `bucket`.
    ///
    /// A bucket or prefix that was never written to yields an empty list.
    pub async fn common_prefixes<T>(
        &self,
        transport: &T,
        mapper: &PathMapper,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>>
    where
        T: Transport + ?Sized,
    {
        match self {
            Self::Native => {
                let root = mapper.listing_root(bucket, prefix);
                let cut = mapper.bucket_prefix_with(bucket, SEPARATOR);
                native_common_prefixes(transport, &root, &cut).await
            }
            Self::Flattened { delimiter } => {
                let scope = FlatScope::new(mapper, bucket, prefix, delimiter);
                let files = collect_files(transport, &scope.walk_root()).await?;
                Ok(scope.common_prefixes(&files))
            }
        }
    }

    /// Lists the keys directly below `prefix` in `bucket`.
    ///
    /// Keys nested under a further delimiter are omitted.
    pub async fn objects<T>(
        &self,
        transport: &T,
        mapper: &PathMapper,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>>
    where
        T: Transport + ?Sized,
    {
        match self {
            Self::Native => {
                let root = mapper.listing_root(bucket, prefix);
                let cut = mapper.bucket_prefix_with(bucket, SEPARATOR);
                native_objects(transport, &root, &cut).await
            }
            Self::Flattened { delimiter } => {
                let scope = FlatScope::new(mapper, bucket, prefix, delimiter);
                let files = collect_files(transport, &scope.walk_root()).await?;
                Ok(scope.objects(&files))
            }
        }
    }
}

/// Reads a listing root, treating a missing directory as empty.
async fn read_root<T>(transport: &T, root: &str) -> Result<Option<Vec<DirEntry>>>
where
    T: Transport + ?Sized,
{
    match transport.read_dir(root).await {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.is_not_found() => {
            tracing::debug!(
                target: TRACING_TARGET_LISTING,
                root = %root,
                "Listing root does not exist yet"
            );
            Ok(None)
        }
        Err(e) => {
            tracing::error!(
                target: TRACING_TARGET_LISTING,
                root = %root,
                error = %e,
                "Error reading directory via WebDAV"
            );
            Err(e)
        }
    }
}

/// Lists the files directly inside `root`.
async fn native_objects<T>(transport: &T, root: &str, cut: &str) -> Result<Vec<String>>
where
    T: Transport + ?Sized,
{
    let Some(entries) = read_root(transport, root).await? else {
        return Ok(Vec::new());
    };

    Ok(entries
        .into_iter()
        .filter(|entry| !entry.is_dir)
        .filter_map(|entry| {
            format!("{root}{}", entry.name)
                .strip_prefix(cut)
                .map(str::to_owned)
        })
        .collect())
}

/// Collects every directory below `root` that directly contains a file.
///
/// Directories holding nothing but further directories are skipped, so no
/// prefix is reported that has no object right under it. Results are in
/// post-order: a directory follows its own subdirectories.
async fn native_common_prefixes<T>(transport: &T, root: &str, cut: &str) -> Result<Vec<String>>
where
    T: Transport + ?Sized,
{
    let Some(entries) = read_root(transport, root).await? else {
        return Ok(Vec::new());
    };

    let mut walk = TreeWalk::new(root, entries);
    let mut prefixes = Vec::new();

    while let Some(event) = walk.next(transport).await? {
        if let WalkEvent::Leave {
            path,
            has_files: true,
            depth,
        } = event
            && depth > 0
            && let Some(prefix) = path.strip_prefix(cut)
        {
            prefixes.push(prefix.to_owned());
        }
    }

    Ok(prefixes)
}

/// Collects the path of every file below `root`, depth-first.
async fn collect_files<T>(transport: &T, root: &str) -> Result<Vec<String>>
where
    T: Transport + ?Sized,
{
    let Some(entries) = read_root(transport, root).await? else {
        return Ok(Vec::new());
    };

    let mut walk = TreeWalk::new(root, entries);
    let mut files = Vec::new();

    while let Some(event) = walk.next(transport).await? {
        if let WalkEvent::File { path } = event {
            files.push(path);
        }
    }

    tracing::debug!(
        target: TRACING_TARGET_LISTING,
        root = %root,
        files = files.len(),
        "Walked directory tree"
    );

    Ok(files)
}

/// The part of the namespace a flattened listing looks at.
struct FlatScope<'a> {
    /// Storage path preceding every key of the bucket.
    cut: String,
    /// Normalized logical prefix.
    prefix: String,
    delimiter: &'a str,
}

impl<'a> FlatScope<'a> {
    fn new(mapper: &PathMapper, bucket: &str, prefix: &str, delimiter: &'a str) -> Self {
        Self {
            cut: mapper.bucket_prefix_with(bucket, delimiter),
            prefix: normalize_prefix(prefix, delimiter).into_owned(),
            delimiter,
        }
    }

    /// The deepest directory containing every storage path under the prefix.
    fn walk_root(&self) -> String {
        let scope = format!("{}{}", self.cut, self.prefix);
        match split_dir_and_name(&scope).0 {
            "" => String::new(),
            dir => format!("{dir}{SEPARATOR}"),
        }
    }

    /// Returns the keys under the prefix, stripped to the part after it.
    fn keys<'f>(&'f self, files: &'f [String]) -> impl Iterator<Item = (&'f str, &'f str)> {
        files.iter().filter_map(move |file| {
            let key = file.strip_prefix(self.cut.as_str())?;
            let rest = key.strip_prefix(self.prefix.as_str())?;
            Some((key, rest))
        })
    }

    /// Groups keys on their last delimiter, keeping first-seen order.
    ///
    /// A prefix is the part of the key before that delimiter.
    fn common_prefixes(&self, files: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut prefixes = Vec::new();

        for (key, rest) in self.keys(files) {
            let Some(i) = rest.rfind(self.delimiter) else {
                continue;
            };
            let end = key.len() - rest.len() + i;
            let prefix = &key[..end];
            if seen.insert(prefix) {
                prefixes.push(prefix.to_owned());
            }
        }

        prefixes
    }

    /// Returns the keys with no delimiter after the prefix.
    fn objects(&self, files: &[String]) -> Vec<String> {
        self.keys(files)
            .filter(|(_, rest)| !rest.is_empty() && !rest.contains(self.delimiter))
            .map(|(key, _)| key.to_owned())
            .collect()
    }
}

/// Event produced by [`TreeWalk`].
#[derive(Debug, PartialEq, Eq)]
enum WalkEvent {
    /// A file was found.
    File { path: String },
    /// All entries of a directory were visited.
    Leave {
        /// Directory path, ending with `/` unless it is the empty root.
        path: String,
        /// Whether the directory directly contains at least one file.
        has_files: bool,
        /// Number of directories still open; zero for the walk root.
        depth: usize,
    },
}

struct Frame {
    path: String,
    entries: std::vec::IntoIter<DirEntry>,
    has_files: bool,
}

impl Frame {
    fn new(path: String, entries: Vec<DirEntry>) -> Self {
        Self {
            path,
            entries: entries.into_iter(),
            has_files: false,
        }
    }
}

/// Depth-first traversal with an explicit stack.
///
/// One directory is listed at a time, in the order the server returns
/// entries. A missing subdirectory is an error; only the root may be absent,
/// and that is decided by the caller before the walk starts.
struct TreeWalk {
    stack: Vec<Frame>,
}

impl TreeWalk {
    fn new(root: &str, entries: Vec<DirEntry>) -> Self {
        Self {
            stack: vec![Frame::new(root.to_owned(), entries)],
        }
    }

    async fn next<T>(&mut self, transport: &T) -> Result<Option<WalkEvent>>
    where
        T: Transport + ?Sized,
    {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };

            let Some(entry) = frame.entries.next() else {
                let Some(done) = self.stack.pop() else {
                    return Ok(None);
                };
                return Ok(Some(WalkEvent::Leave {
                    path: done.path,
                    has_files: done.has_files,
                    depth: self.stack.len(),
                }));
            };

            let path = format!("{}{}", frame.path, entry.name);
            if !entry.is_dir {
                frame.has_files = true;
                return Ok(Some(WalkEvent::File { path }));
            }

            let dir = format!("{path}{SEPARATOR}");
            let entries = transport.read_dir(&dir).await.inspect_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_LISTING,
                    dir = %dir,
                    error = %e,
                    "Error reading directory during traversal"
                );
            })?;
            self.stack.push(Frame::new(dir, entries));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Connector;
    use crate::config::Credentials;
    use crate::transport::{MemoryConnector, MemoryTransport};

    async fn tree(files: &[&str]) -> (MemoryConnector, MemoryTransport) {
        let connector = MemoryConnector::new();
        for file in files {
            connector.insert_file(file, "x").await.unwrap();
        }
        let credentials = Credentials {
            endpoint: "memory://listing".to_owned(),
            username: "velero".to_owned(),
            password: String::new(),
        };
        let transport = connector.connect(&credentials).await.unwrap();
        (connector, transport)
    }

    fn sorted(mut values: Vec<String>) -> Vec<String> {
        values.sort();
        values
    }

    fn without_trailing_separator(values: Vec<String>) -> Vec<String> {
        values
            .into_iter()
            .map(|value| value.trim_end_matches(SEPARATOR).to_owned())
            .collect()
    }

    #[test]
    fn strategy_selection() {
        assert_eq!(PrefixStrategy::for_delimiter("/"), PrefixStrategy::Native);
        assert_eq!(
            PrefixStrategy::for_delimiter("-"),
            PrefixStrategy::Flattened {
                delimiter: "-".to_owned()
            }
        );
        assert_eq!(PrefixStrategy::for_delimiter("-").delimiter(), "-");
    }

    #[tokio::test]
    async fn native_prefixes_under_prefix() {
        let (_, transport) = tree(&[
            "backups/backups/my-app/cars/a",
            "backups/backups/my-app/trains/b",
            "backups/backups/some-other-app/bridges/c",
        ])
        .await;
        let mapper = PathMapper::new("backups/", "/");

        let prefixes = PrefixStrategy::Native
            .common_prefixes(&transport, &mapper, "backups", "my-app")
            .await
            .unwrap();
        assert_eq!(prefixes, vec!["my-app/cars/", "my-app/trains/"]);
    }

    #[tokio::test]
    async fn native_prefixes_are_post_order_and_skip_folder_only_dirs() {
        let (connector, transport) = tree(&[
            "b/top/file",
            "b/top/nested/deep/file",
            "b/only-dirs/inner/file",
        ])
        .await;
        connector.insert_dir("b/empty/also-empty").await.unwrap();
        let mapper = PathMapper::new("", "/");

        let prefixes = PrefixStrategy::Native
            .common_prefixes(&transport, &mapper, "b", "")
            .await
            .unwrap();

        // "only-dirs/" and "top/nested/" contain nothing but folders.
        assert_eq!(prefixes, vec!["only-dirs/inner/", "top/nested/deep/", "top/"]);
    }

    #[tokio::test]
    async fn native_prefixes_of_missing_root_are_empty() {
        let (_, transport) = tree(&["backups/other/key"]).await;
        let mapper = PathMapper::new("backups", "/");

        let prefixes = PrefixStrategy::Native
            .common_prefixes(&transport, &mapper, "never-written", "my-app")
            .await
            .unwrap();
        assert!(prefixes.is_empty());
    }

    #[tokio::test]
    async fn native_objects_are_direct_files_only() {
        let (_, transport) = tree(&[
            "backups/b/my-app/one",
            "backups/b/my-app/two",
            "backups/b/my-app/nested/three",
        ])
        .await;
        let mapper = PathMapper::new("backups", "/");

        let objects = PrefixStrategy::Native
            .objects(&transport, &mapper, "b", "my-app")
            .await
            .unwrap();
        assert_eq!(objects, vec!["my-app/one", "my-app/two"]);
    }

    #[tokio::test]
    async fn native_objects_at_bucket_root() {
        let (_, transport) = tree(&["b/one", "b/dir/two"]).await;
        let mapper = PathMapper::new("", "/");

        let objects = PrefixStrategy::Native
            .objects(&transport, &mapper, "b", "")
            .await
            .unwrap();
        assert_eq!(objects, vec!["one"]);
    }

    #[tokio::test]
    async fn flattened_prefixes_group_on_last_delimiter() {
        let (_, transport) = tree(&[
            "backups/velero-my-app-cars-a",
            "backups/velero-my-app-cars-b",
            "backups/velero-my-app-trains-c",
            "backups/velero-toplevel",
            "backups/other-my-app-x-y",
        ])
        .await;
        let mapper = PathMapper::new("backups", "-");
        let strategy = PrefixStrategy::for_delimiter("-");

        let prefixes = strategy
            .common_prefixes(&transport, &mapper, "velero", "")
            .await
            .unwrap();
        assert_eq!(prefixes, vec!["my-app-cars", "my-app-trains"]);

        let prefixes = strategy
            .common_prefixes(&transport, &mapper, "velero", "my-app-cars")
            .await
            .unwrap();
        assert!(prefixes.is_empty());
    }

    #[tokio::test]
    async fn flattened_prefixes_exclude_the_delimiter() {
        let (_, transport) = tree(&[
            "velero-my-app-cars-a",
            "velero-my-app-trains-b",
            "velero-some-other-app-bridges-c",
        ])
        .await;
        let mapper = PathMapper::new("", "-");

        let prefixes = PrefixStrategy::for_delimiter("-")
            .common_prefixes(&transport, &mapper, "velero", "")
            .await
            .unwrap();
        assert_eq!(
            prefixes,
            vec!["my-app-cars", "my-app-trains", "some-other-app-bridges"]
        );
    }

    #[tokio::test]
    async fn flattened_keys_may_span_directories() {
        let (_, transport) = tree(&["velero-a/b-c", "velero-a/d"]).await;
        let mapper = PathMapper::new("", "-");
        let strategy = PrefixStrategy::for_delimiter("-");

        let prefixes = strategy
            .common_prefixes(&transport, &mapper, "velero", "")
            .await
            .unwrap();
        assert_eq!(prefixes, vec!["a/b"]);

        let objects = strategy
            .objects(&transport, &mapper, "velero", "")
            .await
            .unwrap();
        assert_eq!(objects, vec!["a/d"]);
    }

    #[tokio::test]
    async fn flattened_objects_omit_nested_keys() {
        let (_, transport) = tree(&["d/velero-x-1", "d/velero-x-2", "d/velero-x-y-3"]).await;
        let mapper = PathMapper::new("d", "-");

        let objects = PrefixStrategy::for_delimiter("-")
            .objects(&transport, &mapper, "velero", "x")
            .await
            .unwrap();
        assert_eq!(objects, vec!["x-1", "x-2"]);
    }

    #[tokio::test]
    async fn flattened_listing_of_missing_bucket_dir_is_empty() {
        let (_, transport) = tree(&[]).await;
        let mapper = PathMapper::new("missing", "-");

        let prefixes = PrefixStrategy::for_delimiter("-")
            .common_prefixes(&transport, &mapper, "velero", "")
            .await
            .unwrap();
        assert!(prefixes.is_empty());
    }

    #[tokio::test]
    async fn flattened_with_separator_matches_native() {
        let (connector, transport) = tree(&[
            "backups/b/my-app/cars/a",
            "backups/b/my-app/cars/b",
            "backups/b/my-app/trains/c",
            "backups/b/my-app/loose",
            "backups/b/my-app/deep/er/still/d",
            "backups/b/other/e",
        ])
        .await;
        connector.insert_dir("backups/b/my-app/empty").await.unwrap();
        let mapper = PathMapper::new("backups", "/");
        let flattened = PrefixStrategy::Flattened {
            delimiter: "/".to_owned(),
        };

        for prefix in ["", "my-app", "my-app/deep"] {
            let native = PrefixStrategy::Native
                .common_prefixes(&transport, &mapper, "b", prefix)
                .await
                .unwrap();
            let flat = flattened
                .common_prefixes(&transport, &mapper, "b", prefix)
                .await
                .unwrap();
            assert_eq!(
                sorted(without_trailing_separator(native)),
                sorted(flat),
                "prefix {prefix:?}"
            );

            let native = PrefixStrategy::Native
                .objects(&transport, &mapper, "b", prefix)
                .await
                .unwrap();
            let flat = flattened
                .objects(&transport, &mapper, "b", prefix)
                .await
                .unwrap();
            assert_eq!(sorted(native), sorted(flat), "prefix {prefix:?}");
        }
    }

    #[tokio::test]
    async fn walk_reports_files_and_directories() {
        let (_, transport) = tree(&["r/a/1", "r/2"]).await;
        let entries = transport.read_dir("r/").await.unwrap();

        let mut walk = TreeWalk::new("r/", entries);
        let mut events = Vec::new();
        while let Some(event) = walk.next(&transport).await.unwrap() {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                WalkEvent::File {
                    path: "r/2".to_owned()
                },
                WalkEvent::File {
                    path: "r/a/1".to_owned()
                },
                WalkEvent::Leave {
                    path: "r/a/".to_owned(),
                    has_files: true,
                    depth: 1
                },
                WalkEvent::Leave {
                    path: "r/".to_owned(),
                    has_files: true,
                    depth: 0
                },
            ]
        );
    }
}
