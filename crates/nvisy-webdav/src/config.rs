//! Adapter configuration and lifecycle diagnostics.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::TRACING_TARGET_CONFIG;
use crate::path::{self, SEPARATOR};

/// Keys of the plugin configuration map.
mod option {
    pub const ROOT: &str = "root";
    pub const USER: &str = "user";
    pub const PASSWORD: &str = "webDAVPassword";
    pub const BUCKETS_DIR: &str = "bucketsDir";
    pub const BUCKET: &str = "bucket";
    pub const DELIMITER: &str = "delimiter";
    pub const LOG_LEVEL: &str = "logLevel";
}

/// Verbosity of the adapter's own diagnostics.
///
/// Levels are ordered from least to most verbose. Errors are always
/// reported, so the quietest level is [`LogLevel::Warn`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, EnumString)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    /// Errors and warnings.
    #[default]
    Warn,
    /// Adds configuration summaries.
    Info,
    /// Adds per-operation detail.
    Debug,
}

impl LogLevel {
    /// Parses a level case-insensitively, falling back to [`LogLevel::Warn`]
    /// for empty or unrecognized input.
    pub fn parse_lenient(value: &str) -> Self {
        value.trim().parse().unwrap_or_default()
    }

    /// Returns `true` if messages of `level` should be reported.
    #[inline]
    pub fn permits(self, level: LogLevel) -> bool {
        level <= self
    }
}

impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.to_string()
    }
}

/// Credentials handed to a [`Connector`](crate::Connector).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL of the WebDAV server.
    pub endpoint: String,
    /// Username for basic authentication.
    pub username: String,
    /// Password for basic authentication, empty if none.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// Configuration of a [`WebDavObjectStore`](crate::WebDavObjectStore).
///
/// Values are taken as-is by serde and clap; call [`normalized`] (or use
/// [`from_options`]) before handing the configuration to the store so that
/// the delimiter default and the trailing separator of `buckets_dir` are
/// applied.
///
/// [`normalized`]: WebDavConfig::normalized
/// [`from_options`]: WebDavConfig::from_options
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct WebDavConfig {
    /// Base URL of the WebDAV server
    #[cfg_attr(feature = "config", arg(long = "webdav-root", env = "WEBDAV_ROOT"))]
    #[serde(default)]
    pub root: String,

    /// Username for the WebDAV server
    #[cfg_attr(feature = "config", arg(long = "webdav-user", env = "WEBDAV_USER"))]
    #[serde(default)]
    pub user: String,

    /// Password for the WebDAV server
    #[cfg_attr(
        feature = "config",
        arg(
            long = "webdav-password",
            env = "WEBDAV_PASSWORD",
            default_value = "",
            hide_env_values = true
        )
    )]
    #[serde(default, rename = "webDAVPassword")]
    pub password: String,

    /// Directory prepended to every bucket
    #[cfg_attr(
        feature = "config",
        arg(long = "webdav-buckets-dir", env = "WEBDAV_BUCKETS_DIR", default_value = "")
    )]
    #[serde(default)]
    pub buckets_dir: String,

    /// Bucket name, only reported at startup
    #[cfg_attr(
        feature = "config",
        arg(long = "webdav-bucket", env = "WEBDAV_BUCKET", default_value = "")
    )]
    #[serde(default)]
    pub bucket: String,

    /// Delimiter joining bucket names and key segments
    #[cfg_attr(
        feature = "config",
        arg(long = "webdav-delimiter", env = "WEBDAV_DELIMITER", default_value = SEPARATOR)
    )]
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Verbosity of adapter diagnostics (WARN, INFO or DEBUG)
    #[cfg_attr(
        feature = "config",
        arg(long = "webdav-log-level", env = "WEBDAV_LOG_LEVEL", default_value_t = LogLevel::Warn)
    )]
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_delimiter() -> String {
    SEPARATOR.to_owned()
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "[REDACTED]" }
}

impl WebDavConfig {
    /// Creates a configuration for the given server and credentials.
    pub fn new(
        root: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            user: user.into(),
            password: password.into(),
            buckets_dir: String::new(),
            bucket: String::new(),
            delimiter: default_delimiter(),
            log_level: LogLevel::default(),
        }
    }

    /// Builds a normalized configuration from a plugin option map.
    ///
    /// Missing keys fall back to their defaults; this never fails.
    pub fn from_options(options: &HashMap<String, String>) -> Self {
        let get = |key: &str| options.get(key).cloned().unwrap_or_default();

        Self {
            root: get(option::ROOT),
            user: get(option::USER),
            password: get(option::PASSWORD),
            buckets_dir: get(option::BUCKETS_DIR),
            bucket: get(option::BUCKET),
            delimiter: get(option::DELIMITER),
            log_level: LogLevel::parse_lenient(&get(option::LOG_LEVEL)),
        }
        .normalized()
    }

    /// Applies the delimiter default and terminates `buckets_dir` with the
    /// path separator.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.delimiter.is_empty() {
            self.delimiter = default_delimiter();
        }
        self.buckets_dir = path::normalize_buckets_dir(&self.buckets_dir);
        self
    }

    /// Sets the directory prepended to every bucket.
    #[must_use]
    pub fn with_buckets_dir(mut self, buckets_dir: impl Into<String>) -> Self {
        self.buckets_dir = buckets_dir.into();
        self
    }

    /// Sets the informational bucket name.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets the key delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the diagnostic verbosity.
    #[must_use]
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Returns `true` if the delimiter is the WebDAV path separator.
    #[inline]
    pub fn is_native_delimiter(&self) -> bool {
        self.delimiter == SEPARATOR
    }

    /// Returns the credentials used to open transport connections.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            endpoint: self.root.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
        }
    }

    /// Reports configuration problems.
    ///
    /// Nothing here is fatal: a missing root or username surfaces again as
    /// a connection error on the first operation.
    pub(crate) fn log_diagnostics(&self) {
        if self.root.is_empty() {
            tracing::error!(
                target: TRACING_TARGET_CONFIG,
                "WebDAV root is empty, please provide a valid URL"
            );
        }
        if self.user.is_empty() {
            tracing::error!(target: TRACING_TARGET_CONFIG, "WebDAV username is empty");
        }
        if self.password.is_empty() && self.log_level.permits(LogLevel::Warn) {
            tracing::warn!(target: TRACING_TARGET_CONFIG, "WebDAV password is empty");
        }
        if !self.root.is_empty()
            && !self.user.is_empty()
            && !self.password.is_empty()
            && self.log_level.permits(LogLevel::Info)
        {
            tracing::info!(
                target: TRACING_TARGET_CONFIG,
                root = %self.root,
                user = %self.user,
                "WebDAV server root, username and password are all set"
            );
        }
        if !self.is_native_delimiter() {
            tracing::warn!(
                target: TRACING_TARGET_CONFIG,
                delimiter = %self.delimiter,
                "Delimiters other than '/' are experimental, test the setup carefully"
            );
        }
        if self.log_level.permits(LogLevel::Info) {
            tracing::info!(
                target: TRACING_TARGET_CONFIG,
                bucket = %self.bucket,
                buckets_dir = %self.buckets_dir,
                log_level = %self.log_level,
                "Using bucket"
            );
        }
    }
}

impl fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("root", &self.root)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("buckets_dir", &self.buckets_dir)
            .field("bucket", &self.bucket)
            .field("delimiter", &self.delimiter)
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn from_options_reads_all_keys() {
        let config = WebDavConfig::from_options(&options(&[
            ("root", "https://dav.example.com"),
            ("user", "velero"),
            ("webDAVPassword", "secret"),
            ("bucketsDir", "backups"),
            ("bucket", "cluster-a"),
            ("delimiter", "/"),
            ("logLevel", "debug"),
        ]));

        assert_eq!(config.root, "https://dav.example.com");
        assert_eq!(config.user, "velero");
        assert_eq!(config.password, "secret");
        assert_eq!(config.buckets_dir, "backups/");
        assert_eq!(config.bucket, "cluster-a");
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn from_options_never_fails_on_empty_map() {
        let config = WebDavConfig::from_options(&HashMap::new());

        assert!(config.root.is_empty());
        assert!(config.user.is_empty());
        assert!(config.password.is_empty());
        assert!(config.buckets_dir.is_empty());
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn empty_delimiter_defaults_to_separator() {
        let config = WebDavConfig::from_options(&options(&[("delimiter", "")]));
        assert_eq!(config.delimiter, "/");
        assert!(config.is_native_delimiter());
    }

    #[test]
    fn buckets_dir_keeps_existing_separator() {
        let config = WebDavConfig::from_options(&options(&[("bucketsDir", "data/backups/")]));
        assert_eq!(config.buckets_dir, "data/backups/");
    }

    #[test]
    fn log_level_is_case_insensitive() {
        assert_eq!(LogLevel::parse_lenient("info"), LogLevel::Info);
        assert_eq!(LogLevel::parse_lenient("Debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse_lenient("WARN"), LogLevel::Warn);
    }

    #[test]
    fn unknown_log_level_behaves_as_warn() {
        assert_eq!(LogLevel::parse_lenient(""), LogLevel::Warn);
        assert_eq!(LogLevel::parse_lenient("verbose"), LogLevel::Warn);
    }

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);

        assert!(LogLevel::Warn.permits(LogLevel::Warn));
        assert!(!LogLevel::Warn.permits(LogLevel::Info));
        assert!(LogLevel::Debug.permits(LogLevel::Info));
    }

    #[test]
    fn deserializes_plugin_style_json() {
        let config: WebDavConfig = serde_json::from_str(
            r#"{
                "root": "https://dav.example.com",
                "user": "velero",
                "webDAVPassword": "secret",
                "bucketsDir": "backups",
                "logLevel": "info"
            }"#,
        )
        .unwrap();
        let config = config.normalized();

        assert_eq!(config.password, "secret");
        assert_eq!(config.buckets_dir, "backups/");
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = WebDavConfig::new("https://dav.example.com", "velero", "hunter2");

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));

        let rendered = format!("{:?}", config.credentials());
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn non_native_delimiter() {
        let config = WebDavConfig::new("https://dav.example.com", "velero", "").with_delimiter("-");
        assert!(!config.is_native_delimiter());
    }
}
