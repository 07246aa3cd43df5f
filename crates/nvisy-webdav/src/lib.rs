#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for configuration and lifecycle diagnostics.
pub const TRACING_TARGET_CONFIG: &str = "nvisy_webdav::config";

/// Tracing target for transport connection handling.
pub const TRACING_TARGET_CONNECTION: &str = "nvisy_webdav::connection";

/// Tracing target for put, get, exists and delete operations.
pub const TRACING_TARGET_OBJECT: &str = "nvisy_webdav::object";

/// Tracing target for object and common-prefix listings.
pub const TRACING_TARGET_LISTING: &str = "nvisy_webdav::listing";

mod config;
mod error;
mod listing;
pub mod path;
mod store;
pub mod transport;

#[doc(hidden)]
pub mod prelude;

pub use config::{Credentials, LogLevel, WebDavConfig};
pub use error::{Error, Result};
pub use listing::PrefixStrategy;
pub use path::PathMapper;
pub use store::WebDavObjectStore;
pub use transport::{
    Connector, DirEntry, MemoryConnector, MemoryTransport, ObjectStream, OpendalConnector,
    OpendalTransport, Transport,
};
