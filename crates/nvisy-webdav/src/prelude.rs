//! Prelude module for convenient imports.

pub use crate::config::{Credentials, LogLevel, WebDavConfig};
pub use crate::error::{Error, Result};
pub use crate::store::WebDavObjectStore;
pub use crate::transport::{Connector, DirEntry, ObjectStream, Transport};
