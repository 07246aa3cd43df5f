//! Error types for WebDAV object store operations.

/// Result type for all operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while talking to the WebDAV server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server could not be reached or rejected the credentials.
    #[error("connection to '{endpoint}' failed: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The path does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused access to the path.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Creating the parent collection or writing the object failed.
    #[error("write to '{path}' failed: {source}")]
    Write {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// Removing the object or its emptied parent collection failed.
    #[error("delete of '{path}' failed: {source}")]
    Delete {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// The operation has no WebDAV counterpart.
    #[error("{operation} is not supported by the WebDAV object store")]
    Unsupported { operation: &'static str },

    /// Reading the request body failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other transport failure.
    #[error("backend error: {0}")]
    Backend(opendal::Error),
}

impl Error {
    /// Creates a new connection error.
    pub fn connection(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Wraps a transport failure that happened while writing `path`.
    pub fn write(path: impl Into<String>, source: Error) -> Self {
        Self::Write {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wraps a transport failure that happened while deleting `path`.
    pub fn delete(path: impl Into<String>, source: Error) -> Self {
        Self::Delete {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Creates a new unsupported operation error.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Returns `true` if the error means the path does not exist.
    ///
    /// Only a bare [`Error::NotFound`] qualifies; wrapped write or delete
    /// failures are reported as such even if the root cause was a 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<opendal::Error> for Error {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::Backend(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn opendal_not_found_maps_to_not_found() {
        let err = Error::from(opendal::Error::new(opendal::ErrorKind::NotFound, "missing"));
        assert!(err.is_not_found());
    }

    #[test]
    fn opendal_permission_denied_is_kept_distinct() {
        let err = Error::from(opendal::Error::new(
            opendal::ErrorKind::PermissionDenied,
            "forbidden",
        ));
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn wrapped_errors_keep_their_source() {
        let err = Error::delete("backups/a", Error::not_found("backups/a"));
        assert!(!err.is_not_found());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("backups/a"));
    }

    #[test]
    fn unsupported_names_the_operation() {
        let err = Error::unsupported("create_signed_url");
        assert_eq!(
            err.to_string(),
            "create_signed_url is not supported by the WebDAV object store"
        );
    }
}
