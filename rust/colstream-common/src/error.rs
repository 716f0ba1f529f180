use thiserror::Error;

use crate::{failure, status::Status};

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    /// Wraps the error kind and reports it to the registered failure handler, if any.
    pub fn new(kind: ErrorKind) -> Error {
        let err = Error(Box::new(kind));
        failure::notify(&err);
        err
    }

    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Status code reported for this error at the API boundary.
    pub fn status(&self) -> Status {
        match self.kind() {
            ErrorKind::Unknown { .. } => Status::UnknownException,
            _ => Status::Exception,
        }
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidFormat {
            element: element.into(),
            message: message.into(),
        })
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        })
    }

    pub fn configuration(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Configuration {
            message: message.into(),
        })
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::SchemaMismatch {
            message: message.into(),
        })
    }

    pub fn unknown_column(name: impl Into<String>) -> Error {
        Error::new(ErrorKind::UnknownColumn { name: name.into() })
    }

    pub fn ambiguous_column(name: impl Into<String>, candidates: usize) -> Error {
        Error::new(ErrorKind::AmbiguousColumn {
            name: name.into(),
            candidates,
        })
    }

    pub fn bitfield_overflow(column: impl Into<String>, bits: u32, capacity: u32) -> Error {
        Error::new(ErrorKind::BitfieldOverflow {
            column: column.into(),
            bits,
            capacity,
        })
    }

    pub fn dest_too_small(required: usize, actual: usize) -> Error {
        Error::new(ErrorKind::DestBufferTooSmall { required, actual })
    }

    pub fn parallel_decode(failed: usize, workers: usize, first: Error) -> Error {
        Error::new(ErrorKind::ParallelDecode {
            failed,
            workers,
            source: first,
        })
    }

    pub fn unknown(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Unknown {
            message: message.into(),
        })
    }

    /// Converts an I/O error, surfacing callback return codes as
    /// [`ErrorKind::Callback`].
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        let context = context.into();
        let code = source
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<CallbackError>())
            .map(|cb| cb.code);
        match code {
            Some(code) => Error::new(ErrorKind::Callback { context, code }),
            None => Error::new(ErrorKind::Io { context, source }),
        }
    }

    pub fn callback(context: impl Into<String>, code: i64) -> Error {
        Error::new(ErrorKind::Callback {
            context: context.into(),
            code,
        })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("not configured: {message}")]
    Configuration { message: String },

    #[error("checksum mismatch for '{element}'")]
    ChecksumMismatch { element: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("stream callback for '{context}' failed with code {code}")]
    Callback { context: String, code: i64 },

    #[error("heterogeneous frame schemas: {message}")]
    SchemaMismatch { message: String },

    #[error("unknown column '{name}'")]
    UnknownColumn { name: String },

    #[error("short column name '{name}' matches {candidates} columns")]
    AmbiguousColumn { name: String, candidates: usize },

    #[error("bit-field '{column}' needs {bits} bits, container holds {capacity}")]
    BitfieldOverflow {
        column: String,
        bits: u32,
        capacity: u32,
    },

    #[error("destination buffer is too small: {required} bytes required, {actual} available")]
    DestBufferTooSmall { required: usize, actual: usize },

    #[error("threaded decode incomplete: {failed} of {workers} workers failed: {source}")]
    ParallelDecode {
        failed: usize,
        workers: usize,
        source: Error,
    },

    #[error("unknown failure: {message}")]
    Unknown { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::configuration("conversion")
    }
}

/// Error code returned by a pull or push callback, carried through
/// `std::io::Error` so that the code reaches the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("callback returned {code}")]
pub struct CallbackError {
    pub code: i64,
}

impl CallbackError {
    pub fn into_io(self) -> std::io::Error {
        std::io::Error::other(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_code_survives_io_wrapping() {
        let io = CallbackError { code: -7 }.into_io();
        let err = Error::io("pull", io);
        match err.kind() {
            ErrorKind::Callback { context, code } => {
                assert_eq!(context, "pull");
                assert_eq!(*code, -7);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_plain_io_error() {
        let err = Error::io(
            "open",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err.kind(), ErrorKind::Io { .. }));
        assert_eq!(err.status(), Status::Exception);
    }

    #[test]
    fn test_parallel_decode_message() {
        let first = Error::unknown_column("lat");
        let err = Error::parallel_decode(2, 8, first);
        let text = err.to_string();
        assert!(text.contains("2 of 8"));
        assert!(text.contains("lat"));
    }
}
