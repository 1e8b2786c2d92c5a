//! The crate-wide error type.
//!
//! Every fallible operation in this crate reports one of a small number of
//! failure categories: the compression engine failed or produced the wrong
//! number of bytes, a file did not have the expected layout, the operating
//! system refused an I/O request, two inputs that must agree did not, or a
//! parameter file was missing/contradictory. The public [`Error`] type wraps
//! an internal kind enum so the set of categories can grow without breaking
//! callers.

use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

#[non_exhaustive]
#[derive(Debug)]
enum ErrorKind {
    /// compression/decompression failure, including a length mismatch on read
    Codec(CodecError),
    /// a file exists but its contents do not have the expected layout
    Format(FormatError),
    /// the underlying I/O request failed
    Io(IoError),
    /// inputs that are required to agree (Nside, scheme, pixel lists) do not
    Precondition(PreconditionError),
    /// missing or contradictory configuration
    Config(ConfigError),
}

impl Error {
    pub(crate) fn codec(detail: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Codec(CodecError(detail.into())),
        }
    }

    pub(crate) fn format(path: &Path, detail: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Format(FormatError {
                path: path.display().to_string(),
                detail: detail.into(),
            }),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io(IoError {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub(crate) fn precondition(detail: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Precondition(PreconditionError(detail.into())),
        }
    }

    pub(crate) fn config(detail: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Config(ConfigError(detail.into())),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Codec(err) => err.fmt(f),
            ErrorKind::Format(err) => err.fmt(f),
            ErrorKind::Io(err) => err.fmt(f),
            ErrorKind::Precondition(err) => err.fmt(f),
            ErrorKind::Config(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(&err.source),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct CodecError(String);

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "codec error: {}", self.0)
    }
}

#[derive(Debug)]
struct FormatError {
    path: String,
    detail: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "malformed file {}: {}", self.path, self.detail)
    }
}

#[derive(Debug)]
struct IoError {
    path: String,
    source: std::io::Error,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "I/O error on {}: {}", self.path, self.source)
    }
}

#[derive(Debug)]
struct PreconditionError(String);

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "precondition violated: {}", self.0)
    }
}

#[derive(Debug)]
struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}
