use std::{fmt, io};

use miette::Diagnostic;
use protox_parse::ParseError;
use thiserror::Error;

/// An error that can occur when resolving or printing protobuf files.
#[derive(Diagnostic, Error)]
#[error(transparent)]
#[diagnostic(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum ErrorKind {
    #[error("{}", err)]
    #[diagnostic(forward(err))]
    Parse { err: ParseError },
    #[error("error reading file '{path}'")]
    #[diagnostic(code(protolink::io))]
    Io {
        path: String,
        #[source]
        err: io::Error,
    },
    #[error("file '{name}' is not valid utf-8")]
    #[diagnostic(code(protolink::parse))]
    FileInvalidUtf8 { name: String },
    #[error("file '{name}' not found")]
    #[diagnostic(code(protolink::not_found))]
    FileNotFound { name: String },
    #[error("import cycle detected: {cycle}")]
    #[diagnostic(code(protolink::link))]
    CircularImport { name: String, cycle: String },
    #[error("name '{name}' is not defined")]
    #[diagnostic(
        code(protolink::link),
        help(
            "'{}' is referenced by '{}'; check that the file declaring it is imported",
            name,
            referrer
        )
    )]
    UnresolvedName {
        file: String,
        name: String,
        referrer: String,
    },
    #[error("'{name}' is not {expected}")]
    #[diagnostic(code(protolink::link), help("'{}' is referenced by '{}'", name, referrer))]
    InvalidReference {
        file: String,
        name: String,
        referrer: String,
        expected: &'static str,
    },
    #[error("name '{name}' is defined in both '{first_file}' and '{second_file}'")]
    #[diagnostic(code(protolink::link))]
    DuplicateName {
        name: String,
        first_file: String,
        second_file: String,
    },
    #[error("syntax '{syntax}' is not supported")]
    #[diagnostic(
        code(protolink::syntax),
        help("only files declaring syntax = \"proto3\" can be printed")
    )]
    UnsupportedSyntax { file: String, syntax: String },
    #[error("invalid value for option '{option}': {reason}")]
    #[diagnostic(code(protolink::value))]
    InvalidOptionValue {
        file: String,
        option: String,
        reason: String,
    },
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Creates an instance of [`struct@Error`] with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::from_kind(ErrorKind::Custom(error.into()))
    }

    /// Creates an instance of [`struct@Error`] indicating that a file could not be found.
    ///
    /// Providers should return this error when they do not know the requested file, so that
    /// the next provider in a [`ChainProvider`](crate::file::ChainProvider) can be consulted.
    pub fn file_not_found(name: &str) -> Self {
        Error::from_kind(ErrorKind::FileNotFound {
            name: name.to_owned(),
        })
    }

    /// Creates an instance of [`struct@Error`] for an IO error that occurred while reading `path`.
    pub fn io(path: &str, err: io::Error) -> Self {
        Error::from_kind(ErrorKind::Io {
            path: path.to_owned(),
            err,
        })
    }

    /// The file in which this error occurred, if available.
    pub fn file(&self) -> Option<&str> {
        match &*self.kind {
            ErrorKind::Parse { err } => Some(err.file()),
            ErrorKind::Io { path: name, .. }
            | ErrorKind::FileInvalidUtf8 { name }
            | ErrorKind::FileNotFound { name }
            | ErrorKind::CircularImport { name, .. }
            | ErrorKind::UnresolvedName { file: name, .. }
            | ErrorKind::InvalidReference { file: name, .. }
            | ErrorKind::DuplicateName {
                second_file: name, ..
            }
            | ErrorKind::UnsupportedSyntax { file: name, .. }
            | ErrorKind::InvalidOptionValue { file: name, .. } => Some(name),
            ErrorKind::Custom(_) => None,
        }
    }

    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns true if this is an instance of [`Error::file_not_found()`].
    pub fn is_file_not_found(&self) -> bool {
        matches!(&*self.kind, ErrorKind::FileNotFound { .. })
    }

    /// Returns true if this error is caused by an invalid source file.
    pub fn is_parse(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::Parse { .. } | ErrorKind::FileInvalidUtf8 { .. }
        )
    }

    /// Returns true if this error is caused by an IO error while reading a file.
    pub fn is_io(&self) -> bool {
        match &*self.kind {
            ErrorKind::Io { .. } => true,
            ErrorKind::Custom(err) if err.downcast_ref::<io::Error>().is_some() => true,
            _ => false,
        }
    }

    /// Returns true if this error was raised while linking references between declarations.
    pub fn is_link(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::UnresolvedName { .. }
                | ErrorKind::InvalidReference { .. }
                | ErrorKind::DuplicateName { .. }
                | ErrorKind::CircularImport { .. }
        )
    }

    /// Returns true if the file uses a syntax that cannot be printed.
    pub fn is_syntax(&self) -> bool {
        matches!(&*self.kind, ErrorKind::UnsupportedSyntax { .. })
    }

    /// Returns true if an option value could not be converted to text.
    pub fn is_value(&self) -> bool {
        matches!(&*self.kind, ErrorKind::InvalidOptionValue { .. })
    }

    /// The name that could not be resolved, if this is a link error for a missing name.
    pub fn unresolved_name(&self) -> Option<&str> {
        match &*self.kind {
            ErrorKind::UnresolvedName { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Attaches `path` to IO errors raised by a provider through [`Error::new`].
    pub(crate) fn with_path(self, path: &str) -> Self {
        match *self.kind {
            ErrorKind::Custom(err) => match err.downcast::<io::Error>() {
                Ok(err) => Error::io(path, *err),
                Err(err) => Error::from_kind(ErrorKind::Custom(err)),
            },
            kind => Error::from_kind(kind),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::from_kind(ErrorKind::Parse { err })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(err)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::Parse { err } => err.fmt(f),
            ErrorKind::Io { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::UnresolvedName { file, referrer, .. }
            | ErrorKind::InvalidReference { file, referrer, .. } => {
                write!(f, "{}: {} (referenced by '{}')", file, self, referrer)
            }
            ErrorKind::UnsupportedSyntax { file, .. }
            | ErrorKind::InvalidOptionValue { file, .. } => write!(f, "{}: {}", file, self),
            ErrorKind::FileInvalidUtf8 { .. }
            | ErrorKind::FileNotFound { .. }
            | ErrorKind::CircularImport { .. }
            | ErrorKind::DuplicateName { .. } => write!(f, "{}", self),
            ErrorKind::Custom(err) => err.fmt(f),
        }
    }
}

#[test]
fn fmt_debug_io() {
    let err = Error::io(
        "path/to/file.proto",
        io::Error::new(io::ErrorKind::Other, "io error"),
    );

    assert!(err.is_io());
    assert_eq!(err.file(), Some("path/to/file.proto"));
    assert_eq!(
        format!("{:?}", err),
        "error reading file 'path/to/file.proto': io error"
    );
}

#[test]
fn fmt_debug_unresolved() {
    let err = Error::from_kind(ErrorKind::UnresolvedName {
        file: "foo/root.proto".to_owned(),
        name: "Missing".to_owned(),
        referrer: "foo.Root.field".to_owned(),
    });

    assert!(err.is_link());
    assert_eq!(err.unresolved_name(), Some("Missing"));
    assert_eq!(
        format!("{:?}", err),
        "foo/root.proto: name 'Missing' is not defined (referenced by 'foo.Root.field')"
    );
}

#[test]
fn with_path_wraps_custom_io_error() {
    let err = Error::new(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        .with_path("foo/bar.proto");

    assert!(matches!(err.kind(), ErrorKind::Io { path, .. } if path == "foo/bar.proto"));
    assert_eq!(err.file(), Some("foo/bar.proto"));

    let err = Error::new("cancelled").with_path("foo/bar.proto");
    assert!(matches!(err.kind(), ErrorKind::Custom(_)));
    assert_eq!(format!("{}", err), "cancelled");
}
