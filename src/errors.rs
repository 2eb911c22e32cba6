//! Definition of errors.

use std::error::Error;
use std::fmt;

/// The error type for Rutag.
#[derive(Debug)]
pub enum RutagError {
    /// The error variant for [`InvalidArgumentError`].
    InvalidArgument(InvalidArgumentError),

    /// The error variant for [`InvalidModelError`].
    InvalidModel(InvalidModelError),

    /// The error variant for [`InvalidFormatError`].
    InvalidFormat(InvalidFormatError),

    /// The error variant for [`InconsistentError`].
    Inconsistent(InconsistentError),

    /// The error variant for [`TryFromIntError`](std::num::TryFromIntError).
    CastError(std::num::TryFromIntError),

    /// The error variant for [`DecodeError`](bincode::error::DecodeError).
    DecodeError(bincode::error::DecodeError),

    /// The error variant for [`EncodeError`](bincode::error::EncodeError).
    EncodeError(bincode::error::EncodeError),

    /// The error variant for [`std::io::Error`].
    IOError(std::io::Error),
}

impl RutagError {
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn invalid_model<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidModel(InvalidModelError { msg: msg.into() })
    }

    pub(crate) fn invalid_format<S>(line: usize, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidFormat(InvalidFormatError {
            line,
            msg: msg.into(),
        })
    }

    pub(crate) fn inconsistent<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Inconsistent(InconsistentError { msg: msg.into() })
    }
}

impl fmt::Display for RutagError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => e.fmt(f),
            Self::InvalidModel(e) => e.fmt(f),
            Self::InvalidFormat(e) => e.fmt(f),
            Self::Inconsistent(e) => e.fmt(f),
            Self::CastError(e) => e.fmt(f),
            Self::DecodeError(e) => e.fmt(f),
            Self::EncodeError(e) => e.fmt(f),
            Self::IOError(e) => e.fmt(f),
        }
    }
}

impl Error for RutagError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CastError(e) => Some(e),
            Self::DecodeError(e) => Some(e),
            Self::EncodeError(e) => Some(e),
            Self::IOError(e) => Some(e),
            _ => None,
        }
    }
}

/// Error used when the argument is invalid.
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// Error used when a model file is truncated, has an unknown version, or is self-inconsistent.
#[derive(Debug)]
pub struct InvalidModelError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidModelError: {}", self.msg)
    }
}

impl Error for InvalidModelError {}

/// Error used when a template or corpus line cannot be parsed.
#[derive(Debug)]
pub struct InvalidFormatError {
    /// 1-based line number.
    pub(crate) line: usize,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidFormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidFormatError: line {}: {}", self.line, self.msg)
    }
}

impl Error for InvalidFormatError {}

/// Error used when input data does not fit the feature schema of a model.
#[derive(Debug)]
pub struct InconsistentError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InconsistentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InconsistentError: {}", self.msg)
    }
}

impl Error for InconsistentError {}

impl From<std::num::TryFromIntError> for RutagError {
    fn from(error: std::num::TryFromIntError) -> Self {
        Self::CastError(error)
    }
}

impl From<bincode::error::DecodeError> for RutagError {
    fn from(error: bincode::error::DecodeError) -> Self {
        Self::DecodeError(error)
    }
}

impl From<bincode::error::EncodeError> for RutagError {
    fn from(error: bincode::error::EncodeError) -> Self {
        Self::EncodeError(error)
    }
}

impl From<std::io::Error> for RutagError {
    fn from(error: std::io::Error) -> Self {
        Self::IOError(error)
    }
}

/// A specialized Result type.
pub type Result<T, E = RutagError> = std::result::Result<T, E>;
