//! Error types.
//!
//! Everything that can end a run is an [`Error`]. Problems that only affect
//! a single bucket are reported as a [`BucketError`] and collected in the
//! run's report while the remaining buckets are still processed.

use std::path::PathBuf;
use std::{error, fmt, io};

use crate::config::ConfigError;
use crate::filter::FilterInitError;

//------------ Error ---------------------------------------------------------

/// An error that aborts a run.
#[derive(Debug)]
pub enum Error {
    /// An input file could not be opened or read.
    InputOpen { path: PathBuf, source: io::Error },

    /// An input file could not be parsed at all.
    ParseFatal { path: PathBuf, message: String },

    /// The configuration is invalid.
    Config(ConfigError),

    /// A signing key could not be loaded.
    KeyLoad { path: PathBuf, reason: String },

    /// The filter for a bucket could not be created.
    FilterInit { day: u32, source: FilterInitError },

    /// The output file could not be opened.
    OutputWrite { path: PathBuf, source: io::Error },
}

impl Error {
    pub(crate) fn input_open(
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Error::InputOpen {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse_fatal(
        path: impl Into<PathBuf>,
        message: impl fmt::Display,
    ) -> Self {
        Error::ParseFatal {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn key_load(
        path: impl Into<PathBuf>,
        reason: impl fmt::Display,
    ) -> Self {
        Error::KeyLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

//--- From

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

//--- Display and Error

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InputOpen { path, source } => {
                write!(f, "unable to open {}: {}", path.display(), source)
            }
            Error::ParseFatal { path, message } => {
                write!(f, "unable to parse {}: {}", path.display(), message)
            }
            Error::Config(err) => write!(f, "invalid configuration: {}", err),
            Error::KeyLoad { path, reason } => {
                write!(f, "unable to read key {}: {}", path.display(), reason)
            }
            Error::FilterInit { day, source } => {
                write!(
                    f,
                    "error initializing filter for expiration day {}: {}",
                    day, source
                )
            }
            Error::OutputWrite { path, source } => {
                write!(f, "unable to open {}: {}", path.display(), source)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::InputOpen { source, .. } => Some(source),
            Error::Config(err) => Some(err),
            Error::FilterInit { source, .. } => Some(source),
            Error::OutputWrite { source, .. } => Some(source),
            Error::ParseFatal { .. } | Error::KeyLoad { .. } => None,
        }
    }
}

//------------ BucketError ---------------------------------------------------

/// A failure confined to a single bucket.
#[derive(Debug)]
pub enum BucketError {
    /// The filter record could not be assembled.
    Assemble(AssembleError),

    /// The synthesized record could not be signed.
    Sign(crate::sign::SignError),

    /// Writing the record to the output failed.
    OutputWrite(io::Error),
}

impl From<AssembleError> for BucketError {
    fn from(err: AssembleError) -> Self {
        BucketError::Assemble(err)
    }
}

impl From<crate::sign::SignError> for BucketError {
    fn from(err: crate::sign::SignError) -> Self {
        BucketError::Sign(err)
    }
}

impl From<io::Error> for BucketError {
    fn from(err: io::Error) -> Self {
        BucketError::OutputWrite(err)
    }
}

impl fmt::Display for BucketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BucketError::Assemble(err) => err.fmt(f),
            BucketError::Sign(err) => write!(f, "signing failed: {}", err),
            BucketError::OutputWrite(err) => {
                write!(f, "error writing to file: {}", err)
            }
        }
    }
}

impl error::Error for BucketError {}

//------------ AssembleError -------------------------------------------------

/// The filter record for a bucket could not be built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AssembleError {
    /// The owner name built from the domain name is not a valid name.
    BadOwner(String),

    /// The payload does not fit into the record data of a single record.
    LongRecordData(usize),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssembleError::BadOwner(owner) => {
                write!(f, "invalid owner name '{}'", owner)
            }
            AssembleError::LongRecordData(len) => {
                write!(f, "record data of {} octets is too long", len)
            }
        }
    }
}

impl error::Error for AssembleError {}
