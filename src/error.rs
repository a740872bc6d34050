use core::fmt;

/// The type of error that occurred.
///
/// As a library consumer, detailed errors about which specific rule was broken are not very
/// useful.
/// For this reason, errors are broadly categorized into a few classes, and specific error info is
/// provided as a non-normative string literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A value was rejected at the call boundary, before anything was modified.
    ///
    /// Examples are a minimum chord size of zero or a chord length shorter than the offset of its
    /// last note.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An operation would break, or found broken, an invariant of the object it works on.
    ///
    /// Examples are reading the channel of a chord whose notes disagree, or moving an object to a
    /// negative time.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// An object was handed to a `TimedObjectsWriter` after events later than it were already
    /// written.
    #[error("object at tick {time} precedes the writer position at tick {position}")]
    OutOfOrder {
        /// Time of the rejected object.
        time: u64,
        /// Time of the last event written out.
        position: u64,
    },

    /// Two consecutive events are too far apart to be encoded as a delta time.
    #[error("delta time of {0} ticks does not fit in 28 bits")]
    DeltaOverflow(u64),
}
impl ErrorKind {
    /// Get the informative message on what exactly went wrong, if any.
    #[inline]
    pub fn message(&self) -> Option<&'static str> {
        match *self {
            ErrorKind::InvalidArgument(msg) => Some(msg),
            ErrorKind::InvalidState(msg) => Some(msg),
            ErrorKind::OutOfOrder { .. } => None,
            ErrorKind::DeltaOverflow(_) => None,
        }
    }
}

/// Represents an error while detecting, editing or writing back objects.
///
/// This type wraps an `ErrorKind` along with the chain of errors that caused it, if any.
/// The chain is available through `std::error::Error::source`.
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    src: Option<Box<Error>>,
}
impl Error {
    /// Create a new error with the given `ErrorKind`.
    #[inline]
    pub fn new(kind: ErrorKind) -> Error {
        Error::from(kind)
    }

    /// More information about the error itself.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error that caused this one, if it was raised with extra context.
    #[inline]
    pub fn cause(&self) -> Option<&Error> {
        self.src.as_deref()
    }

    fn chain_ctx(self, ctx: ErrorKind) -> Error {
        Error {
            kind: ctx,
            src: Some(Box::new(self)),
        }
    }
}
impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Error {
        Error { kind, src: None }
    }
}
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        let mut maybe_src = self.cause();
        while let Some(src) = maybe_src {
            writeln!(f)?;
            write!(f, "  caused by: {}", src.kind)?;
            maybe_src = src.cause();
        }
        Ok(())
    }
}

macro_rules! err_arg {
    ($msg:expr) => {
        $crate::error::ErrorKind::InvalidArgument($msg)
    };
}
macro_rules! err_state {
    ($msg:expr) => {
        $crate::error::ErrorKind::InvalidState($msg)
    };
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: ErrorKind) -> Result<T>;
}
impl<T> ResultExt<T> for Result<T> {
    #[inline]
    fn context(self, ctx: ErrorKind) -> Result<T> {
        self.map_err(|err| err.chain_ctx(ctx))
    }
}

/// The result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
