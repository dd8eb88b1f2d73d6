// SPDX-License-Identifier: MPL-2.0

//! The error codes this crate can return, modeled after POSIX errno numbers so that a
//! caller bridging to a syscall-shaped boundary can return `-errno` directly.

/// Error number.
///
/// Only the subset of POSIX errno values this crate actually returns is modeled; a
/// full syscall table has no use here since this crate has no VFS or syscall layer.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Errno {
    /// Try again. A non-blocking attempt failed, or a blocking attempt timed out.
    EAGAIN = 11,
    /// Broken pipe. The pipe was closed, possibly while the caller was blocked.
    EPIPE = 32,
    /// Operation already in progress. `close` was called on an already-closed pipe.
    EALREADY = 114,
    /// Operation canceled. The caller was unblocked by `reset`.
    ECANCELED = 125,
}

/// The error type used throughout this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    errno: Errno,
    msg: Option<&'static str>,
}

impl Error {
    /// Creates an error carrying just an errno, with no extra message.
    pub const fn new(errno: Errno) -> Self {
        Error { errno, msg: None }
    }

    /// Creates an error carrying both an errno and a human-readable message.
    pub const fn with_message(errno: Errno, msg: &'static str) -> Self {
        Error {
            errno,
            msg: Some(msg),
        }
    }

    /// Returns the errno this error carries.
    pub const fn errno(&self) -> Errno {
        self.errno
    }

    /// Returns the message this error carries, if any.
    pub const fn message(&self) -> Option<&'static str> {
        self.msg
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::new(errno)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.msg {
            Some(msg) => write!(f, "{:?}: {}", self.errno, msg),
            None => write!(f, "{:?}", self.errno),
        }
    }
}

impl std::error::Error for Error {}

/// The result type used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;

macro_rules! return_errno_with_message {
    ($errno:expr, $msg:expr) => {
        return Err($crate::error::Error::with_message($errno, $msg))
    };
}

pub(crate) use return_errno_with_message;
