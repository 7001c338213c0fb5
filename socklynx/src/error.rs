use core::fmt::{self, Display, Formatter};
use std::io::ErrorKind;

use crate::socket::SocketState;

/// A result with the [`Error`] error.
pub type Result<T> = core::result::Result<T, Error>;

/// An error that may happen during socket or system context operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied value was rejected before any OS call was made.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not valid in the socket's current lifecycle state.
    ///
    /// The socket is left unchanged.
    #[error("cannot {operation} a socket in state {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the socket was in.
        state: SocketState,
    },

    /// A send or receive was issued without any buffer descriptors.
    #[error("cannot {operation} with an empty buffer list")]
    EmptyBufferList {
        /// The rejected operation.
        operation: &'static str,
    },

    /// An OS call failed.
    #[error(transparent)]
    Os(#[from] OsError),
}

impl Error {
    /// Returns `true` if this is a would-block indication from a non-blocking socket.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Os(error) if error.is_would_block())
    }

    /// Returns `true` if the error is a contract violation by the caller rather than a runtime
    /// condition.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidState { .. } | Error::EmptyBufferList { .. }
        )
    }

    /// Returns the captured OS error, if this error came from the OS.
    pub fn os_error(&self) -> Option<OsError> {
        match self {
            Error::Os(error) => Some(*error),
            _ => None,
        }
    }
}

/// A native error code captured from a failing OS call.
///
/// On POSIX this is `errno`, on Windows the value of `WSAGetLastError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsError {
    code: i32,
}

impl OsError {
    /// Wraps a raw native error code.
    pub const fn from_raw(code: i32) -> Self {
        Self { code }
    }

    /// Captures the calling thread's last OS error.
    pub(crate) fn last() -> Self {
        Self::from_raw(std::io::Error::last_os_error().raw_os_error().unwrap_or_default())
    }

    /// The raw native error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Platform-independent classification of the error.
    pub fn kind(&self) -> ErrorKind {
        std::io::Error::from_raw_os_error(self.code).kind()
    }

    /// Returns `true` for `EAGAIN`/`EWOULDBLOCK`/`WSAEWOULDBLOCK`.
    pub fn is_would_block(&self) -> bool {
        self.kind() == ErrorKind::WouldBlock
    }
}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::io::Error::from_raw_os_error(self.code))
    }
}

impl core::error::Error for OsError {}

impl From<OsError> for std::io::Error {
    fn from(error: OsError) -> Self {
        std::io::Error::from_raw_os_error(error.code)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::ErrorKind;

    use super::{Error, OsError};
    use crate::socket::SocketState;

    #[cfg(unix)]
    const WOULD_BLOCK: i32 = libc::EWOULDBLOCK;
    #[cfg(windows)]
    const WOULD_BLOCK: i32 = windows_sys::Win32::Networking::WinSock::WSAEWOULDBLOCK;

    #[cfg(unix)]
    const ADDRESS_IN_USE: i32 = libc::EADDRINUSE;
    #[cfg(windows)]
    const ADDRESS_IN_USE: i32 = windows_sys::Win32::Networking::WinSock::WSAEADDRINUSE;

    #[test]
    fn would_block_is_distinguished_from_hard_failures() {
        let would_block = Error::from(OsError::from_raw(WOULD_BLOCK));
        assert!(would_block.is_would_block());
        assert!(!would_block.is_programmer_error());

        let in_use = Error::from(OsError::from_raw(ADDRESS_IN_USE));
        assert!(!in_use.is_would_block());
        assert_eq!(in_use.os_error().unwrap().kind(), ErrorKind::AddrInUse);
    }

    #[test]
    fn programmer_errors() {
        let state = Error::InvalidState {
            operation: "bind",
            state: SocketState::New,
        };
        assert!(state.is_programmer_error());
        assert_eq!(state.to_string(), "cannot bind a socket in state new");

        let empty = Error::EmptyBufferList { operation: "send" };
        assert!(empty.is_programmer_error());
        assert!(empty.os_error().is_none());

        assert!(!Error::InvalidArgument("family").is_programmer_error());
    }

    #[test]
    fn os_error_converts_to_io_error() {
        let error = std::io::Error::from(OsError::from_raw(ADDRESS_IN_USE));
        assert_eq!(error.raw_os_error(), Some(ADDRESS_IN_USE));
    }
}
