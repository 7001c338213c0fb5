//! Native socket capability interface.
//!
//! The state machine in [`crate::socket`] only talks to the OS through [`NativeApi`]. Exactly one
//! implementation is compiled per target and exported as [`Platform`].

use std::io::{IoSlice, IoSliceMut};

use crate::Result;
use crate::endpoint::{AddressFamily, Endpoint};
use crate::socket::{Protocol, SocketType};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::{AF_INET, AF_INET6, INVALID_HANDLE, RawHeader, Unix as Platform};
#[cfg(unix)]
pub use unix::{RawHandle, RawSockAddr};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::{AF_INET, AF_INET6, INVALID_HANDLE, RawHeader, Windows as Platform};
#[cfg(windows)]
pub use windows::{RawHandle, RawSockAddr};

/// The OS calls a socket needs, with the platform's error conventions already translated.
///
/// Every failing call reports the captured native error as [`crate::Error::Os`]. A negative
/// byte count from the OS never escapes as data.
pub(crate) trait NativeApi {
    /// Initializes the OS networking subsystem.
    fn startup() -> Result<()>;

    /// Tears the OS networking subsystem down again.
    fn teardown() -> Result<()>;

    /// Allocates a native handle.
    fn open(family: AddressFamily, socket_type: SocketType, protocol: Protocol)
    -> Result<RawHandle>;

    /// Sets or clears `IPV6_V6ONLY`.
    fn set_v6_only(handle: RawHandle, enabled: bool) -> Result<()>;

    /// Binds the handle to `endpoint`.
    fn bind(handle: RawHandle, endpoint: &Endpoint) -> Result<()>;

    /// Switches the handle between blocking and non-blocking mode.
    fn set_nonblocking(handle: RawHandle, enabled: bool) -> Result<()>;

    /// Gathers `buffers` into one message sent to `peer`.
    fn send(handle: RawHandle, buffers: &[IoSlice<'_>], peer: &Endpoint) -> Result<usize>;

    /// Scatters one message into `buffers`, writing the sender's address into `peer`.
    fn recv(handle: RawHandle, buffers: &mut [IoSliceMut<'_>], peer: &mut Endpoint)
    -> Result<usize>;

    /// Writes the address the handle is bound to into `endpoint`.
    fn local_endpoint(handle: RawHandle, endpoint: &mut Endpoint) -> Result<()>;

    /// Releases the handle.
    fn close(handle: RawHandle) -> Result<()>;
}
