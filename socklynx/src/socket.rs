//! The socket handle and its lifecycle state machine.
//!
//! ```text
//! New ──create──▶ Created ──bind──▶ Bound ──close──▶ Closed ──create──▶ …
//!                    │                │
//!                    └── OS failure ──┴──▶ Error ──close──▶ Closed
//! ```
//!
//! Every operation checks its precondition before touching the OS. A rejected call returns
//! [`Error::InvalidState`] and leaves the socket as it was.

use core::fmt::{self, Display, Formatter};
use std::io::{IoSlice, IoSliceMut};

use serde::{Deserialize, Serialize};

use crate::endpoint::{AddressFamily, Endpoint};
use crate::error::OsError;
use crate::sys::{INVALID_HANDLE, NativeApi, Platform, RawHandle};
use crate::{Error, Result};

/// Lifecycle state of a [`Socket`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    /// Nothing allocated yet.
    #[default]
    New,
    /// A native handle exists but is not bound.
    Created,
    /// The handle is bound to the local endpoint; send and receive are available.
    Bound,
    /// Reserved for connected stream use; datagram sockets never enter it.
    Open,
    /// Closed and reset; equivalent to [`SocketState::New`].
    Closed,
    /// An OS call failed; only [`Socket::close`] is meaningful.
    Error,
}

impl SocketState {
    /// Returns `true` for the states in which a native handle may be held.
    pub fn holds_handle(self) -> bool {
        matches!(
            self,
            SocketState::Created | SocketState::Bound | SocketState::Open | SocketState::Error
        )
    }
}

impl Display for SocketState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketState::New => "new",
            SocketState::Created => "created",
            SocketState::Bound => "bound",
            SocketState::Open => "open",
            SocketState::Closed => "closed",
            SocketState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Which side of a conversation a socket plays. Informational only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Not specified.
    #[default]
    Unspecified,
    /// Receives traffic.
    Incoming,
    /// Sends traffic.
    Outgoing,
}

/// The wire type of a socket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    /// `SOCK_DGRAM`.
    #[default]
    Datagram,
    /// `SOCK_STREAM`.
    Stream,
}

impl SocketType {
    /// Returns `true` for the coherent pairs: datagram with UDP, stream with TCP.
    pub fn supports(self, protocol: Protocol) -> bool {
        matches!(
            (self, protocol),
            (SocketType::Datagram, Protocol::Udp) | (SocketType::Stream, Protocol::Tcp)
        )
    }
}

/// The wire protocol of a socket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// `IPPROTO_UDP`.
    #[default]
    Udp,
    /// `IPPROTO_TCP`.
    Tcp,
}

bitflags::bitflags! {
    /// Mode and status bits of a [`Socket`].
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SocketFlags: u32 {
        /// The handle is in non-blocking mode.
        const NONBLOCKING = 1 << 0;
        /// IPv6 socket with `IPV6_V6ONLY` set.
        const IPV4_DISABLED = 1 << 1;
        /// The last receive would have blocked.
        const WOULD_BLOCK_READ = 1 << 2;
        /// The last send would have blocked.
        const WOULD_BLOCK_WRITE = 1 << 3;
    }
}

/// A native socket handle together with its logical state.
///
/// The socket exclusively owns its handle. Dropping a socket that still holds one closes it.
///
/// ```no_run
/// use socklynx::{Endpoint, Socket};
///
/// # fn main() -> socklynx::Result<()> {
/// socklynx::setup()?;
/// let mut socket = Socket::new("127.0.0.1:51234".parse()?);
/// socket.open()?;
/// socket.send_to(b"ping", &"127.0.0.1:51235".parse::<Endpoint>()?)?;
/// socket.close()?;
/// socklynx::cleanup()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Socket {
    handle: RawHandle,
    direction: Direction,
    state: SocketState,
    socket_type: Option<SocketType>,
    protocol: Option<Protocol>,
    last_error: Option<OsError>,
    flags: SocketFlags,
    endpoint: Endpoint,
    dual_stack: bool,
}

impl Socket {
    /// Creates a socket in state [`SocketState::New`] that will bind to `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            handle: INVALID_HANDLE,
            direction: Direction::Unspecified,
            state: SocketState::New,
            socket_type: None,
            protocol: None,
            last_error: None,
            flags: SocketFlags::empty(),
            endpoint,
            dual_stack: false,
        }
    }

    /// Sets the direction tag.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Opts an IPv6 socket out of the default `IPV6_V6ONLY` setting.
    ///
    /// Only allowed before [`Socket::create`].
    pub fn set_dual_stack(&mut self, enabled: bool) -> Result<()> {
        self.require("configure", &[SocketState::New, SocketState::Closed])?;
        self.dual_stack = enabled;
        Ok(())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// The direction tag.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The wire type, once created.
    pub fn socket_type(&self) -> Option<SocketType> {
        self.socket_type
    }

    /// The wire protocol, once created.
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    /// The mode and status bits.
    pub fn flags(&self) -> SocketFlags {
        self.flags
    }

    /// The most recent OS error seen by this socket.
    pub fn last_error(&self) -> Option<OsError> {
        self.last_error
    }

    /// The endpoint the socket binds to.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The native handle, if one is held.
    pub fn raw_handle(&self) -> Option<RawHandle> {
        (self.handle != INVALID_HANDLE).then_some(self.handle)
    }

    /// Allocates a native handle of the local endpoint's family.
    ///
    /// IPv6 sockets get `IPV6_V6ONLY` unless [`Socket::set_dual_stack`] opted out, which is
    /// recorded as [`SocketFlags::IPV4_DISABLED`].
    pub fn create(&mut self, socket_type: SocketType, protocol: Protocol) -> Result<()> {
        self.require("create", &[SocketState::New, SocketState::Closed])?;
        if !socket_type.supports(protocol) {
            return Err(Error::InvalidArgument(
                "socket type and protocol are not a coherent pair",
            ));
        }
        let family = self.endpoint.address_family().ok_or(Error::InvalidArgument(
            "endpoint address family is neither IPv4 nor IPv6",
        ))?;

        let opened = Platform::open(family, socket_type, protocol);
        self.handle = self.check("create", opened)?;
        self.socket_type = Some(socket_type);
        self.protocol = Some(protocol);

        if family == AddressFamily::Ipv6 {
            let v6_only = !self.dual_stack;
            let applied = Platform::set_v6_only(self.handle, v6_only);
            self.check("create", applied)?;
            self.flags.set(SocketFlags::IPV4_DISABLED, v6_only);
        }

        self.transition(SocketState::Created);
        Ok(())
    }

    /// Binds the handle to the local endpoint.
    pub fn bind(&mut self) -> Result<()> {
        self.require("bind", &[SocketState::Created])?;
        let bound = Platform::bind(self.handle, &self.endpoint);
        self.check("bind", bound)?;
        self.transition(SocketState::Bound);
        Ok(())
    }

    /// Creates a UDP datagram socket and binds it.
    pub fn open(&mut self) -> Result<()> {
        self.create(SocketType::Datagram, Protocol::Udp)?;
        self.bind()
    }

    /// Switches the handle to blocking mode.
    pub fn set_blocking(&mut self) -> Result<()> {
        self.set_nonblocking_enabled(false)
    }

    /// Switches the handle to non-blocking mode.
    pub fn set_nonblocking(&mut self) -> Result<()> {
        self.set_nonblocking_enabled(true)
    }

    /// Switches the handle between blocking and non-blocking mode.
    pub fn set_nonblocking_enabled(&mut self, enabled: bool) -> Result<()> {
        if self.handle == INVALID_HANDLE {
            return Err(Error::InvalidState {
                operation: "change the blocking mode of",
                state: self.state,
            });
        }
        let applied = Platform::set_nonblocking(self.handle, enabled);
        self.check("set blocking mode", applied)?;
        self.flags.set(SocketFlags::NONBLOCKING, enabled);
        tracing::debug!(handle = self.handle, nonblocking = enabled, "blocking mode changed");
        Ok(())
    }

    /// Sends `buffers`, in order, as one message to `peer`.
    ///
    /// Returns the number of bytes sent. A would-block failure sets
    /// [`SocketFlags::WOULD_BLOCK_WRITE`] and leaves the socket bound.
    pub fn send(&mut self, buffers: &[IoSlice<'_>], peer: &Endpoint) -> Result<usize> {
        self.require("send", &[SocketState::Bound])?;
        if buffers.is_empty() {
            return Err(Error::EmptyBufferList { operation: "send" });
        }
        if !self.reaches(peer) {
            return Err(Error::InvalidArgument(
                "peer address family does not match the socket",
            ));
        }
        let sent = Platform::send(self.handle, buffers, peer);
        let sent = self.check_transfer("send", SocketFlags::WOULD_BLOCK_WRITE, sent)?;
        tracing::trace!(bytes = sent, %peer, "sent");
        Ok(sent)
    }

    /// Receives one message into `buffers`, in order, writing the sender's address into `peer`.
    ///
    /// Returns the number of bytes received. A would-block failure sets
    /// [`SocketFlags::WOULD_BLOCK_READ`] and leaves the socket bound.
    pub fn recv(&mut self, buffers: &mut [IoSliceMut<'_>], peer: &mut Endpoint) -> Result<usize> {
        self.require("receive", &[SocketState::Bound])?;
        if buffers.is_empty() {
            return Err(Error::EmptyBufferList {
                operation: "receive",
            });
        }
        let received = Platform::recv(self.handle, buffers, peer);
        let received = self.check_transfer("receive", SocketFlags::WOULD_BLOCK_READ, received)?;
        tracing::trace!(bytes = received, %peer, "received");
        Ok(received)
    }

    /// Sends `data` as one datagram to `peer`.
    pub fn send_to(&mut self, data: &[u8], peer: &Endpoint) -> Result<usize> {
        self.send(&[IoSlice::new(data)], peer)
    }

    /// Receives one datagram into `buffer`, returning its size and sender.
    pub fn recv_from(&mut self, buffer: &mut [u8]) -> Result<(usize, Endpoint)> {
        let mut peer = Endpoint::unspecified();
        let received = self.recv(&mut [IoSliceMut::new(buffer)], &mut peer)?;
        Ok((received, peer))
    }

    /// Asks the OS which address the handle is bound to.
    ///
    /// Differs from [`Socket::local_endpoint`] when binding to port 0.
    pub fn bound_endpoint(&mut self) -> Result<Endpoint> {
        self.require(
            "query the bound endpoint of",
            &[SocketState::Bound, SocketState::Open],
        )?;
        let mut endpoint = Endpoint::unspecified();
        let queried = Platform::local_endpoint(self.handle, &mut endpoint);
        self.check("query the bound endpoint", queried)?;
        Ok(endpoint)
    }

    /// Releases the native handle and resets the socket to [`SocketState::Closed`].
    ///
    /// The reset happens even when the OS reports a failure, which is still returned. The local
    /// endpoint, direction and dual-stack setting survive, so the socket may be created again.
    pub fn close(&mut self) -> Result<()> {
        if !self.state.holds_handle() {
            return Err(Error::InvalidState {
                operation: "close",
                state: self.state,
            });
        }
        let previous = self.state;
        let released = match self.raw_handle() {
            Some(handle) => Platform::close(handle),
            None => Ok(()),
        };

        self.handle = INVALID_HANDLE;
        self.socket_type = None;
        self.protocol = None;
        self.last_error = None;
        self.flags = SocketFlags::empty();
        self.state = SocketState::Closed;
        tracing::debug!(from = %previous, to = %self.state, endpoint = %self.endpoint, "socket state changed");

        if let Err(error) = released {
            self.last_error = error.os_error();
            tracing::warn!(%error, endpoint = %self.endpoint, "failed to close native handle");
            return Err(error);
        }
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: &[SocketState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Returns `true` if the handle can address `peer`: same family, or an IPv4 peer on a
    /// dual-stack IPv6 socket. An unspecified peer is left to the platform layer.
    fn reaches(&self, peer: &Endpoint) -> bool {
        let Some(family) = peer.address_family() else {
            return true;
        };
        match self.endpoint.address_family() {
            Some(local) if local == family => true,
            Some(AddressFamily::Ipv6) => {
                family == AddressFamily::Ipv4 && !self.flags.contains(SocketFlags::IPV4_DISABLED)
            }
            _ => false,
        }
    }

    fn transition(&mut self, to: SocketState) {
        tracing::debug!(
            from = %self.state,
            to = %to,
            endpoint = %self.endpoint,
            handle = self.handle,
            "socket state changed"
        );
        self.state = to;
    }

    /// Moves the socket into [`SocketState::Error`] if `result` is an OS failure.
    fn check<T>(&mut self, operation: &'static str, result: Result<T>) -> Result<T> {
        result.inspect_err(|error| {
            if let Some(os) = error.os_error() {
                self.fail(operation, os);
            }
        })
    }

    /// Like [`Socket::check`], but a would-block failure only sets `would_block` and a success
    /// clears it.
    fn check_transfer(
        &mut self,
        operation: &'static str,
        would_block: SocketFlags,
        result: Result<usize>,
    ) -> Result<usize> {
        match result {
            Ok(bytes) => {
                self.flags.remove(would_block);
                Ok(bytes)
            }
            Err(error) if error.is_would_block() => {
                self.flags.insert(would_block);
                self.last_error = error.os_error();
                tracing::debug!(handle = self.handle, operation, "would block");
                Err(error)
            }
            Err(error) => self.check(operation, Err(error)),
        }
    }

    fn fail(&mut self, operation: &'static str, error: OsError) {
        tracing::warn!(
            operation,
            %error,
            from = %self.state,
            endpoint = %self.endpoint,
            "socket operation failed"
        );
        self.last_error = Some(error);
        self.state = SocketState::Error;
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Some(handle) = self.raw_handle()
            && let Err(error) = Platform::close(handle)
        {
            tracing::warn!(%error, endpoint = %self.endpoint, "failed to close native handle on drop");
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use tracing_test::traced_test;

    use super::{Protocol, Socket, SocketFlags, SocketState, SocketType};
    use crate::{Endpoint, Error, OsError};

    #[cfg(unix)]
    const WOULD_BLOCK: i32 = libc::EWOULDBLOCK;
    #[cfg(windows)]
    const WOULD_BLOCK: i32 = windows_sys::Win32::Networking::WinSock::WSAEWOULDBLOCK;

    #[cfg(unix)]
    const ADDRESS_IN_USE: i32 = libc::EADDRINUSE;
    #[cfg(windows)]
    const ADDRESS_IN_USE: i32 = windows_sys::Win32::Networking::WinSock::WSAEADDRINUSE;

    fn loopback_any_port() -> Endpoint {
        crate::setup().unwrap();
        Endpoint::v4(Ipv4Addr::LOCALHOST, 0)
    }

    /// A loopback datagram socket driven into `state`.
    fn socket_in(state: SocketState) -> Socket {
        let mut socket = Socket::new(loopback_any_port());
        match state {
            SocketState::New => {}
            SocketState::Created => socket.create(SocketType::Datagram, Protocol::Udp).unwrap(),
            SocketState::Bound => socket.open().unwrap(),
            SocketState::Closed => {
                socket.open().unwrap();
                socket.close().unwrap();
            }
            SocketState::Error => {
                socket.open().unwrap();
                socket.fail("bind", OsError::from_raw(ADDRESS_IN_USE));
            }
            SocketState::Open => panic!("datagram sockets never enter {state}"),
        }
        assert_eq!(socket.state(), state);
        socket
    }

    #[test]
    fn fresh_socket_is_empty() {
        let socket = Socket::new(loopback_any_port());
        assert_eq!(socket.state(), SocketState::New);
        assert_eq!(socket.raw_handle(), None);
        assert_eq!(socket.flags(), SocketFlags::empty());
        assert_eq!(socket.socket_type(), None);
        assert_eq!(socket.protocol(), None);
        assert_eq!(socket.last_error(), None);
    }

    #[test_case(SocketType::Datagram, Protocol::Tcp)]
    #[test_case(SocketType::Stream, Protocol::Udp)]
    fn incoherent_pairs_are_rejected(socket_type: SocketType, protocol: Protocol) {
        let mut socket = Socket::new(loopback_any_port());
        let error = socket.create(socket_type, protocol).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));
        assert_eq!(socket.state(), SocketState::New);
        assert_eq!(socket.raw_handle(), None);
    }

    #[test_case(SocketType::Datagram, Protocol::Udp)]
    #[test_case(SocketType::Stream, Protocol::Tcp)]
    fn coherent_pairs_are_created(socket_type: SocketType, protocol: Protocol) {
        let mut socket = Socket::new(loopback_any_port());
        socket.create(socket_type, protocol).unwrap();
        assert_eq!(socket.state(), SocketState::Created);
        assert!(socket.raw_handle().is_some());
        assert_eq!(socket.socket_type(), Some(socket_type));
        assert_eq!(socket.protocol(), Some(protocol));
        assert!(!socket.flags().contains(SocketFlags::IPV4_DISABLED));
    }

    #[test]
    fn unspecified_endpoint_is_rejected() {
        crate::setup().unwrap();
        let mut socket = Socket::new(Endpoint::unspecified());
        let error = socket.create(SocketType::Datagram, Protocol::Udp).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));
        assert_eq!(socket.state(), SocketState::New);
    }

    #[test]
    fn out_of_order_operations_leave_state_unchanged() {
        let mut socket = Socket::new(loopback_any_port());
        let peer = loopback_any_port();

        assert!(matches!(
            socket.bind(),
            Err(Error::InvalidState {
                operation: "bind",
                state: SocketState::New
            })
        ));
        assert!(socket.send_to(b"data", &peer).unwrap_err().is_programmer_error());
        assert!(socket.recv_from(&mut [0; 8]).unwrap_err().is_programmer_error());
        assert!(socket.set_nonblocking().unwrap_err().is_programmer_error());
        assert!(socket.bound_endpoint().unwrap_err().is_programmer_error());
        assert!(socket.close().unwrap_err().is_programmer_error());
        assert_eq!(socket.state(), SocketState::New);

        socket.create(SocketType::Datagram, Protocol::Udp).unwrap();
        assert!(socket.send_to(b"data", &peer).unwrap_err().is_programmer_error());
        assert!(
            socket
                .create(SocketType::Datagram, Protocol::Udp)
                .unwrap_err()
                .is_programmer_error()
        );
        assert!(socket.set_dual_stack(true).unwrap_err().is_programmer_error());
        assert_eq!(socket.state(), SocketState::Created);
    }

    #[test_case(SocketState::Bound)]
    #[test_case(SocketState::Closed)]
    #[test_case(SocketState::Error)]
    fn bind_requires_a_created_socket(state: SocketState) {
        let mut socket = socket_in(state);
        assert_eq!(
            socket.bind(),
            Err(Error::InvalidState {
                operation: "bind",
                state
            })
        );
        assert_eq!(socket.state(), state);
    }

    #[test_case(SocketState::Created)]
    #[test_case(SocketState::Closed)]
    #[test_case(SocketState::Error)]
    fn transfers_require_a_bound_socket(state: SocketState) {
        let mut socket = socket_in(state);
        let last_error = socket.last_error();

        assert_eq!(
            socket.send_to(b"data", &Endpoint::v4(Ipv4Addr::LOCALHOST, 9)),
            Err(Error::InvalidState {
                operation: "send",
                state
            })
        );
        assert_eq!(
            socket.recv_from(&mut [0; 8]),
            Err(Error::InvalidState {
                operation: "receive",
                state
            })
        );
        assert_eq!(socket.state(), state);
        assert_eq!(socket.last_error(), last_error);
    }

    #[test]
    fn error_state_only_allows_close() {
        let mut socket = socket_in(SocketState::Error);
        assert!(
            socket
                .create(SocketType::Datagram, Protocol::Udp)
                .unwrap_err()
                .is_programmer_error()
        );
        assert!(socket.set_dual_stack(true).unwrap_err().is_programmer_error());
        assert!(socket.bound_endpoint().unwrap_err().is_programmer_error());
        assert_eq!(socket.state(), SocketState::Error);

        socket.close().unwrap();
        assert_eq!(socket.state(), SocketState::Closed);
    }

    #[test]
    fn would_block_toggles_the_transfer_flag() {
        let mut socket = socket_in(SocketState::Bound);
        let would_block = Error::Os(OsError::from_raw(WOULD_BLOCK));

        assert_eq!(
            socket.check_transfer("send", SocketFlags::WOULD_BLOCK_WRITE, Err(would_block)),
            Err(would_block)
        );
        assert!(socket.flags().contains(SocketFlags::WOULD_BLOCK_WRITE));
        assert!(!socket.flags().contains(SocketFlags::WOULD_BLOCK_READ));
        assert_eq!(socket.last_error(), would_block.os_error());
        assert_eq!(socket.state(), SocketState::Bound);

        assert_eq!(
            socket.check_transfer("send", SocketFlags::WOULD_BLOCK_WRITE, Ok(5)),
            Ok(5)
        );
        assert!(!socket.flags().contains(SocketFlags::WOULD_BLOCK_WRITE));
        assert_eq!(socket.state(), SocketState::Bound);

        let failure = Error::Os(OsError::from_raw(ADDRESS_IN_USE));
        assert_eq!(
            socket.check_transfer("send", SocketFlags::WOULD_BLOCK_WRITE, Err(failure)),
            Err(failure)
        );
        assert!(!socket.flags().contains(SocketFlags::WOULD_BLOCK_WRITE));
        assert_eq!(socket.state(), SocketState::Error);
    }

    #[test]
    fn peer_family_must_match_the_socket() {
        let v4_peer = Endpoint::v4(Ipv4Addr::LOCALHOST, 9);
        let v6_peer = Endpoint::v6(Ipv6Addr::LOCALHOST, 9, 0, 0);

        let v4 = Socket::new(Endpoint::v4(Ipv4Addr::LOCALHOST, 0));
        assert!(v4.reaches(&v4_peer));
        assert!(!v4.reaches(&v6_peer));

        let mut v6 = Socket::new(Endpoint::v6(Ipv6Addr::LOCALHOST, 0, 0, 0));
        v6.flags.insert(SocketFlags::IPV4_DISABLED);
        assert!(v6.reaches(&v6_peer));
        assert!(!v6.reaches(&v4_peer));

        v6.flags.remove(SocketFlags::IPV4_DISABLED);
        assert!(v6.reaches(&v4_peer));
    }

    #[test]
    fn empty_buffer_lists_are_rejected() {
        let mut socket = Socket::new(loopback_any_port());
        socket.open().unwrap();
        let mut peer = Endpoint::unspecified();

        assert_eq!(
            socket.send(&[], &loopback_any_port()),
            Err(Error::EmptyBufferList { operation: "send" })
        );
        assert_eq!(
            socket.recv(&mut [], &mut peer),
            Err(Error::EmptyBufferList {
                operation: "receive"
            })
        );
        assert_eq!(socket.state(), SocketState::Bound);
    }

    #[test]
    fn close_resets_to_reusable_storage() {
        let endpoint = loopback_any_port();
        let mut socket = Socket::new(endpoint);
        socket.open().unwrap();
        socket.set_nonblocking().unwrap();
        assert!(socket.flags().contains(SocketFlags::NONBLOCKING));

        socket.close().unwrap();
        assert_eq!(socket.state(), SocketState::Closed);
        assert_eq!(socket.raw_handle(), None);
        assert_eq!(socket.flags(), SocketFlags::empty());
        assert_eq!(socket.socket_type(), None);
        assert_eq!(socket.protocol(), None);
        assert_eq!(*socket.local_endpoint(), endpoint);

        socket.open().unwrap();
        assert_eq!(socket.state(), SocketState::Bound);
    }

    #[test]
    fn bound_endpoint_reports_assigned_port() {
        let mut socket = Socket::new(loopback_any_port());
        socket.open().unwrap();
        let bound = socket.bound_endpoint().unwrap();
        assert!(bound.is_ipv4());
        assert_ne!(bound.port(), 0);
        assert_eq!(bound.as_v4().unwrap().ip(), &Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn state_names() {
        assert_eq!(SocketState::Bound.to_string(), "bound");
        assert_eq!(SocketState::Error.to_string(), "error");
        assert!(SocketState::Error.holds_handle());
        assert!(!SocketState::Closed.holds_handle());
    }

    #[test]
    #[traced_test]
    fn lifecycle_is_logged() {
        let mut socket = Socket::new(loopback_any_port());
        socket.open().unwrap();
        socket.close().unwrap();

        assert!(logs_contain("from=new to=created"));
        assert!(logs_contain("from=created to=bound"));
        assert!(logs_contain("from=bound to=closed"));
    }
}
