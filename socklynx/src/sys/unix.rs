//! BSD socket implementation over `libc`.

use core::mem::{self, offset_of};
use std::io::{IoSlice, IoSliceMut};

use crate::endpoint::{AddressFamily, Endpoint, RawV4, RawV6};
use crate::error::OsError;
use crate::socket::{Protocol, SocketType};
use crate::sys::NativeApi;
use crate::{Error, Result};

/// A native socket descriptor.
pub type RawHandle = libc::c_int;

/// The OS's generic socket address type.
pub type RawSockAddr = libc::sockaddr;

pub(crate) type RawFamily = libc::sa_family_t;

pub(crate) const INVALID_HANDLE: RawHandle = -1;
pub(crate) const AF_INET: i32 = libc::AF_INET;
pub(crate) const AF_INET6: i32 = libc::AF_INET6;

#[cfg(any(target_os = "android", target_os = "linux"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "android", target_os = "linux")))]
const SEND_FLAGS: libc::c_int = 0;

/// Leading bytes shared by `sockaddr_in` and `sockaddr_in6`.
///
/// BSD-derived platforms carry an extra `sin_len` byte in front of a one-byte family.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawHeader {
    #[cfg(any(
        target_vendor = "apple",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    len: u8,
    family: RawFamily,
}

impl RawHeader {
    pub(crate) const UNSPECIFIED: Self = Self {
        #[cfg(any(
            target_vendor = "apple",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        len: 0,
        family: 0,
    };

    pub(crate) fn new(family: AddressFamily) -> Self {
        let (raw, _size) = match family {
            AddressFamily::Ipv4 => (AF_INET, size_of::<libc::sockaddr_in>()),
            AddressFamily::Ipv6 => (AF_INET6, size_of::<libc::sockaddr_in6>()),
        };
        Self {
            #[cfg(any(
                target_vendor = "apple",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd"
            ))]
            len: _size as u8,
            family: raw as RawFamily,
        }
    }

    pub(crate) fn family(self) -> i32 {
        i32::from(self.family)
    }
}

const _: () = {
    assert!(size_of::<RawV4>() == size_of::<libc::sockaddr_in>());
    assert!(align_of::<RawV4>() == align_of::<libc::sockaddr_in>());
    assert!(offset_of!(RawHeader, family) == offset_of!(libc::sockaddr_in, sin_family));
    assert!(offset_of!(RawV4, port) == offset_of!(libc::sockaddr_in, sin_port));
    assert!(offset_of!(RawV4, addr) == offset_of!(libc::sockaddr_in, sin_addr));
    assert!(offset_of!(RawV4, zero) == offset_of!(libc::sockaddr_in, sin_zero));

    assert!(size_of::<RawV6>() == size_of::<libc::sockaddr_in6>());
    assert!(align_of::<RawV6>() == align_of::<libc::sockaddr_in6>());
    assert!(offset_of!(RawHeader, family) == offset_of!(libc::sockaddr_in6, sin6_family));
    assert!(offset_of!(RawV6, port) == offset_of!(libc::sockaddr_in6, sin6_port));
    assert!(offset_of!(RawV6, flowinfo) == offset_of!(libc::sockaddr_in6, sin6_flowinfo));
    assert!(offset_of!(RawV6, addr) == offset_of!(libc::sockaddr_in6, sin6_addr));
    assert!(offset_of!(RawV6, scope_id) == offset_of!(libc::sockaddr_in6, sin6_scope_id));
};

/// Maps a `-1`-style return value onto the captured `errno`.
fn check(result: libc::c_int) -> Result<libc::c_int> {
    if result < 0 {
        Err(Error::Os(OsError::last()))
    } else {
        Ok(result)
    }
}

fn check_size(result: libc::ssize_t) -> Result<usize> {
    usize::try_from(result).map_err(|_| Error::Os(OsError::last()))
}

#[cfg(not(any(target_os = "android", target_os = "linux")))]
fn set_cloexec(handle: RawHandle) -> Result<()> {
    // SAFETY: `fcntl` with `F_GETFD` takes no pointer arguments.
    let flags = check(unsafe { libc::fcntl(handle, libc::F_GETFD) })?;
    // SAFETY: `fcntl` with `F_SETFD` takes no pointer arguments.
    check(unsafe { libc::fcntl(handle, libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;
    Ok(())
}

/// The POSIX backend.
#[derive(Debug)]
pub(crate) struct Unix;

impl NativeApi for Unix {
    fn startup() -> Result<()> {
        Ok(())
    }

    fn teardown() -> Result<()> {
        Ok(())
    }

    fn open(
        family: AddressFamily,
        socket_type: SocketType,
        protocol: Protocol,
    ) -> Result<RawHandle> {
        let kind = match socket_type {
            SocketType::Datagram => libc::SOCK_DGRAM,
            SocketType::Stream => libc::SOCK_STREAM,
        };
        let protocol = match protocol {
            Protocol::Udp => libc::IPPROTO_UDP,
            Protocol::Tcp => libc::IPPROTO_TCP,
        };

        #[cfg(any(target_os = "android", target_os = "linux"))]
        let kind = kind | libc::SOCK_CLOEXEC;

        // SAFETY: `socket` takes no pointer arguments.
        let handle = check(unsafe { libc::socket(family.to_native(), kind, protocol) })?;

        #[cfg(not(any(target_os = "android", target_os = "linux")))]
        if let Err(error) = set_cloexec(handle) {
            let _ = Self::close(handle);
            return Err(error);
        }

        Ok(handle)
    }

    fn set_v6_only(handle: RawHandle, enabled: bool) -> Result<()> {
        let value = libc::c_int::from(enabled);
        // SAFETY: `value` outlives the call and the length matches its type.
        check(unsafe {
            libc::setsockopt(
                handle,
                libc::IPPROTO_IPV6,
                libc::IPV6_V6ONLY,
                core::ptr::from_ref(&value).cast(),
                size_of::<libc::c_int>() as libc::socklen_t,
            )
        })?;
        Ok(())
    }

    fn bind(handle: RawHandle, endpoint: &Endpoint) -> Result<()> {
        let size = endpoint.native_size()?;
        // SAFETY: the endpoint is `size` bytes of a valid `sockaddr_in`/`sockaddr_in6`.
        check(unsafe {
            libc::bind(
                handle,
                endpoint.as_native_address(),
                size as libc::socklen_t,
            )
        })?;
        Ok(())
    }

    fn set_nonblocking(handle: RawHandle, enabled: bool) -> Result<()> {
        // SAFETY: `fcntl` with `F_GETFL` takes no pointer arguments.
        let flags = check(unsafe { libc::fcntl(handle, libc::F_GETFL) })?;
        let updated = if enabled {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if updated != flags {
            // SAFETY: `fcntl` with `F_SETFL` takes no pointer arguments.
            check(unsafe { libc::fcntl(handle, libc::F_SETFL, updated) })?;
        }
        Ok(())
    }

    fn send(handle: RawHandle, buffers: &[IoSlice<'_>], peer: &Endpoint) -> Result<usize> {
        let size = peer.native_size()?;

        // SAFETY: `msghdr` is plain data; all-zero is a valid empty header.
        let mut message: libc::msghdr = unsafe { mem::zeroed() };
        message.msg_name = peer.as_native_address().cast_mut().cast();
        message.msg_namelen = size as libc::socklen_t;
        // `IoSlice` is ABI-compatible with `iovec`; `sendmsg` does not write through `msg_iov`.
        message.msg_iov = buffers.as_ptr().cast_mut().cast();
        message.msg_iovlen = buffers.len() as _;

        // SAFETY: every pointer in `message` refers to memory borrowed for the whole call.
        check_size(unsafe { libc::sendmsg(handle, &message, SEND_FLAGS) })
    }

    fn recv(
        handle: RawHandle,
        buffers: &mut [IoSliceMut<'_>],
        peer: &mut Endpoint,
    ) -> Result<usize> {
        *peer = Endpoint::unspecified();

        // SAFETY: `msghdr` is plain data; all-zero is a valid empty header.
        let mut message: libc::msghdr = unsafe { mem::zeroed() };
        message.msg_name = peer.as_native_address_mut().cast();
        message.msg_namelen = size_of::<Endpoint>() as libc::socklen_t;
        // `IoSliceMut` is ABI-compatible with `iovec`.
        message.msg_iov = buffers.as_mut_ptr().cast();
        message.msg_iovlen = buffers.len() as _;

        // SAFETY: `msg_name` points at `msg_namelen` writable bytes and every `iovec` at a
        // mutably borrowed buffer.
        let received = check_size(unsafe { libc::recvmsg(handle, &mut message, 0) })?;

        if message.msg_flags & libc::MSG_TRUNC != 0 {
            tracing::trace!(received, "datagram truncated to the supplied buffers");
        }

        Ok(received)
    }

    fn local_endpoint(handle: RawHandle, endpoint: &mut Endpoint) -> Result<()> {
        *endpoint = Endpoint::unspecified();
        let mut size = size_of::<Endpoint>() as libc::socklen_t;
        // SAFETY: the endpoint provides `size` writable bytes.
        check(unsafe { libc::getsockname(handle, endpoint.as_native_address_mut(), &mut size) })?;
        Ok(())
    }

    fn close(handle: RawHandle) -> Result<()> {
        // SAFETY: `close` takes no pointer arguments; the caller owns `handle`.
        check(unsafe { libc::close(handle) })?;
        Ok(())
    }
}
