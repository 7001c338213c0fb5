//! Winsock implementation over `windows-sys`.

use core::mem::{self, offset_of};
use core::ptr;
use std::io::{IoSlice, IoSliceMut};

use windows_sys::Win32::Networking::WinSock::{
    self as winsock, ADDRESS_FAMILY, SOCKADDR, SOCKADDR_IN, SOCKADDR_IN6, SOCKET, WSABUF,
    WSADATA,
};

use crate::endpoint::{AddressFamily, Endpoint, RawV4, RawV6};
use crate::error::OsError;
use crate::socket::{Protocol, SocketType};
use crate::sys::NativeApi;
use crate::{Error, Result};

/// A native socket handle.
pub type RawHandle = SOCKET;

/// The OS's generic socket address type.
pub type RawSockAddr = SOCKADDR;

pub(crate) const INVALID_HANDLE: RawHandle = winsock::INVALID_SOCKET;
pub(crate) const AF_INET: i32 = winsock::AF_INET as i32;
pub(crate) const AF_INET6: i32 = winsock::AF_INET6 as i32;

/// Winsock 2.2.
const WINSOCK_VERSION: u16 = 0x0202;

/// Leading bytes shared by `SOCKADDR_IN` and `SOCKADDR_IN6`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawHeader {
    family: ADDRESS_FAMILY,
}

impl RawHeader {
    pub(crate) const UNSPECIFIED: Self = Self { family: 0 };

    pub(crate) fn new(family: AddressFamily) -> Self {
        let family = match family {
            AddressFamily::Ipv4 => winsock::AF_INET,
            AddressFamily::Ipv6 => winsock::AF_INET6,
        };
        Self { family }
    }

    pub(crate) fn family(self) -> i32 {
        i32::from(self.family)
    }
}

const _: () = {
    assert!(size_of::<RawV4>() == size_of::<SOCKADDR_IN>());
    assert!(align_of::<RawV4>() == align_of::<SOCKADDR_IN>());
    assert!(offset_of!(RawV4, port) == offset_of!(SOCKADDR_IN, sin_port));
    assert!(offset_of!(RawV4, addr) == offset_of!(SOCKADDR_IN, sin_addr));
    assert!(offset_of!(RawV4, zero) == offset_of!(SOCKADDR_IN, sin_zero));

    assert!(size_of::<RawV6>() == size_of::<SOCKADDR_IN6>());
    assert!(align_of::<RawV6>() == align_of::<SOCKADDR_IN6>());
    assert!(offset_of!(RawV6, port) == offset_of!(SOCKADDR_IN6, sin6_port));
    assert!(offset_of!(RawV6, flowinfo) == offset_of!(SOCKADDR_IN6, sin6_flowinfo));
    assert!(offset_of!(RawV6, addr) == offset_of!(SOCKADDR_IN6, sin6_addr));
    // `sin6_scope_id` lives in the anonymous union after the address.
    assert!(offset_of!(RawV6, scope_id) == offset_of!(SOCKADDR_IN6, Anonymous));
};

/// Maps a `SOCKET_ERROR` return value onto `WSAGetLastError`.
fn check(result: i32) -> Result<i32> {
    if result == winsock::SOCKET_ERROR {
        Err(Error::Os(OsError::last()))
    } else {
        Ok(result)
    }
}

fn buffer_count(count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| Error::InvalidArgument("too many buffer descriptors"))
}

/// The Winsock backend.
#[derive(Debug)]
pub(crate) struct Windows;

impl NativeApi for Windows {
    fn startup() -> Result<()> {
        // SAFETY: `WSADATA` is plain data; all-zero is a valid value for an out parameter.
        let mut data: WSADATA = unsafe { mem::zeroed() };
        // SAFETY: `data` is a valid out pointer for the duration of the call.
        let code = unsafe { winsock::WSAStartup(WINSOCK_VERSION, &mut data) };
        if code != 0 {
            // `WSAStartup` returns its error instead of setting the last error.
            return Err(Error::Os(OsError::from_raw(code)));
        }
        Ok(())
    }

    fn teardown() -> Result<()> {
        // SAFETY: takes no arguments; only called after a successful `startup`.
        check(unsafe { winsock::WSACleanup() })?;
        Ok(())
    }

    fn open(
        family: AddressFamily,
        socket_type: SocketType,
        protocol: Protocol,
    ) -> Result<RawHandle> {
        let kind = match socket_type {
            SocketType::Datagram => winsock::SOCK_DGRAM,
            SocketType::Stream => winsock::SOCK_STREAM,
        };
        let protocol = match protocol {
            Protocol::Udp => winsock::IPPROTO_UDP,
            Protocol::Tcp => winsock::IPPROTO_TCP,
        };

        // SAFETY: `socket` takes no pointer arguments.
        let handle = unsafe { winsock::socket(family.to_native(), kind, protocol) };
        if handle == INVALID_HANDLE {
            return Err(Error::Os(OsError::last()));
        }
        Ok(handle)
    }

    fn set_v6_only(handle: RawHandle, enabled: bool) -> Result<()> {
        let value = u32::from(enabled);
        // SAFETY: `value` outlives the call and the length matches its type.
        check(unsafe {
            winsock::setsockopt(
                handle,
                winsock::IPPROTO_IPV6,
                winsock::IPV6_V6ONLY,
                ptr::from_ref(&value).cast(),
                size_of::<u32>() as i32,
            )
        })?;
        Ok(())
    }

    fn bind(handle: RawHandle, endpoint: &Endpoint) -> Result<()> {
        let size = endpoint.native_size()?;
        // SAFETY: the endpoint is `size` bytes of a valid `SOCKADDR_IN`/`SOCKADDR_IN6`.
        check(unsafe { winsock::bind(handle, endpoint.as_native_address(), size as i32) })?;
        Ok(())
    }

    fn set_nonblocking(handle: RawHandle, enabled: bool) -> Result<()> {
        let mut value = u32::from(enabled);
        // SAFETY: `value` is a valid in/out pointer for the duration of the call.
        check(unsafe { winsock::ioctlsocket(handle, winsock::FIONBIO, &mut value) })?;
        Ok(())
    }

    fn send(handle: RawHandle, buffers: &[IoSlice<'_>], peer: &Endpoint) -> Result<usize> {
        let size = peer.native_size()?;
        let count = buffer_count(buffers.len())?;
        let mut sent = 0u32;
        // SAFETY: `IoSlice` is ABI-compatible with `WSABUF` and Winsock does not write through
        // the buffer array. `peer` provides `size` readable bytes and no overlapped I/O is
        // requested.
        check(unsafe {
            winsock::WSASendTo(
                handle,
                buffers.as_ptr().cast::<WSABUF>(),
                count,
                &mut sent,
                0,
                peer.as_native_address(),
                size as i32,
                ptr::null_mut(),
                None,
            )
        })?;
        Ok(sent as usize)
    }

    fn recv(
        handle: RawHandle,
        buffers: &mut [IoSliceMut<'_>],
        peer: &mut Endpoint,
    ) -> Result<usize> {
        *peer = Endpoint::unspecified();
        let count = buffer_count(buffers.len())?;
        let mut received = 0u32;
        let mut flags = 0u32;
        let mut size = size_of::<Endpoint>() as i32;
        // SAFETY: `IoSliceMut` is ABI-compatible with `WSABUF`, every buffer is mutably borrowed
        // and `peer` provides `size` writable bytes. No overlapped I/O is requested.
        let result = check(unsafe {
            winsock::WSARecvFrom(
                handle,
                buffers.as_mut_ptr().cast::<WSABUF>(),
                count,
                &mut received,
                &mut flags,
                peer.as_native_address_mut(),
                &mut size,
                ptr::null_mut(),
                None,
            )
        });
        match result {
            Ok(_) => Ok(received as usize),
            // Winsock fills every buffer before reporting a truncated datagram.
            Err(Error::Os(error)) if error.code() == winsock::WSAEMSGSIZE => {
                let received = buffers.iter().map(|buffer| buffer.len()).sum::<usize>();
                tracing::trace!(received, "datagram truncated to the supplied buffers");
                Ok(received)
            }
            Err(error) => Err(error),
        }
    }

    fn local_endpoint(handle: RawHandle, endpoint: &mut Endpoint) -> Result<()> {
        *endpoint = Endpoint::unspecified();
        let mut size = size_of::<Endpoint>() as i32;
        // SAFETY: the endpoint provides `size` writable bytes.
        check(unsafe {
            winsock::getsockname(handle, endpoint.as_native_address_mut(), &mut size)
        })?;
        Ok(())
    }

    fn close(handle: RawHandle) -> Result<()> {
        // SAFETY: `closesocket` takes no pointer arguments; the caller owns `handle`.
        check(unsafe { winsock::closesocket(handle) })?;
        Ok(())
    }
}
