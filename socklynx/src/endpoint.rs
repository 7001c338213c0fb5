//! IPv4/IPv6 socket addresses in the OS's native binary layout.
//!
//! An [`Endpoint`] overlays `sockaddr_in` and `sockaddr_in6` exactly, so the same storage is
//! handed by pointer to `bind`, `sendmsg`/`WSASendTo` and written back by
//! `recvmsg`/`WSARecvFrom` without any marshaling step.

use core::fmt::{self, Debug, Display, Formatter};
use core::mem::size_of;
use core::str::FromStr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::sys::{self, RawHeader, RawSockAddr};
use crate::{Error, Result};

/// The address families an [`Endpoint`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// `AF_INET`.
    Ipv4,
    /// `AF_INET6`.
    Ipv6,
}

impl AddressFamily {
    /// Converts a native `AF_*` value, rejecting everything but `AF_INET` and `AF_INET6`.
    pub fn from_native(family: i32) -> Result<Self> {
        match family {
            sys::AF_INET => Ok(AddressFamily::Ipv4),
            sys::AF_INET6 => Ok(AddressFamily::Ipv6),
            _ => Err(Error::InvalidArgument(
                "address family is neither IPv4 nor IPv6",
            )),
        }
    }

    /// The native `AF_*` value for this family.
    pub fn to_native(self) -> i32 {
        match self {
            AddressFamily::Ipv4 => sys::AF_INET,
            AddressFamily::Ipv6 => sys::AF_INET6,
        }
    }
}

impl TryFrom<i32> for AddressFamily {
    type Error = Error;

    fn try_from(family: i32) -> Result<Self> {
        Self::from_native(family)
    }
}

impl From<AddressFamily> for i32 {
    fn from(family: AddressFamily) -> Self {
        family.to_native()
    }
}

impl Display for AddressFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Overlay of `sockaddr_in`.
///
/// `port` and `addr` hold network byte order.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RawV4 {
    pub(crate) header: RawHeader,
    pub(crate) port: u16,
    pub(crate) addr: u32,
    pub(crate) zero: [u8; 8],
}

/// Overlay of `sockaddr_in6`.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RawV6 {
    pub(crate) header: RawHeader,
    pub(crate) port: u16,
    pub(crate) flowinfo: u32,
    pub(crate) addr: [u8; 16],
    pub(crate) scope_id: u32,
}

impl RawV6 {
    const ZERO: Self = Self {
        header: RawHeader::UNSPECIFIED,
        port: 0,
        flowinfo: 0,
        addr: [0; 16],
        scope_id: 0,
    };
}

/// Both variants start with [`RawHeader`] followed by the port, so those two fields can be read
/// through any variant.
#[repr(C)]
#[derive(Clone, Copy)]
union RawEndpoint {
    header: RawHeader,
    v4: RawV4,
    v6: RawV6,
}

/// An IPv4 or IPv6 socket address laid out exactly like the platform's native structure.
///
/// Storage is always fully initialized: every constructor starts from the all-zero `v6` shape,
/// the largest variant.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct Endpoint {
    raw: RawEndpoint,
}

impl Endpoint {
    /// An all-zero endpoint with no address family.
    ///
    /// This is the shape of a receive's "peer" slot before the OS fills it in.
    pub const fn unspecified() -> Self {
        Self {
            raw: RawEndpoint { v6: RawV6::ZERO },
        }
    }

    /// An IPv4 endpoint.
    pub fn v4(ip: Ipv4Addr, port: u16) -> Self {
        let mut endpoint = Self::unspecified();
        endpoint.raw.v4 = RawV4 {
            header: RawHeader::new(AddressFamily::Ipv4),
            port: port.to_be(),
            addr: u32::from_ne_bytes(ip.octets()),
            zero: [0; 8],
        };
        endpoint
    }

    /// An IPv6 endpoint.
    pub fn v6(ip: Ipv6Addr, port: u16, flowinfo: u32, scope_id: u32) -> Self {
        Self {
            raw: RawEndpoint {
                v6: RawV6 {
                    header: RawHeader::new(AddressFamily::Ipv6),
                    port: port.to_be(),
                    flowinfo,
                    addr: ip.octets(),
                    scope_id,
                },
            },
        }
    }

    /// Parses `ip` (optionally in `[…]` brackets for IPv6) and pairs it with `port`.
    pub fn parse(ip: &str, port: u16) -> Result<Self> {
        let ip = ip
            .strip_prefix('[')
            .and_then(|ip| ip.strip_suffix(']'))
            .unwrap_or(ip);
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| Error::InvalidArgument("malformed IP address"))?;
        Ok(SocketAddr::new(ip, port).into())
    }

    fn header(&self) -> RawHeader {
        // SAFETY: every variant starts with `RawHeader` and the storage is fully initialized.
        unsafe { self.raw.header }
    }

    /// The raw native family value, without validation.
    pub fn raw_family(&self) -> i32 {
        self.header().family()
    }

    /// The address family, or `None` for an unspecified endpoint.
    pub fn address_family(&self) -> Option<AddressFamily> {
        AddressFamily::from_native(self.raw_family()).ok()
    }

    /// Sets the native family value.
    ///
    /// Anything other than `AF_INET`/`AF_INET6` is rejected and the endpoint is left unchanged.
    /// Switching to IPv4 clears `sin_zero`, which some platforms require for `bind`.
    pub fn set_address_family(&mut self, family: i32) -> Result<()> {
        let family = AddressFamily::from_native(family)?;
        let header = RawHeader::new(family);
        match family {
            AddressFamily::Ipv4 => {
                // SAFETY: the storage is fully initialized, so any variant may be read.
                let mut raw = unsafe { self.raw.v4 };
                raw.header = header;
                raw.zero = [0; 8];
                self.raw.v4 = raw;
            }
            AddressFamily::Ipv6 => self.raw.header = header,
        }
        Ok(())
    }

    /// Returns `true` if this is an IPv4 endpoint.
    pub fn is_ipv4(&self) -> bool {
        self.address_family() == Some(AddressFamily::Ipv4)
    }

    /// Returns `true` if this is an IPv6 endpoint.
    pub fn is_ipv6(&self) -> bool {
        self.address_family() == Some(AddressFamily::Ipv6)
    }

    /// Size in bytes of the native structure matching the current family.
    pub fn native_size(&self) -> Result<usize> {
        match self.address_family() {
            Some(AddressFamily::Ipv4) => Ok(size_of::<RawV4>()),
            Some(AddressFamily::Ipv6) => Ok(size_of::<RawV6>()),
            None => Err(Error::InvalidArgument(
                "endpoint address family is neither IPv4 nor IPv6",
            )),
        }
    }

    /// A zero-copy view of this endpoint as the OS's generic socket address.
    pub fn as_native_address(&self) -> *const RawSockAddr {
        core::ptr::from_ref(self).cast()
    }

    /// A writable zero-copy view for calls that fill in an address.
    ///
    /// Up to `size_of::<Endpoint>()` bytes may be written through the pointer.
    pub fn as_native_address_mut(&mut self) -> *mut RawSockAddr {
        core::ptr::from_mut(self).cast()
    }

    /// The port in host byte order.
    pub fn port(&self) -> u16 {
        // SAFETY: the port sits at the same offset in both variants and the storage is fully
        // initialized.
        u16::from_be(unsafe { self.raw.v4.port })
    }

    /// Returns the IPv4 address, if this is an IPv4 endpoint.
    pub fn as_v4(&self) -> Option<SocketAddrV4> {
        if !self.is_ipv4() {
            return None;
        }
        // SAFETY: the family tag marks the `v4` shape as the active one.
        let raw = unsafe { self.raw.v4 };
        Some(SocketAddrV4::new(
            Ipv4Addr::from(raw.addr.to_ne_bytes()),
            u16::from_be(raw.port),
        ))
    }

    /// Returns the IPv6 address, if this is an IPv6 endpoint.
    pub fn as_v6(&self) -> Option<SocketAddrV6> {
        if !self.is_ipv6() {
            return None;
        }
        // SAFETY: the family tag marks the `v6` shape as the active one.
        let raw = unsafe { self.raw.v6 };
        Some(SocketAddrV6::new(
            Ipv6Addr::from(raw.addr),
            u16::from_be(raw.port),
            raw.flowinfo,
            raw.scope_id,
        ))
    }

    /// Converts to a [`SocketAddr`], or `None` for an unspecified endpoint.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        match self.address_family()? {
            AddressFamily::Ipv4 => self.as_v4().map(SocketAddr::V4),
            AddressFamily::Ipv6 => self.as_v6().map(SocketAddr::V6),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::unspecified()
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.raw_family() == other.raw_family() && self.to_socket_addr() == other.to_socket_addr()
    }
}

impl Eq for Endpoint {}

impl From<SocketAddrV4> for Endpoint {
    fn from(address: SocketAddrV4) -> Self {
        Self::v4(*address.ip(), address.port())
    }
}

impl From<SocketAddrV6> for Endpoint {
    fn from(address: SocketAddrV6) -> Self {
        Self::v6(
            *address.ip(),
            address.port(),
            address.flowinfo(),
            address.scope_id(),
        )
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(address: SocketAddr) -> Self {
        match address {
            SocketAddr::V4(address) => address.into(),
            SocketAddr::V6(address) => address.into(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        string
            .parse::<SocketAddr>()
            .map(Self::from)
            .map_err(|_| Error::InvalidArgument("malformed socket address"))
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(address) => Display::fmt(&address, f),
            None => write!(f, "unspecified"),
        }
    }
}

impl Debug for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint")
            .field(&format_args!("{self}"))
            .finish()
    }
}

/// Serializes the `ip:port` text form of [`SocketAddr`].
///
/// IPv6 flowinfo is not part of that form and reads back as zero. A nonzero scope id is kept
/// as a `%scope` suffix. An unspecified endpoint cannot be serialized.
impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self.to_socket_addr() {
            Some(address) => address.serialize(serializer),
            None => Err(serde::ser::Error::custom(
                "cannot serialize an unspecified endpoint",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        SocketAddr::deserialize(deserializer).map(Self::from)
    }
}
