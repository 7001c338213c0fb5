//! Declarative socket settings.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::endpoint::Endpoint;
use crate::socket::{Direction, Protocol, Socket, SocketType};

/// Everything needed to bring a [`Socket`] to [`SocketState::Bound`](crate::SocketState::Bound).
///
/// ```
/// let config: socklynx::SocketConfig =
///     serde_json::from_str(r#"{ "endpoint": "127.0.0.1:51234", "nonblocking": true }"#).unwrap();
/// assert!(config.nonblocking);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct SocketConfig {
    /// The local address to bind.
    pub endpoint: Endpoint,
    /// Wire type.
    #[serde(default)]
    pub socket_type: SocketType,
    /// Wire protocol; must match [`SocketConfig::socket_type`].
    #[serde(default)]
    pub protocol: Protocol,
    /// Direction tag.
    #[serde(default)]
    pub direction: Direction,
    /// Put the handle into non-blocking mode after binding.
    #[serde(default)]
    pub nonblocking: bool,
    /// Accept IPv4-mapped traffic on an IPv6 socket.
    #[serde(default)]
    pub dual_stack: bool,
}

impl SocketConfig {
    /// A blocking UDP configuration for `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            socket_type: SocketType::default(),
            protocol: Protocol::default(),
            direction: Direction::default(),
            nonblocking: false,
            dual_stack: false,
        }
    }

    /// Creates, binds and configures a socket.
    ///
    /// On failure the partially set up socket is dropped, releasing any handle.
    pub fn open(&self) -> Result<Socket> {
        let mut socket = Socket::new(self.endpoint).with_direction(self.direction);
        socket.set_dual_stack(self.dual_stack)?;
        socket.create(self.socket_type, self.protocol)?;
        socket.bind()?;
        socket.set_nonblocking_enabled(self.nonblocking)?;
        tracing::debug!(endpoint = %self.endpoint, nonblocking = self.nonblocking, "socket opened from config");
        Ok(socket)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use super::SocketConfig;
    use crate::{Direction, Endpoint, Error, Protocol, SocketFlags, SocketState, SocketType};

    #[test]
    fn defaults_apply_to_omitted_fields() {
        let config: SocketConfig = serde_json::from_str(r#"{ "endpoint": "[::1]:51350" }"#).unwrap();
        assert_eq!(
            config,
            SocketConfig::new("[::1]:51350".parse().unwrap())
        );
    }

    #[test]
    fn every_field_is_read() {
        let config: SocketConfig = serde_json::from_str(
            r#"{
                "endpoint": "127.0.0.1:51351",
                "socket_type": "stream",
                "protocol": "tcp",
                "direction": "incoming",
                "nonblocking": true,
                "dual_stack": true
            }"#,
        )
        .unwrap();
        assert_eq!(
            config,
            SocketConfig {
                endpoint: Endpoint::v4(Ipv4Addr::LOCALHOST, 51351),
                socket_type: SocketType::Stream,
                protocol: Protocol::Tcp,
                direction: Direction::Incoming,
                nonblocking: true,
                dual_stack: true,
            }
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<SocketConfig>(
            r#"{ "endpoint": "127.0.0.1:51352", "reuse_address": true }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn serializes_back_to_text() {
        let config = SocketConfig::new(Endpoint::v4(Ipv4Addr::LOCALHOST, 51353));
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({
                "endpoint": "127.0.0.1:51353",
                "socket_type": "datagram",
                "protocol": "udp",
                "direction": "unspecified",
                "nonblocking": false,
                "dual_stack": false,
            })
        );
    }

    #[test]
    fn open_yields_a_bound_socket() {
        crate::setup().unwrap();
        let mut config = SocketConfig::new(Endpoint::v4(Ipv4Addr::LOCALHOST, 0));
        config.nonblocking = true;
        config.direction = Direction::Outgoing;

        let socket = config.open().unwrap();
        assert_eq!(socket.state(), SocketState::Bound);
        assert_eq!(socket.direction(), Direction::Outgoing);
        assert!(socket.flags().contains(SocketFlags::NONBLOCKING));
    }

    #[test]
    fn open_rejects_incoherent_pairs() {
        let mut config = SocketConfig::new(Endpoint::v4(Ipv4Addr::LOCALHOST, 0));
        config.protocol = Protocol::Tcp;
        assert!(matches!(config.open(), Err(Error::InvalidArgument(_))));
    }
}
