//! A minimal cross-platform UDP/TCP socket layer.
//!
//! One call surface over BSD sockets and Winsock: an [`Endpoint`] that overlays the native
//! `sockaddr_in`/`sockaddr_in6` layout, a [`Socket`] whose lifecycle is an explicit state machine,
//! and a process-wide [`setup`]/[`cleanup`] pair for the OS networking subsystem.
//!
//! All operations are synchronous. Non-blocking mode turns a would-block condition into an
//! [`Error`] for which [`Error::is_would_block`] returns `true`.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod config;
mod endpoint;
mod error;
mod socket;
mod sys;
mod system;

pub use config::SocketConfig;
pub use endpoint::{AddressFamily, Endpoint};
pub use error::{Error, OsError, Result};
pub use socket::{Direction, Protocol, Socket, SocketFlags, SocketState, SocketType};
pub use sys::{RawHandle, RawSockAddr};
pub use system::{SystemState, cleanup, setup, system_state};
