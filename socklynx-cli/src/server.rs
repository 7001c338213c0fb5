//! `socklynx server`: receives and optionally echoes test datagrams.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use anyhow::Context;
use socklynx::{Direction, Endpoint, Socket, SocketConfig};

use crate::{DEFAULT_PORT, payload};

/// Receive test datagrams and report how many arrive.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Arguments {
    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), env = "SOCKLYNX_BIND")]
    pub(crate) bind: IpAddr,

    /// Port to listen on.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1025..),
        env = "SOCKLYNX_PORT"
    )]
    pub(crate) port: u16,

    /// Largest datagram to receive; longer ones are truncated.
    #[arg(short, long, default_value_t = 1408, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) size: u16,

    /// Seconds between progress reports.
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) rate: u64,

    /// Send every datagram back to its sender.
    #[arg(long)]
    pub(crate) echo: bool,

    /// Stop after this many datagrams.
    #[arg(long)]
    pub(crate) count: Option<u64>,
}

/// Totals of one server run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Report {
    pub(crate) received: u64,
    pub(crate) corrupt: u64,
    pub(crate) echoed: u64,
}

#[derive(Debug)]
pub(crate) struct Server {
    socket: Socket,
    arguments: Arguments,
}

impl Server {
    /// Opens the listening socket.
    pub(crate) fn bind(arguments: Arguments) -> anyhow::Result<Self> {
        let endpoint = Endpoint::from(SocketAddr::new(arguments.bind, arguments.port));
        let config = SocketConfig {
            direction: Direction::Incoming,
            ..SocketConfig::new(endpoint)
        };
        let socket = config
            .open()
            .with_context(|| format!("opening server socket on {endpoint}"))?;
        tracing::info!(%endpoint, echo = arguments.echo, "listening");
        Ok(Self { socket, arguments })
    }

    pub(crate) fn run(mut self) -> anyhow::Result<Report> {
        let mut buffer = vec![0; usize::from(self.arguments.size)];
        let interval = Duration::from_secs(self.arguments.rate);
        let mut report = Report::default();
        let mut window = 0u64;
        let mut last_report = Instant::now();

        while self
            .arguments
            .count
            .is_none_or(|count| report.received < count)
        {
            let (received, peer) = self
                .socket
                .recv_from(&mut buffer)
                .context("receiving datagram")?;
            report.received += 1;
            window += 1;

            let datagram = &buffer[..received.min(buffer.len())];
            if !payload::verify(datagram) {
                report.corrupt += 1;
                tracing::warn!(bytes = received, %peer, "payload does not match the test pattern");
            }

            if self.arguments.echo {
                self.socket
                    .send_to(datagram, &peer)
                    .with_context(|| format!("echoing to {peer}"))?;
                report.echoed += 1;
            }

            if last_report.elapsed() >= interval {
                tracing::info!(packets = window, "received {window} packets");
                window = 0;
                last_report = Instant::now();
            }
        }

        self.socket.close().context("closing server socket")?;
        tracing::info!(?report, "server finished");
        Ok(report)
    }
}
