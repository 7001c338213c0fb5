//! `socklynx loadgen`: sends test datagrams at a fixed rate.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use socklynx::{Direction, Endpoint, SocketConfig};

use crate::{DEFAULT_PORT, payload};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Send test datagrams to a server.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Arguments {
    /// Address to send to.
    #[arg(default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub(crate) ip: IpAddr,

    /// Port to send to.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1025..),
        env = "SOCKLYNX_PORT"
    )]
    pub(crate) port: u16,

    /// Datagram size in bytes.
    #[arg(short, long, default_value_t = 1024, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) size: u16,

    /// Target packets per second; 0 sends as fast as possible.
    #[arg(short, long, default_value_t = 0)]
    pub(crate) rate: u32,

    /// Stop after this many datagrams.
    #[arg(long)]
    pub(crate) count: Option<u64>,
}

/// Sends datagrams until `count` is reached, returning how many were sent.
pub(crate) fn run(arguments: &Arguments) -> anyhow::Result<u64> {
    let target = Endpoint::from(SocketAddr::new(arguments.ip, arguments.port));
    let local = match arguments.ip {
        IpAddr::V4(_) => Endpoint::v4(Ipv4Addr::UNSPECIFIED, 0),
        IpAddr::V6(_) => Endpoint::v6(Ipv6Addr::UNSPECIFIED, 0, 0, 0),
    };
    let config = SocketConfig {
        direction: Direction::Outgoing,
        ..SocketConfig::new(local)
    };
    let mut socket = config.open().context("opening load generator socket")?;

    let datagram = payload::pattern(usize::from(arguments.size));
    let interval = (arguments.rate > 0).then(|| Duration::from_secs(1) / arguments.rate);
    tracing::info!(%target, size = datagram.len(), rate = arguments.rate, "sending");

    let mut sent = 0u64;
    let mut window = 0u64;
    let mut last_report = Instant::now();
    let mut next = Instant::now();

    while arguments.count.is_none_or(|count| sent < count) {
        let bytes = socket
            .send_to(&datagram, &target)
            .with_context(|| format!("sending to {target}"))?;
        anyhow::ensure!(
            bytes == datagram.len(),
            "short send: {bytes} of {} bytes",
            datagram.len()
        );
        sent += 1;
        window += 1;

        if last_report.elapsed() >= REPORT_INTERVAL {
            tracing::info!(packets = window, "sent {window} packets");
            window = 0;
            last_report = Instant::now();
        }

        if let Some(interval) = interval {
            next += interval;
            if let Some(wait) = next.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }
    }

    socket.close().context("closing load generator socket")?;
    tracing::info!(sent, "load generator finished");
    Ok(sent)
}
