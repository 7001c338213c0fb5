//! SockLynx sample programs: a UDP test server and a load generator.

#![forbid(unsafe_code)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod loadgen;
mod payload;
mod server;

/// Port used by both programs unless told otherwise.
pub(crate) const DEFAULT_PORT: u16 = 51234;

/// SockLynx UDP test tools.
#[derive(Parser, Debug)]
#[command(disable_help_subcommand = true, version, about)]
struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Receive test datagrams and report how many arrive.
    Server(server::Arguments),
    /// Send test datagrams to a server.
    Loadgen(loadgen::Arguments),
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Command::Server(arguments) => {
                server::Server::bind(arguments)?.run()?;
            }
            Command::Loadgen(arguments) => {
                loadgen::run(&arguments)?;
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let arguments = Arguments::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .with_env_var("SOCKLYNX_LOG")
                    .from_env()?,
            )
            .with_writer(std::io::stderr)
            .compact()
            .finish(),
    )?;

    socklynx::setup()?;
    let result = arguments.command.run();
    finish(result, socklynx::cleanup)
}

/// Runs `cleanup` and returns the subcommand's `result`; a cleanup failure is only logged.
fn finish(
    result: anyhow::Result<()>,
    cleanup: impl FnOnce() -> socklynx::Result<()>,
) -> anyhow::Result<()> {
    if let Err(error) = cleanup() {
        tracing::warn!(%error, "failed to stop the network subsystem");
    }
    result
}
