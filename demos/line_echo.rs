//! Serves every connection line by line, writing each line back reversed.
//!
//! ```text
//! cargo run --example line_echo -- --port 7000
//! nc localhost 7000
//! ```
use clap::Parser;
use linemill::framing::SentinelParser;
use linemill::net::{
    config::ListenerConfig, BufferedStream, Listener, Outbound, PeerAddr, PeerStream,
};
use linemill::{Handler, Reactor};
use log::{error, info};
use std::{
    net::{Ipv4Addr, Ipv6Addr},
    path::PathBuf,
    str::FromStr,
};

#[derive(Parser)]
#[command(name = "Line Echo")]
#[command(version = "0.1.0")]
#[command(about = "Echoes every received line back reversed", long_about = None)]
struct Cli {
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,
    /// Also listen on a unix socket at this path.
    #[arg(long)]
    unix: Option<PathBuf>,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

fn reverse_line(line: &[u8], out: &mut Outbound) {
    let mut reply: Vec<u8> = line.iter().rev().copied().collect();
    reply.push(b'\n');
    out.write(&reply);
}

fn serve(stream: PeerStream, peer: PeerAddr) -> Option<Box<dyn Handler>> {
    info!("connection from {peer}");
    let parser = SentinelParser::new(reverse_line);
    Some(Box::new(BufferedStream::new(stream, parser)) as Box<dyn Handler>)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    env_logger::Builder::new().filter(None, log_level).init();

    let mut reactor = Reactor::with_defaults()?;
    let config = ListenerConfig::default();
    let mut listening = 0usize;

    match Listener::ipv4(cli.port, Ipv4Addr::UNSPECIFIED, config, serve) {
        Ok(listener) => {
            reactor.add(listener).map_err(linemill::Error::from)?;
            listening += 1;
        }
        Err(e) => error!("ipv4 listener on port {}: {e}", cli.port),
    }

    match Listener::ipv6(cli.port, Ipv6Addr::UNSPECIFIED, config, serve) {
        Ok(listener) => {
            reactor.add(listener).map_err(linemill::Error::from)?;
            listening += 1;
        }
        Err(e) => error!("ipv6 listener on port {}: {e}", cli.port),
    }

    if let Some(path) = &cli.unix {
        match Listener::unix(path, config, serve) {
            Ok(listener) => {
                reactor.add(listener).map_err(linemill::Error::from)?;
                listening += 1;
            }
            Err(e) => error!("unix listener at {}: {e}", path.display()),
        }
    }

    if listening == 0 {
        anyhow::bail!("no listener could be bound");
    }
    info!("serving on port {} ({listening} listeners)", cli.port);

    while reactor.is_active() {
        reactor.poll(None);
    }

    match reactor.fault() {
        Some(fault) => Err(anyhow::anyhow!("reactor stopped: {fault}")),
        None => Ok(()),
    }
}
