use std::net::SocketAddr;

use clap::Parser;
use log::LevelFilter;
use net::wire_protocol::node::Chain;
use simple_logger::SimpleLogger;
use tokio::io;
use tokio::time::{timeout, Duration};

use crate::node::Node;
use net::config::ClientConfig;

mod node;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Remote IP socket address. E.g. 127.0.0.1:18445 for a local regression testnet node
    #[arg(short, long)]
    remote: SocketAddr,

    /// Upper bound on a single message payload, in mebibytes.
    #[arg(long, default_value_t = 4)]
    max_payload_mb: u32,
}

fn init_logging() {
    SimpleLogger::new()
        .with_colors(true)
        .with_level(LevelFilter::Debug)
        .with_local_timestamps()
        .init()
        .unwrap();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = ClientConfig::new(Chain::BitcoinTestnet3);
    config.max_payload_bytes = args.max_payload_mb * 1024 * 1024;
    let mut node = Node::new(config);

    let handshake_timeout = Duration::from_secs(5);
    match timeout(handshake_timeout, node.connect_with(args.remote)).await {
        Ok(result) => match result {
            Ok(peer_version) => {
                log::info!("connection + handshake to node @ {} successfully established", args.remote);
                log::debug!("peer version details: {:?}", peer_version);
                node.close_connection(args.remote);
                log::debug!("connection intentionally closed, because this is the end of the showcase");
            }
            Err(err) => {
                log::warn!("error while communicating with {}: {}", args.remote, err);
            }
        },
        Err(_) => {
            log::warn!("handshake timeout");
        }
    }

    Ok(())
}
