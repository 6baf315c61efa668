use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use psi_reassembler::ReassemblerConfig;
use psi_reassembler::constants::DEFAULT_REFRESH_SECS;
use psi_reassembler::inspector::{InputSource, Options, run};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(about = "Reassembles PSI sections from an MPEG-TS feed")]
struct Opt {
    /// UDP socket to bind + listen (IPv4, unicast or multicast)
    #[clap(long, default_value = "239.1.1.2:1234")]
    addr: SocketAddr,

    /// Read a raw TS file instead of the network
    #[clap(long, conflicts_with = "addr")]
    file: Option<PathBuf>,

    /// Refresh interval for the JSON snapshot
    #[clap(long, default_value_t = DEFAULT_REFRESH_SECS)]
    refresh: u64,

    /// JSON file with reassembler settings
    #[clap(long)]
    config: Option<PathBuf>,

    /// Log every section of this table id (hex 0x.. or decimal), repeatable
    #[clap(long = "table", value_parser = parse_table_id)]
    tables: Vec<u8>,

    /// Skip CRC-32 validation of syntax sections
    #[clap(long, default_value_t = false)]
    no_crc: bool,

    /// Default log filter when RUST_LOG is unset
    #[clap(long, default_value = "info")]
    log_level: String,
}

fn parse_table_id(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid table id {s:?}: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&opt.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &opt.config {
        Some(path) => ReassemblerConfig::from_json_file(path)?,
        None => ReassemblerConfig::default(),
    };
    if opt.no_crc {
        config.validate_crc = false;
    }

    let input = match opt.file {
        Some(path) => InputSource::File(path),
        None => InputSource::Udp(opt.addr),
    };

    run(Options {
        input,
        refresh_secs: opt.refresh,
        config,
        watch_tables: opt.tables,
    })
    .await
}
