use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::ReassemblerConfig;

/// Where transport stream packets come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// IPv4 UDP, unicast or multicast group
    Udp(SocketAddr),
    /// Raw 188-byte aligned TS file
    File(PathBuf),
}

/// Configuration options for the runner
#[derive(Debug, Clone)]
pub struct Options {
    pub input: InputSource,
    pub refresh_secs: u64,
    pub config: ReassemblerConfig,
    /// Table ids whose sections are logged as they complete
    pub watch_tables: Vec<u8>,
}
