//! Runtime loop: feeds UDP datagrams or a TS file through the reassembler
//! on a single demux task and prints periodic JSON snapshots.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::constants::{TABLE_ID_AIT, TS_PACKET_SIZE};
use crate::inspector::{InputSource, Options};
use crate::network::create_udp_socket;
use crate::packet::peek_pid;
use crate::psi::{AitConsumer, LongHeader};
use crate::reassembler::PsiReassembler;
use crate::registry::{ConsumerHandle, SectionConsumer};
use crate::report::Reporter;

/// Logs every completed section of a watched table.
struct SectionLogger;

impl SectionConsumer for SectionLogger {
    fn on_section(&self, table_id: u8, section: &[u8]) {
        match LongHeader::parse(section) {
            Some(h) => info!(
                table_id,
                len = section.len(),
                table_id_extension = h.table_id_extension,
                version = h.version,
                section_number = h.section_number,
                last_section = h.last_section,
                "section"
            ),
            None => info!(table_id, len = section.len(), "section"),
        }
    }
}

/// Reassembler plus the consumers the runtime keeps alive.
struct Session {
    reassembler: PsiReassembler,
    ait: Arc<AitConsumer>,
    _consumers: Vec<ConsumerHandle>,
}

impl Session {
    fn new(opts: &Options) -> anyhow::Result<Self> {
        opts.config.validate()?;
        let reassembler = PsiReassembler::with_config(opts.config.clone());

        let ait = Arc::new(AitConsumer::new());
        let ait_handle: ConsumerHandle = ait.clone();
        reassembler.register_consumer(TABLE_ID_AIT, &ait_handle);

        let mut consumers = vec![ait_handle];
        for &table_id in &opts.watch_tables {
            let logger: ConsumerHandle = Arc::new(SectionLogger);
            reassembler.register_consumer(table_id, &logger);
            consumers.push(logger);
        }

        Ok(Self {
            reassembler,
            ait,
            _consumers: consumers,
        })
    }

    /// Routes each 188-byte packet in `data` by its header PID.
    fn feed(&self, data: &[u8]) -> usize {
        let chunks = data.chunks_exact(TS_PACKET_SIZE);
        if !chunks.remainder().is_empty() {
            trace!(extra = chunks.remainder().len(), "unaligned datagram tail ignored");
        }
        let mut fed = 0;
        for chunk in chunks {
            if let Some(pid) = peek_pid(chunk) {
                self.reassembler.process_packet(pid, chunk);
                fed += 1;
            }
        }
        fed
    }

    /// Evicts stale buffers, then renders the JSON report.
    fn snapshot(&self) -> String {
        if let Some(max_age) = self.reassembler.config().stale_after() {
            let evicted = self.reassembler.evict_stale(max_age);
            if evicted > 0 {
                debug!(evicted, "stale PID buffers evicted");
            }
        }
        let latest = self.ait.latest();
        Reporter::generate_json_report(
            &self.reassembler.get_stats(),
            &self.reassembler.counters(),
            latest.as_ref(),
        )
    }
}

pub async fn run(opts: Options) -> anyhow::Result<()> {
    let session = Session::new(&opts)?;
    let refresh = Duration::from_secs(opts.refresh_secs.max(1));

    match &opts.input {
        InputSource::Udp(addr) => run_udp(&session, *addr, refresh).await,
        InputSource::File(path) => run_file(&session, path, refresh).await,
    }
}

async fn run_udp(session: &Session, addr: SocketAddr, refresh: Duration) -> anyhow::Result<()> {
    let socket = create_udp_socket(addr)?;
    let sock = UdpSocket::from_std(socket.into())?;

    let mut buf = [0u8; 2048];
    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = sock.recv(&mut buf) => {
                let n = res.context("receiving datagram")?;
                session.feed(&buf[..n]);
            }
            _ = ticker.tick() => println!("{}", session.snapshot()),
            _ = &mut shutdown => {
                info!("interrupted, stopping");
                break;
            }
        }
    }

    println!("{}", session.snapshot());
    Ok(())
}

async fn run_file(session: &Session, path: &Path, refresh: Duration) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut packet = [0u8; TS_PACKET_SIZE];
    let mut packets = 0u64;
    let mut last_print = Instant::now();

    loop {
        match reader.read_exact(&mut packet).await {
            Ok(_) => packets += session.feed(&packet) as u64,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        }
        if last_print.elapsed() >= refresh {
            println!("{}", session.snapshot());
            last_print = Instant::now();
        }
    }

    info!(packets, file = %path.display(), "end of input");
    println!("{}", session.snapshot());
    Ok(())
}
