//! PSI section reassembler: packets in, complete sections out to consumers

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::ReassemblerConfig;
use crate::continuity::{ContinuityStatus, ContinuityTracker};
use crate::error::DropReason;
use crate::packet::TsPacket;
use crate::psi::{PidBuffer, Section};
use crate::registry::{ConsumerHandle, ConsumerRegistry, dispatch};
use crate::stats::{DropCounters, ReassemblyStats};

/// Per-PID state. Only ever touched by the thread feeding packets, plus
/// `clear_buffers`/`evict_stale`/`get_stats` under the same lock.
#[derive(Default)]
struct DemuxState {
    buffers: HashMap<u16, PidBuffer>,
    continuity: ContinuityTracker,
    counters: DropCounters,
}

impl DemuxState {
    fn reject(&mut self, pid: u16, reason: DropReason) {
        self.counters.record(&reason);
        if reason.is_continuity_break() {
            debug!(pid, %reason, "continuity break");
        } else {
            trace!(pid, %reason, "dropped");
        }
    }

    /// Forgets the partial section on `pid`; continuity expectation is kept.
    fn discard(&mut self, pid: u16) {
        if let Some(buffer) = self.buffers.remove(&pid) {
            if !buffer.is_empty() {
                trace!(pid, bytes = buffer.len(), "partial section discarded");
            }
        }
    }

    fn ingest(&mut self, pid: u16, chunk: &[u8], config: &ReassemblerConfig) -> Vec<Section> {
        let packet = match TsPacket::parse(chunk) {
            Ok(packet) => packet,
            Err(reason) => {
                self.reject(pid, reason);
                return Vec::new();
            }
        };
        let header = packet.header;

        if config.strict_pid_check && header.pid != pid {
            self.reject(pid, DropReason::PidMismatch { routed: pid, header: header.pid });
            return Vec::new();
        }

        if header.transport_error_indicator {
            // the counter itself may be corrupt: restart tracking from scratch
            self.discard(pid);
            self.continuity.forget(pid);
            self.reject(pid, DropReason::TransportError);
            return Vec::new();
        }

        let status = self.continuity.check(
            pid,
            header.continuity_counter,
            header.has_payload(),
            packet.discontinuity_indicator,
        );
        match status {
            ContinuityStatus::Duplicate => {
                self.discard(pid);
                self.reject(pid, DropReason::DuplicatePacket(header.continuity_counter));
                return Vec::new();
            }
            ContinuityStatus::Discontinuity { expected, actual } => {
                self.discard(pid);
                self.reject(pid, DropReason::Discontinuity { expected, actual });
            }
            ContinuityStatus::Signalled => {
                trace!(pid, "signalled discontinuity");
                self.discard(pid);
            }
            ContinuityStatus::Initial | ContinuityStatus::Ok | ContinuityStatus::NoPayload => {}
        }

        let Some(payload) = packet.payload else {
            return Vec::new();
        };

        if header.scrambling_control != 0 {
            self.discard(pid);
            self.reject(pid, DropReason::Scrambled(header.scrambling_control));
            return Vec::new();
        }

        let mut sections = Vec::new();
        if header.payload_unit_start {
            self.start_unit(pid, payload, config, &mut sections);
        } else {
            self.continue_unit(pid, payload, config, &mut sections);
        }
        sections
    }

    /// PUSI=1: the pointer field splits the tail of the running section
    /// from the start of a new one.
    fn start_unit(
        &mut self,
        pid: u16,
        payload: &[u8],
        config: &ReassemblerConfig,
        out: &mut Vec<Section>,
    ) {
        let pointer = payload[0] as usize;
        let start = 1 + pointer;
        if start > payload.len() {
            self.discard(pid);
            self.reject(pid, DropReason::PointerOutOfRange(pointer));
            return;
        }

        if pointer > 0 {
            if let Some(buffer) = self.buffers.get_mut(&pid) {
                if !buffer.is_empty() {
                    buffer.push(&payload[1..start]);
                    self.drain(pid, config, out);
                }
            }
        }

        let buffer = self.buffers.entry(pid).or_default();
        if !buffer.is_empty() {
            trace!(pid, bytes = buffer.len(), "unfinished section replaced");
            buffer.clear();
        }
        buffer.push(&payload[start..]);
        self.drain(pid, config, out);
    }

    /// PUSI=0: the whole payload continues the running section.
    fn continue_unit(
        &mut self,
        pid: u16,
        payload: &[u8],
        config: &ReassemblerConfig,
        out: &mut Vec<Section>,
    ) {
        match self.buffers.get_mut(&pid) {
            Some(buffer) if !buffer.is_empty() => {
                buffer.push(payload);
                self.drain(pid, config, out);
            }
            _ => self.reject(pid, DropReason::NotSynchronized),
        }
    }

    fn drain(&mut self, pid: u16, config: &ReassemblerConfig, out: &mut Vec<Section>) {
        let Some(buffer) = self.buffers.get_mut(&pid) else {
            return;
        };
        let extraction = buffer.extract(pid, config);

        self.counters.sections_emitted += extraction.sections.len() as u64;
        for section in &extraction.sections {
            trace!(
                pid,
                table_id = section.table_id,
                len = section.data.len(),
                "section complete"
            );
        }
        out.extend(extraction.sections);

        if extraction.stuffing {
            trace!(pid, "stuffing ends payload");
        }
        // extract has already emptied the buffer; the PID stays active
        if let Some(reason) = extraction.rejected {
            self.reject(pid, reason);
        }
    }
}

/// Reassembles PSI sections from transport packets and fans them out to
/// consumers registered per table id.
///
/// Packets are expected from one demux thread. Registration, stats and
/// `clear_buffers` may be called from any thread: the consumer registry
/// and the per-PID state sit behind separate locks, and consumers are
/// invoked with neither lock held.
pub struct PsiReassembler {
    config: ReassemblerConfig,
    demux: Mutex<DemuxState>,
    registry: ConsumerRegistry,
}

impl PsiReassembler {
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            config,
            demux: Mutex::new(DemuxState::default()),
            registry: ConsumerRegistry::new(),
        }
    }

    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }

    /// Feeds one 188-byte packet routed to `pid`. Malformed input is
    /// absorbed; complete sections are dispatched before returning.
    pub fn process_packet(&self, pid: u16, packet: &[u8]) {
        let deliveries: Vec<(Section, Vec<ConsumerHandle>)> = {
            let mut demux = self.demux.lock();
            demux.counters.packets_processed += 1;
            let sections = demux.ingest(pid, packet, &self.config);

            let mut deliveries = Vec::with_capacity(sections.len());
            for section in sections {
                let consumers = self.registry.consumers_for(section.table_id);
                if consumers.is_empty() {
                    demux.counters.sections_unclaimed += 1;
                    continue;
                }
                deliveries.push((section, consumers));
            }
            deliveries
        };

        for (section, consumers) in &deliveries {
            dispatch(section, consumers);
        }
    }

    pub fn register_consumer(&self, table_id: u8, consumer: &ConsumerHandle) {
        if self.registry.register(table_id, consumer) {
            debug!(table_id, "consumer registered");
        }
    }

    pub fn unregister_consumer(&self, table_id: u8, consumer: &ConsumerHandle) {
        if self.registry.unregister(table_id, consumer) {
            debug!(table_id, "consumer unregistered");
        }
    }

    /// Drops every partial section and all continuity expectations.
    /// Call on channel / transport stream change. Registrations stay.
    pub fn clear_buffers(&self) {
        let mut demux = self.demux.lock();
        demux.buffers.clear();
        demux.continuity.clear();
        debug!("cleared all section buffers");
    }

    /// Removes per-PID state untouched for longer than `max_age`.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let mut demux = self.demux.lock();
        let stale: Vec<u16> = demux
            .buffers
            .iter()
            .filter(|(_, buffer)| buffer.last_touched().elapsed() > max_age)
            .map(|(&pid, _)| pid)
            .collect();
        for pid in &stale {
            demux.buffers.remove(pid);
            demux.continuity.forget(*pid);
        }
        if !stale.is_empty() {
            debug!(evicted = stale.len(), "stale section buffers evicted");
        }
        stale.len()
    }

    pub fn get_stats(&self) -> ReassemblyStats {
        let demux = self.demux.lock();
        ReassemblyStats {
            total_buffers: demux.buffers.len(),
            total_consumers: self.registry.total_consumers(),
            active_pids: demux.buffers.keys().copied().collect(),
        }
    }

    pub fn counters(&self) -> DropCounters {
        self.demux.lock().counters
    }

    pub fn reset_counters(&self) {
        self.demux.lock().counters = DropCounters::default();
    }
}

impl Default for PsiReassembler {
    fn default() -> Self {
        Self::new()
    }
}
