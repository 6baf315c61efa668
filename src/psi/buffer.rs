//! Per-PID section buffer and the section extraction loop

use std::time::Instant;

use bytes::BytesMut;

use crate::config::ReassemblerConfig;
use crate::constants::TABLE_ID_STUFFING;
use crate::error::DropReason;
use crate::psi::section::{Section, SectionHeader, verify_crc};

/// Result of one pass of [`PidBuffer::extract`].
#[derive(Debug, Default)]
pub struct Extraction {
    /// Complete, validated sections in completion order
    pub sections: Vec<Section>,
    /// Set when the pass stopped on a malformed section; the buffer is empty
    pub rejected: Option<DropReason>,
    /// Stuffing terminated the pass
    pub stuffing: bool,
}

/// Bytes of the section currently being reassembled on one PID.
#[derive(Debug)]
pub struct PidBuffer {
    data: BytesMut,
    last_touched: Instant,
}

impl PidBuffer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            last_touched: Instant::now(),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.last_touched = Instant::now();
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.last_touched = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Empty means no section is in progress on this PID.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    /// Slices every complete section off the front of the buffer.
    ///
    /// Leftover bytes are the head of the next section and stay buffered.
    /// A malformed header or a CRC mismatch empties the buffer.
    pub fn extract(&mut self, pid: u16, config: &ReassemblerConfig) -> Extraction {
        let mut out = Extraction::default();

        loop {
            if self.data.first() == Some(&TABLE_ID_STUFFING) {
                out.stuffing = true;
                self.data.clear();
                break;
            }

            let Some(header) = SectionHeader::parse(&self.data) else {
                break; // need more bytes for the header
            };

            if let Err(reason) = header.validate(config.max_section_length) {
                out.rejected = Some(reason);
                self.data.clear();
                break;
            }

            let total = header.total_size();
            if self.data.len() < total {
                break; // section continues in later packets
            }

            let raw = self.data.split_to(total).freeze();
            if config.validate_crc && header.has_crc() && !verify_crc(&raw) {
                out.rejected = Some(DropReason::CrcMismatch(header.table_id));
                self.data.clear();
                break;
            }

            out.sections.push(Section {
                pid,
                table_id: header.table_id,
                data: raw,
            });
        }

        out
    }
}

impl Default for PidBuffer {
    fn default() -> Self {
        Self::new()
    }
}
