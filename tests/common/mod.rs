#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use psi_reassembler::constants::{TS_PACKET_SIZE, TS_SYNC_BYTE};
use psi_reassembler::psi::crc32_mpeg2;
use psi_reassembler::{ConsumerHandle, SectionConsumer};

/// Payload-only packet, padded with 0xFF stuffing.
pub fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= TS_PACKET_SIZE - 4);
    let mut pkt = vec![0xFFu8; TS_PACKET_SIZE];
    pkt[0] = TS_SYNC_BYTE;
    pkt[1] = (if pusi { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
    pkt[2] = pid as u8;
    pkt[3] = 0x10 | (cc & 0x0F);
    pkt[4..4 + payload.len()].copy_from_slice(payload);
    pkt
}

/// Adaptation field of `af_len` bytes followed by `payload` (afc `11`).
pub fn ts_packet_with_adaptation(
    pid: u16,
    pusi: bool,
    cc: u8,
    discontinuity: bool,
    af_len: usize,
    payload: &[u8],
) -> Vec<u8> {
    assert!(af_len >= 1 && 5 + af_len + payload.len() <= TS_PACKET_SIZE);
    let mut pkt = vec![0xFFu8; TS_PACKET_SIZE];
    pkt[0] = TS_SYNC_BYTE;
    pkt[1] = (if pusi { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
    pkt[2] = pid as u8;
    pkt[3] = 0x30 | (cc & 0x0F);
    pkt[4] = af_len as u8;
    pkt[5] = if discontinuity { 0x80 } else { 0x00 };
    let start = 5 + af_len;
    pkt[start..start + payload.len()].copy_from_slice(payload);
    pkt
}

/// Adaptation-field-only packet (no payload).
pub fn adaptation_only(pid: u16, cc: u8) -> Vec<u8> {
    let mut pkt = vec![0xFFu8; TS_PACKET_SIZE];
    pkt[0] = TS_SYNC_BYTE;
    pkt[1] = (pid >> 8) as u8 & 0x1F;
    pkt[2] = pid as u8;
    pkt[3] = 0x20 | (cc & 0x0F);
    pkt[4] = 183;
    pkt[5] = 0x00;
    pkt
}

/// Syntax section with a valid CRC and `body_len` patterned bytes after
/// the extension header.
pub fn long_section(table_id: u8, body_len: usize) -> Vec<u8> {
    let section_length = 5 + body_len + 4;
    let mut s = vec![
        table_id,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
        0x00,
        0x01,
        0xC1,
        0x00,
        0x00,
    ];
    s.extend((0..body_len).map(|i| (i % 251) as u8));
    let crc = crc32_mpeg2(&s);
    s.extend_from_slice(&crc.to_be_bytes());
    s
}

/// Splits one section over as many packets as needed, pointer field 0.
pub fn packetize(pid: u16, section: &[u8], first_cc: u8) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let mut first = vec![0x00];
    let head = section.len().min(TS_PACKET_SIZE - 5);
    first.extend_from_slice(&section[..head]);
    packets.push(ts_packet(pid, true, first_cc, &first));

    let mut cc = first_cc;
    for chunk in section[head..].chunks(TS_PACKET_SIZE - 4) {
        cc = (cc + 1) & 0x0F;
        packets.push(ts_packet(pid, false, cc, chunk));
    }
    packets
}

/// Consumer that keeps every section it is handed.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<(u8, Vec<u8>)>>,
}

impl Recorder {
    pub fn handle() -> (Arc<Recorder>, ConsumerHandle) {
        let recorder = Arc::new(Recorder::default());
        let handle: ConsumerHandle = recorder.clone();
        (recorder, handle)
    }

    pub fn sections(&self) -> Vec<(u8, Vec<u8>)> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

impl SectionConsumer for Recorder {
    fn on_section(&self, table_id: u8, section: &[u8]) {
        self.seen.lock().push((table_id, section.to_vec()));
    }
}
