// psi/section.rs
//! Generic PSI / SI section header and CRC-32 (MPEG-2) validation.

use bytes::Bytes;
use crc::{CRC_32_MPEG_2, Crc};

use crate::constants::*;
use crate::error::DropReason;

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// A complete section as handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub pid: u16,
    pub table_id: u8,
    /// table_id through CRC, pointer field excluded
    pub data: Bytes,
}

/// The three bytes every section starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub private_indicator: bool,
    pub section_length: u16,
}

impl SectionHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SECTION_HEADER_SIZE {
            return None;
        }
        Some(Self {
            table_id: data[0],
            section_syntax_indicator: data[1] & 0x80 != 0,
            private_indicator: data[1] & 0x40 != 0,
            section_length: (((data[1] & 0x0F) as u16) << 8) | data[2] as u16,
        })
    }

    /// Header plus the `section_length` bytes that follow it.
    pub fn total_size(&self) -> usize {
        SECTION_HEADER_SIZE + self.section_length as usize
    }

    /// Syntax sections end with a CRC-32.
    pub fn has_crc(&self) -> bool {
        self.section_syntax_indicator
    }

    pub fn validate(&self, max_section_length: u16) -> Result<(), DropReason> {
        if self.section_length == 0
            || self.section_length > max_section_length
            || (self.has_crc() && self.section_length < MIN_LONG_SECTION_LENGTH)
        {
            return Err(DropReason::InvalidSectionLength(self.section_length));
        }
        if !self.section_syntax_indicator && self.table_id <= TABLE_ID_TSDT {
            return Err(DropReason::MissingSectionSyntax(self.table_id));
        }
        Ok(())
    }
}

/// Extension header of a syntax section (bytes 3..8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongHeader {
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section: u8,
}

impl LongHeader {
    pub fn parse(section: &[u8]) -> Option<Self> {
        let header = SectionHeader::parse(section)?;
        if !header.section_syntax_indicator || section.len() < LONG_HEADER_SIZE {
            return None;
        }
        Some(Self {
            table_id_extension: u16::from_be_bytes([section[3], section[4]]),
            version: (section[5] & 0x3E) >> 1,
            current_next: section[5] & 0x01 != 0,
            section_number: section[6],
            last_section: section[7],
        })
    }
}

pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    CRC_MPEG.checksum(data)
}

/// Compares the trailing 4 bytes against the CRC of everything before them.
pub fn verify_crc(section: &[u8]) -> bool {
    if section.len() < SECTION_HEADER_SIZE + CRC_SIZE {
        return false;
    }
    let (body, trailer) = section.split_at(section.len() - CRC_SIZE);
    let crc_pkt = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    crc32_mpeg2(body) == crc_pkt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_section(table_id: u8, body: &[u8]) -> Vec<u8> {
        let section_length = 5 + body.len() + CRC_SIZE;
        let mut s = vec![
            table_id,
            0xB0 | ((section_length >> 8) as u8 & 0x0F),
            section_length as u8,
            0x12,
            0x34,
            0xC1 | (3 << 1),
            0x00,
            0x01,
        ];
        s.extend_from_slice(body);
        let crc = crc32_mpeg2(&s);
        s.extend_from_slice(&crc.to_be_bytes());
        s
    }

    #[test]
    fn crc_known_vector() {
        // CRC-32/MPEG-2 check value
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376_E6E7);
    }

    #[test]
    fn header_and_long_header_fields() {
        let s = signed_section(TABLE_ID_AIT, &[1, 2, 3]);
        let header = SectionHeader::parse(&s).unwrap();
        assert_eq!(header.table_id, TABLE_ID_AIT);
        assert!(header.section_syntax_indicator);
        assert!(!header.private_indicator);
        assert_eq!(header.section_length, 12);
        assert_eq!(header.total_size(), s.len());

        let long = LongHeader::parse(&s).unwrap();
        assert_eq!(long.table_id_extension, 0x1234);
        assert_eq!(long.version, 3);
        assert!(long.current_next);
        assert_eq!(long.last_section, 1);
    }

    #[test]
    fn crc_detects_corruption() {
        let mut s = signed_section(0x02, &[9; 20]);
        assert!(verify_crc(&s));
        s[10] ^= 0x01;
        assert!(!verify_crc(&s));
        assert!(!verify_crc(&s[..5]));
    }

    #[test]
    fn length_limits() {
        let too_long = SectionHeader::parse(&[0x74, 0xBF, 0xFF]).unwrap();
        assert_eq!(
            too_long.validate(MAX_PRIVATE_SECTION_LENGTH),
            Err(DropReason::InvalidSectionLength(0xFFF))
        );

        let too_short = SectionHeader::parse(&[0x74, 0xB0, 0x04]).unwrap();
        assert!(too_short.validate(MAX_PRIVATE_SECTION_LENGTH).is_err());

        // short-form sections carry no CRC and may be tiny, but never empty
        let short_form = SectionHeader::parse(&[0x70, 0x70, 0x05]).unwrap();
        assert!(!short_form.has_crc());
        assert!(short_form.validate(MAX_PRIVATE_SECTION_LENGTH).is_ok());
        let empty = SectionHeader::parse(&[0x74, 0x70, 0x00]).unwrap();
        assert_eq!(
            empty.validate(MAX_PRIVATE_SECTION_LENGTH),
            Err(DropReason::InvalidSectionLength(0))
        );
    }

    #[test]
    fn program_tables_require_section_syntax() {
        for table_id in [0x00, 0x01, 0x02, 0x03] {
            let header = SectionHeader::parse(&[table_id, 0x30, 0x0D]).unwrap();
            assert_eq!(
                header.validate(MAX_PRIVATE_SECTION_LENGTH),
                Err(DropReason::MissingSectionSyntax(table_id))
            );
        }
        let zero_fill = SectionHeader::parse(&[0x00, 0x00, 0x00]).unwrap();
        assert!(zero_fill.validate(MAX_PRIVATE_SECTION_LENGTH).is_err());
    }
}
