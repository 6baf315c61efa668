// psi/ait.rs
//! HbbTV Application Information Table (table id 0x74, ETSI TS 102 809).
//!
//! Not part of reassembly: [`AitConsumer`] is an ordinary section consumer
//! that turns complete AIT sections into an application launch URL.

use anyhow::Context;
use bitstream_io::{BigEndian, BitRead, BitReader};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::{CRC_SIZE, LONG_HEADER_SIZE, TABLE_ID_AIT};
use crate::psi::section::SectionHeader;
use crate::registry::SectionConsumer;

const TAG_APPLICATION_NAME: u8 = 0x01;
const TAG_TRANSPORT_PROTOCOL: u8 = 0x02;
const TAG_SIMPLE_APPLICATION_LOCATION: u8 = 0x15;

const PROTOCOL_ID_OBJECT_CAROUSEL: u16 = 0x0001;
const PROTOCOL_ID_HTTP: u16 = 0x0003;

const CONTROL_CODE_AUTOSTART: u8 = 0x01;

/// application_identifier + control code + descriptor loop length
const APP_ENTRY_HEADER: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AitTable {
    pub test_application: bool,
    pub application_type: u16,
    pub version: u8,
    pub section_number: u8,
    pub last_section_number: u8,
    pub applications: Vec<AitApplication>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AitApplication {
    pub organisation_id: u32,
    pub application_id: u16,
    pub control_code: u8,
    pub name: Option<String>,
    pub protocol_ids: Vec<u16>,
    pub url_base: Option<String>,
    pub url_extension: Option<String>,
    pub initial_path: Option<String>,
}

impl AitApplication {
    pub fn is_autostart(&self) -> bool {
        self.control_code == CONTROL_CODE_AUTOSTART
    }

    /// URL base + extension + initial path, for HTTP-delivered applications.
    pub fn launch_url(&self) -> Option<String> {
        let base = self.url_base.as_deref().filter(|b| !b.trim().is_empty())?;
        let mut url = base.to_string();
        if let Some(ext) = self.url_extension.as_deref().filter(|e| !e.is_empty()) {
            url.push_str(ext);
        }
        if let Some(path) = self.initial_path.as_deref().filter(|p| !p.is_empty()) {
            if !url.ends_with('/') && !path.starts_with('/') {
                url.push('/');
            }
            url.push_str(path);
        }
        Some(url)
    }
}

/// Application picked from an AIT for launching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HbbTvApp {
    pub url: String,
    pub autostart: bool,
    pub organisation_id: u32,
    pub application_id: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AitOutcome {
    Url(HbbTvApp),
    NoUrl { reason: String },
}

impl AitTable {
    /// Autostart HTTP application first, otherwise the first HTTP one.
    pub fn outcome(&self) -> AitOutcome {
        if self.applications.is_empty() {
            return AitOutcome::NoUrl {
                reason: "no applications in AIT".into(),
            };
        }

        let launchable: Vec<(&AitApplication, String)> = self
            .applications
            .iter()
            .filter_map(|app| app.launch_url().map(|url| (app, url)))
            .collect();

        let best = launchable
            .iter()
            .find(|(app, _)| app.is_autostart())
            .or_else(|| launchable.first());

        match best {
            Some((app, url)) => AitOutcome::Url(HbbTvApp {
                url: url.clone(),
                autostart: app.is_autostart(),
                organisation_id: app.organisation_id,
                application_id: app.application_id,
                name: app.name.clone(),
            }),
            None => {
                let carousel_only = self
                    .applications
                    .iter()
                    .any(|app| app.protocol_ids.contains(&PROTOCOL_ID_OBJECT_CAROUSEL));
                AitOutcome::NoUrl {
                    reason: if carousel_only {
                        "AIT present but no HTTP transport (only DSM-CC)".into()
                    } else {
                        "AIT present but no HTTP transport".into()
                    },
                }
            }
        }
    }
}

/// Walks a descriptor loop, stopping at the first truncated descriptor.
struct Descriptors<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 2 {
            return None;
        }
        let tag = self.data[0];
        let len = self.data[1] as usize;
        let body = self.data.get(2..2 + len)?;
        self.data = &self.data[2 + len..];
        Some((tag, body))
    }
}

fn descriptors(data: &[u8]) -> Descriptors<'_> {
    Descriptors { data }
}

/// Parses a complete AIT section (table_id through CRC).
pub fn parse_ait(section: &[u8]) -> anyhow::Result<AitTable> {
    let header = SectionHeader::parse(section).context("short AIT section")?;
    if header.table_id != TABLE_ID_AIT {
        anyhow::bail!("not AIT (table_id 0x{:02X})", header.table_id);
    }
    let end = header.total_size();
    if end > section.len() || end < LONG_HEADER_SIZE + 2 + 2 + CRC_SIZE {
        anyhow::bail!("truncated AIT section");
    }
    let body = &section[..end - CRC_SIZE];

    let mut br = BitReader::endian(&body[3..LONG_HEADER_SIZE + 2], BigEndian);
    let test_application = br.read_bit()?;
    let application_type = br.read::<15, u16>()?;
    br.skip(2)?;
    let version = br.read::<5, u8>()?;
    let _current_next = br.read_bit()?;
    let section_number = br.read::<8, u8>()?;
    let last_section_number = br.read::<8, u8>()?;
    br.skip(4)?;
    let common_len = br.read::<12, u16>()? as usize;

    let mut idx = LONG_HEADER_SIZE + 2 + common_len; // common descriptors are skipped
    let loop_len_bytes = body.get(idx..idx + 2).context("AIT too short for application loop")?;
    let app_loop_len = (((loop_len_bytes[0] & 0x0F) as usize) << 8) | loop_len_bytes[1] as usize;
    idx += 2;
    let app_loop = body
        .get(idx..idx + app_loop_len)
        .context("application loop extends beyond section")?;

    let mut applications = Vec::new();
    let mut pos = 0;
    while pos + APP_ENTRY_HEADER <= app_loop.len() {
        let mut br = BitReader::endian(&app_loop[pos..pos + APP_ENTRY_HEADER], BigEndian);
        let mut app = AitApplication {
            organisation_id: br.read::<32, u32>()?,
            application_id: br.read::<16, u16>()?,
            control_code: br.read::<8, u8>()?,
            ..AitApplication::default()
        };
        br.skip(4)?;
        let desc_len = br.read::<12, u16>()? as usize;
        pos += APP_ENTRY_HEADER;

        let Some(desc) = app_loop.get(pos..pos + desc_len) else {
            debug!(app_id = app.application_id, "application descriptors truncated");
            break;
        };
        pos += desc_len;

        for (tag, data) in descriptors(desc) {
            match tag {
                TAG_APPLICATION_NAME => {
                    if app.name.is_none() {
                        app.name = parse_application_name(data);
                    }
                }
                TAG_TRANSPORT_PROTOCOL => parse_transport_protocol(data, &mut app),
                TAG_SIMPLE_APPLICATION_LOCATION => {
                    app.initial_path = Some(String::from_utf8_lossy(data).into_owned());
                }
                _ => {}
            }
        }
        applications.push(app);
    }

    Ok(AitTable {
        test_application,
        application_type,
        version,
        section_number,
        last_section_number,
        applications,
    })
}

/// ISO 639 language code (3 bytes), name length, name. First entry only.
fn parse_application_name(data: &[u8]) -> Option<String> {
    let len = *data.get(3)? as usize;
    let name = data.get(4..4 + len)?;
    Some(String::from_utf8_lossy(name).into_owned())
}

fn parse_transport_protocol(data: &[u8], app: &mut AitApplication) {
    if data.len() < 3 {
        return;
    }
    let protocol_id = u16::from_be_bytes([data[0], data[1]]);
    app.protocol_ids.push(protocol_id);
    if protocol_id != PROTOCOL_ID_HTTP || app.url_base.is_some() {
        return;
    }

    // selector: URL_base_length, URL_base, URL_extension_count, extensions
    let selector = &data[3..];
    let Some(&base_len) = selector.first() else { return };
    let Some(base) = selector.get(1..1 + base_len as usize) else { return };
    app.url_base = Some(String::from_utf8_lossy(base).into_owned());

    let rest = &selector[1 + base_len as usize..];
    if rest.first().copied().unwrap_or(0) > 0 {
        if let Some(&ext_len) = rest.get(1) {
            if let Some(ext) = rest.get(2..2 + ext_len as usize) {
                app.url_extension = Some(String::from_utf8_lossy(ext).into_owned());
            }
        }
    }
}

#[derive(Default)]
struct AitState {
    latest: Option<AitOutcome>,
    sections: u64,
    parse_errors: u64,
}

/// Section consumer that tracks the most recent launch decision.
#[derive(Default)]
pub struct AitConsumer {
    state: Mutex<AitState>,
}

impl AitConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<AitOutcome> {
        self.state.lock().latest.clone()
    }

    pub fn sections_seen(&self) -> u64 {
        self.state.lock().sections
    }

    pub fn parse_errors(&self) -> u64 {
        self.state.lock().parse_errors
    }
}

impl SectionConsumer for AitConsumer {
    fn on_section(&self, table_id: u8, section: &[u8]) {
        if table_id != TABLE_ID_AIT {
            warn!(table_id, "AIT consumer received a foreign table");
            return;
        }

        let mut state = self.state.lock();
        state.sections += 1;
        let table = match parse_ait(section) {
            Ok(table) => table,
            Err(e) => {
                state.parse_errors += 1;
                debug!(error = %e, "AIT section not understood");
                return;
            }
        };

        let outcome = table.outcome();
        if state.latest.as_ref() != Some(&outcome) {
            match &outcome {
                AitOutcome::Url(app) => info!(
                    url = %app.url,
                    autostart = app.autostart,
                    version = table.version,
                    "HbbTV application found"
                ),
                AitOutcome::NoUrl { reason } => info!(%reason, "AIT present without HbbTV URL"),
            }
        }
        state.latest = Some(outcome);
    }
}
