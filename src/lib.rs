//! Static recompiler front end for MS-DOS MZ executables that use the
//! Microsoft C overlay manager (software interrupt 3Fh).
//!
//! The pipeline is single threaded and runs in a fixed order: parse the
//! outer container, discover the chained overlay modules, decode and
//! analyze each code region, extract strings and categorize, then lift
//! every function into target source. The raw image bytes are read once
//! and handed around as read-only slices.

#![forbid(unsafe_code)]

pub mod analysis;
pub mod decode;
pub mod lift;
pub mod strings;

#[cfg(test)]
mod test;

use std::io::Read;
use std::ops::Range;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

const MZ_MAGIC: u16 = 0x5A4D;
/// Full MZ header size; an overlay candidate needs this many bytes.
const MZ_HEADER_LEN: usize = 28;

/// Overlay scan sanity bounds, inherited from observed binaries. A header
/// whose page count or header-paragraph count falls outside these is not an
/// overlay module.
pub const OVERLAY_MAX_PAGES: u16 = 500;
pub const OVERLAY_MAX_HEADER_PARAS: u16 = 100;

/// Leading fields of the MZ header as laid out on disk, little endian.
#[derive(Clone, Copy, Debug, Deserialize)]
struct RawExeHeader {
    magic: u16,
    /// Bytes used in the last 512-byte page, 0 meaning the page is full.
    last_page: u16,
    /// Total page count, including the last partial page.
    pages: u16,
    _relocs: u16,
    /// Header size in 16-byte paragraphs.
    header_paras: u16,
}

impl RawExeHeader {
    fn image_size(&self) -> usize {
        if self.last_page > 0 {
            (usize::from(self.pages) - 1) * 512 + usize::from(self.last_page)
        } else {
            usize::from(self.pages) * 512
        }
    }

    fn header_size(&self) -> usize {
        usize::from(self.header_paras) * 16
    }
}

/// One chained overlay module discovered after the resident image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverlayModule {
    /// 1-based index, dense in file order.
    pub index: u8,
    /// File offset of the module's own MZ header.
    pub file_offset: usize,
    /// File offset of the module's code.
    pub code_offset: usize,
    pub code_size: usize,
}

impl OverlayModule {
    pub fn code_range(&self) -> Range<usize> {
        self.code_offset..self.code_offset + self.code_size
    }
}

/// The program image: raw bytes plus the resident window computed from the
/// outer header. Owned for the lifetime of the pipeline.
#[derive(Clone, Debug)]
pub struct ExeImage {
    data: Vec<u8>,
    header_size: usize,
    image_size: usize,
}

impl ExeImage {
    pub fn read<I: Read>(input: &mut I) -> Result<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() >= MZ_HEADER_LEN,
            "file too short for an MZ header: {} bytes",
            data.len()
        );
        let header: RawExeHeader = bincode::deserialize_from(&data[..])?;
        ensure!(
            header.magic == MZ_MAGIC,
            "invalid MZ magic {:#06X}",
            header.magic
        );
        ensure!(header.pages > 0, "MZ header with zero pages");
        let header_size = header.header_size();
        let image_size = header.image_size().min(data.len());
        ensure!(
            header_size <= image_size,
            "MZ header ({header_size} bytes) larger than its image ({image_size} bytes)"
        );
        Ok(Self {
            data,
            header_size,
            image_size,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// The always-in-memory code window of the outer image.
    pub fn resident_range(&self) -> Range<usize> {
        self.header_size..self.image_size
    }

    pub fn resident_code(&self) -> &[u8] {
        &self.data[self.resident_range()]
    }

    /// Scan for chained overlay modules: from the first 512-byte-aligned
    /// offset at or after the resident image, step by 512 bytes and accept
    /// every MZ header whose fields pass the sanity bounds. Indices are
    /// assigned in discovery order, starting at 1.
    pub fn find_overlays(&self) -> Vec<OverlayModule> {
        let mut modules: Vec<OverlayModule> = Vec::new();
        let mut scan = (self.image_size + 0x1FF) & !0x1FF;
        while scan + MZ_HEADER_LEN < self.data.len() {
            let Ok(index) = u8::try_from(modules.len() + 1) else {
                break;
            };
            if let Some(module) = self.overlay_at(scan, index) {
                modules.push(module);
            }
            scan += 0x200;
        }
        modules
    }

    fn overlay_at(&self, scan: usize, index: u8) -> Option<OverlayModule> {
        let header: RawExeHeader =
            bincode::deserialize_from(&self.data[scan..]).ok()?;
        if header.magic != MZ_MAGIC {
            return None;
        }
        if !(1..OVERLAY_MAX_PAGES).contains(&header.pages)
            || !(1..OVERLAY_MAX_HEADER_PARAS).contains(&header.header_paras)
        {
            return None;
        }
        let code_offset = scan + header.header_size();
        let code_size = header
            .image_size()
            .saturating_sub(header.header_size())
            .min(self.data.len().saturating_sub(code_offset));
        Some(OverlayModule {
            index,
            file_offset: scan,
            code_offset,
            code_size,
        })
    }
}
