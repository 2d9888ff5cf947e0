//! PE reader.
//!
//! Walks the DOS stub to the COFF header, takes the image base from the
//! optional header (PE32 or PE32+), and serves address-mapped reads through
//! the section table. PE images are little-endian by definition.
//!
//! The read-only range heuristic is the first non-empty section, offset by
//! the image base; the producing toolchain defines marker placement relative
//! to this same heuristic.

use std::fs::File;

use tracing::trace;

use crate::error::{Error, HeaderError, Result};
use crate::formats::utils::{read_header_bytes, read_translated, EndianRead};
use crate::formats::{AddressMapped, AddressRange, Endianness};

/// DOS stub magic ("MZ").
pub const DOS_MAGIC: &[u8; 2] = b"MZ";

const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const PE32_MAGIC: u16 = 0x10b;
const PE32PLUS_MAGIC: u16 = 0x20b;
const SECTION_HEADER_SIZE: usize = 40;

const LE: Endianness = Endianness::Little;

/// One section header, reduced to the fields address translation needs.
/// `size_of_raw_data` governs containment: only file-backed bytes can hold
/// the marker blob.
#[derive(Debug, Clone, Copy)]
struct SectionHeader {
    virtual_address: u32,
    size_of_raw_data: u32,
    pointer_to_raw_data: u32,
}

/// An opened PE executable.
#[derive(Debug)]
pub struct PeExe {
    file: File,
    image_base: u64,
    sections: Vec<SectionHeader>,
}

impl PeExe {
    /// Parse the DOS, COFF, and optional headers plus the section table.
    pub fn parse(mut file: File) -> std::result::Result<Self, HeaderError> {
        let dos = read_header_bytes(&mut file, 0, 64)?;
        if &dos[0..2] != DOS_MAGIC {
            return Err(HeaderError::BadMagic);
        }
        let e_lfanew = dos.read_u32(60, LE)? as u64;

        // PE signature + 20-byte COFF header
        let coff = read_header_bytes(&mut file, e_lfanew, 24)?;
        if &coff[0..4] != PE_SIGNATURE {
            return Err(HeaderError::BadMagic);
        }
        let number_of_sections = coff.read_u16(6, LE)?;
        let size_of_optional_header = coff.read_u16(20, LE)? as usize;

        let opt_offset = e_lfanew + 24;
        if size_of_optional_header < 2 {
            return Err(HeaderError::Truncated {
                offset: opt_offset as usize,
                needed: 2,
            });
        }
        let opt = read_header_bytes(&mut file, opt_offset, size_of_optional_header)?;
        let image_base = match opt.read_u16(0, LE)? {
            PE32_MAGIC => opt.read_u32(28, LE)? as u64,
            PE32PLUS_MAGIC => opt.read_u64(24, LE)?,
            _ => return Err(HeaderError::BadMagic),
        };

        if number_of_sections == 0 {
            return Err(HeaderError::NoSections);
        }
        let table_offset = opt_offset + size_of_optional_header as u64;
        let table_len = number_of_sections as usize * SECTION_HEADER_SIZE;
        let table = read_header_bytes(&mut file, table_offset, table_len)?;
        let mut sections = Vec::with_capacity(number_of_sections as usize);
        for i in 0..number_of_sections as usize {
            let base = i * SECTION_HEADER_SIZE;
            sections.push(SectionHeader {
                virtual_address: table.read_u32(base + 12, LE)?,
                size_of_raw_data: table.read_u32(base + 16, LE)?,
                pointer_to_raw_data: table.read_u32(base + 20, LE)?,
            });
        }

        trace!(
            sections = sections.len(),
            image_base = format_args!("{:#x}", image_base),
            "parsed PE section table"
        );
        Ok(Self {
            file,
            image_base,
            sections,
        })
    }

    pub(crate) fn into_file(self) -> File {
        self.file
    }
}

impl AddressMapped for PeExe {
    fn byte_order(&self) -> Endianness {
        Endianness::Little
    }

    /// First non-empty section, address-based, offset by the image base.
    fn ro_data_range(&self) -> AddressRange {
        for sect in &self.sections {
            if sect.virtual_address != 0 && sect.size_of_raw_data != 0 {
                let start = self.image_base.saturating_add(sect.virtual_address as u64);
                let end = start.saturating_add(sect.size_of_raw_data as u64);
                return AddressRange::new(start, end);
            }
        }
        AddressRange::EMPTY
    }

    fn read_at(&mut self, addr: u64, size: u64) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let Some(rva) = addr.checked_sub(self.image_base) else {
            return Err(Error::UnmappedAddress { addr, size });
        };
        for sect in &self.sections {
            let va = sect.virtual_address as u64;
            let raw = sect.size_of_raw_data as u64;
            let contains = va <= rva && rva - va < raw && size <= raw - (rva - va);
            if contains {
                let file_off = (sect.pointer_to_raw_data as u64)
                    .checked_add(rva - va)
                    .ok_or(Error::UnmappedAddress { addr, size })?;
                return read_translated(&mut self.file, file_off, size, addr);
            }
        }
        Err(Error::UnmappedAddress { addr, size })
    }
}
