//! ELF reader.
//!
//! Parses the identification bytes, file header, and program header table
//! from an open file, then serves address-mapped reads through the loadable
//! segments. Both classes and both data encodings are supported.

use std::fs::File;

use tracing::trace;

use crate::error::{Error, HeaderError, Result};
use crate::formats::utils::{read_header_bytes, read_translated, EndianRead};
use crate::formats::{AddressMapped, AddressRange, Endianness};

/// ELF identification magic.
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

const PT_LOAD: u32 = 1;
const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

/// One program header entry, reduced to the fields address translation needs.
#[derive(Debug, Clone, Copy)]
struct ProgramHeader {
    p_type: u32,
    p_flags: u32,
    p_offset: u64,
    p_vaddr: u64,
    p_filesz: u64,
}

/// An opened ELF executable.
#[derive(Debug)]
pub struct ElfExe {
    file: File,
    endian: Endianness,
    segments: Vec<ProgramHeader>,
}

impl ElfExe {
    /// Parse the header and program header table from an open file.
    pub fn parse(mut file: File) -> std::result::Result<Self, HeaderError> {
        let ident = read_header_bytes(&mut file, 0, 16)?;
        if &ident[0..4] != ELF_MAGIC {
            return Err(HeaderError::BadMagic);
        }
        let class = ident[4];
        let is64 = match class {
            1 => false,
            2 => true,
            _ => return Err(HeaderError::UnsupportedClass(class)),
        };
        let endian = match ident[5] {
            1 => Endianness::Little,
            2 => Endianness::Big,
            other => return Err(HeaderError::UnsupportedEncoding(other)),
        };

        let header_size = if is64 { 64 } else { 52 };
        let header = read_header_bytes(&mut file, 0, header_size)?;

        let (e_phoff, e_phentsize, e_phnum) = if is64 {
            (
                header.read_u64(32, endian)?,
                header.read_u16(54, endian)?,
                header.read_u16(56, endian)?,
            )
        } else {
            (
                header.read_u32(28, endian)? as u64,
                header.read_u16(42, endian)?,
                header.read_u16(44, endian)?,
            )
        };

        let min_entsize = if is64 { 56 } else { 32 };
        let mut segments = Vec::new();
        if e_phnum > 0 && e_phoff > 0 {
            if (e_phentsize as usize) < min_entsize {
                return Err(HeaderError::Truncated {
                    offset: e_phoff as usize,
                    needed: min_entsize,
                });
            }
            let table_len = e_phnum as usize * e_phentsize as usize;
            let table = read_header_bytes(&mut file, e_phoff, table_len)?;
            segments.reserve(e_phnum as usize);
            for i in 0..e_phnum as usize {
                let base = i * e_phentsize as usize;
                let entry = &table[base..base + e_phentsize as usize];
                segments.push(parse_program_header(entry, is64, endian)?);
            }
        }

        trace!(segments = segments.len(), "parsed ELF program headers");
        Ok(Self {
            file,
            endian,
            segments,
        })
    }

    pub(crate) fn into_file(self) -> File {
        self.file
    }
}

fn parse_program_header(
    entry: &[u8],
    is64: bool,
    endian: Endianness,
) -> std::result::Result<ProgramHeader, HeaderError> {
    if is64 {
        Ok(ProgramHeader {
            p_type: entry.read_u32(0, endian)?,
            p_flags: entry.read_u32(4, endian)?,
            p_offset: entry.read_u64(8, endian)?,
            p_vaddr: entry.read_u64(16, endian)?,
            p_filesz: entry.read_u64(32, endian)?,
        })
    } else {
        Ok(ProgramHeader {
            p_type: entry.read_u32(0, endian)?,
            p_flags: entry.read_u32(24, endian)?,
            p_offset: entry.read_u32(4, endian)? as u64,
            p_vaddr: entry.read_u32(8, endian)? as u64,
            p_filesz: entry.read_u32(16, endian)? as u64,
        })
    }
}

impl AddressMapped for ElfExe {
    fn byte_order(&self) -> Endianness {
        self.endian
    }

    /// Prefer a pure read-only LOAD segment; fall back to read+execute when
    /// the image has no R-only segment (statically linked layouts).
    fn ro_data_range(&self) -> AddressRange {
        for p in &self.segments {
            if p.p_type == PT_LOAD && p.p_flags & (PF_R | PF_W | PF_X) == PF_R {
                return AddressRange::new(p.p_vaddr, p.p_vaddr.saturating_add(p.p_filesz));
            }
        }
        for p in &self.segments {
            if p.p_type == PT_LOAD && p.p_flags & (PF_R | PF_W | PF_X) == (PF_R | PF_X) {
                return AddressRange::new(p.p_vaddr, p.p_vaddr.saturating_add(p.p_filesz));
            }
        }
        AddressRange::EMPTY
    }

    fn read_at(&mut self, addr: u64, size: u64) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        for p in &self.segments {
            let contains = p.p_vaddr <= addr
                && addr - p.p_vaddr < p.p_filesz
                && size <= p.p_filesz - (addr - p.p_vaddr);
            if contains {
                let file_off = p
                    .p_offset
                    .checked_add(addr - p.p_vaddr)
                    .ok_or(Error::UnmappedAddress { addr, size })?;
                return read_translated(&mut self.file, file_off, size, addr);
            }
        }
        Err(Error::UnmappedAddress { addr, size })
    }
}
