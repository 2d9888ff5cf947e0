//! Mach-O reader.
//!
//! Handles slim 32- and 64-bit images in either byte order. A fat/universal
//! wrapper is resolved to its first architecture slice before parsing, so
//! downstream code only ever sees a slim image. `__PAGEZERO` is excluded
//! from both the read-only range and address translation.

use std::fs::File;

use tracing::trace;

use crate::error::{Error, HeaderError, Result};
use crate::formats::utils::{read_header_bytes, read_translated, EndianRead};
use crate::formats::{AddressMapped, AddressRange, Endianness};

/// Fat/universal magic as stored on disk (big-endian header).
pub const FAT_MAGIC_BE: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];
/// Byte-swapped fat magic.
pub const FAT_MAGIC_LE: [u8; 4] = [0xbe, 0xba, 0xfe, 0xca];

const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;

const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;

const PAGEZERO: &[u8] = b"__PAGEZERO";

/// One load segment, reduced to the fields address translation needs.
#[derive(Debug, Clone)]
struct Segment {
    name: Vec<u8>,
    vmaddr: u64,
    fileoff: u64,
    filesize: u64,
}

impl Segment {
    fn is_pagezero(&self) -> bool {
        self.name == PAGEZERO
    }
}

/// An opened Mach-O executable.
#[derive(Debug)]
pub struct MachoExe {
    file: File,
    endian: Endianness,
    segments: Vec<Segment>,
}

impl MachoExe {
    /// Parse the header and load commands from an open file.
    pub fn parse(mut file: File) -> std::result::Result<Self, HeaderError> {
        let magic = read_header_bytes(&mut file, 0, 4)?;
        let base = if magic[0..4] == FAT_MAGIC_BE {
            first_fat_slice_offset(&mut file, Endianness::Big)?
        } else if magic[0..4] == FAT_MAGIC_LE {
            first_fat_slice_offset(&mut file, Endianness::Little)?
        } else {
            0
        };
        Self::parse_slim(file, base)
    }

    /// Parse a slim image starting at file offset `base` (non-zero for a
    /// slice inside a fat wrapper).
    fn parse_slim(mut file: File, base: u64) -> std::result::Result<Self, HeaderError> {
        let raw = read_header_bytes(&mut file, base, 4)?;
        // Decode the magic both ways; whichever matches tells us the
        // header's byte order and word size.
        let le = u32::from_le_bytes(raw[0..4].try_into().unwrap());
        let be = u32::from_be_bytes(raw[0..4].try_into().unwrap());
        let (endian, is64) = match (le, be) {
            (MH_MAGIC, _) => (Endianness::Little, false),
            (MH_MAGIC_64, _) => (Endianness::Little, true),
            (_, MH_MAGIC) => (Endianness::Big, false),
            (_, MH_MAGIC_64) => (Endianness::Big, true),
            _ => return Err(HeaderError::BadMagic),
        };

        let header_size = if is64 { 32 } else { 28 };
        let header = read_header_bytes(&mut file, base, header_size)?;
        let ncmds = header.read_u32(16, endian)?;
        let sizeofcmds = header.read_u32(20, endian)? as usize;

        let cmds = read_header_bytes(&mut file, base + header_size as u64, sizeofcmds)?;
        let mut segments = Vec::new();
        let mut off = 0usize;
        for _ in 0..ncmds {
            let cmd = cmds.read_u32(off, endian)?;
            let cmdsize = cmds.read_u32(off + 4, endian)? as usize;
            if cmdsize < 8 || off + cmdsize > sizeofcmds {
                return Err(HeaderError::Truncated {
                    offset: off,
                    needed: cmdsize.max(8),
                });
            }
            match cmd {
                LC_SEGMENT if cmdsize >= 40 => {
                    segments.push(Segment {
                        name: segment_name(&cmds[off + 8..off + 24]),
                        vmaddr: cmds.read_u32(off + 24, endian)? as u64,
                        fileoff: base + cmds.read_u32(off + 32, endian)? as u64,
                        filesize: cmds.read_u32(off + 36, endian)? as u64,
                    });
                }
                LC_SEGMENT_64 if cmdsize >= 56 => {
                    segments.push(Segment {
                        name: segment_name(&cmds[off + 8..off + 24]),
                        vmaddr: cmds.read_u64(off + 24, endian)?,
                        fileoff: base + cmds.read_u64(off + 40, endian)?,
                        filesize: cmds.read_u64(off + 48, endian)?,
                    });
                }
                _ => {}
            }
            off += cmdsize;
        }

        trace!(segments = segments.len(), base, "parsed Mach-O load commands");
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

/// Read the fat header and return the file offset of the first architecture
/// slice. Fat headers are big-endian on disk; `endian` covers the swapped
/// variant as well.
fn first_fat_slice_offset(
    file: &mut File,
    endian: Endianness,
) -> std::result::Result<u64, HeaderError> {
    let header = read_header_bytes(file, 0, 8)?;
    let nfat_arch = header.read_u32(4, endian)?;
    if nfat_arch == 0 {
        return Err(HeaderError::EmptyFatHeader);
    }
    // fat_arch: cputype, cpusubtype, offset, size, align
    let arch = read_header_bytes(file, 8, 20)?;
    Ok(arch.read_u32(8, endian)? as u64)
}

/// Segment name with trailing NUL padding stripped.
fn segment_name(raw: &[u8]) -> Vec<u8> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end].to_vec()
}

impl AddressMapped for MachoExe {
    fn byte_order(&self) -> Endianness {
        self.endian
    }

    /// First non-empty loadable segment other than the zero page.
    fn ro_data_range(&self) -> AddressRange {
        for seg in &self.segments {
            if !seg.is_pagezero() && seg.vmaddr != 0 && seg.filesize != 0 {
                return AddressRange::new(seg.vmaddr, seg.vmaddr.saturating_add(seg.filesize));
            }
        }
        AddressRange::EMPTY
    }

    fn read_at(&mut self, addr: u64, size: u64) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        for seg in &self.segments {
            if seg.is_pagezero() {
                continue;
            }
            let contains = seg.vmaddr <= addr
                && addr - seg.vmaddr < seg.filesize
                && size <= seg.filesize - (addr - seg.vmaddr);
            if contains {
                let file_off = seg
                    .fileoff
                    .checked_add(addr - seg.vmaddr)
                    .ok_or(Error::UnmappedAddress { addr, size })?;
                return read_translated(&mut self.file, file_off, size, addr);
            }
        }
        Err(Error::UnmappedAddress { addr, size })
    }
}
