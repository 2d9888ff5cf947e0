//! Executable container formats.
//!
//! A uniform, address-mapped view over ELF, PE, and Mach-O images. The rest
//! of the crate reads bytes by virtual address through the [`AddressMapped`]
//! trait and never touches format-specific layout; everything
//! format-specific (segment tables, image-base arithmetic, byte order) is
//! isolated in the per-format readers.

pub mod elf;
pub mod macho;
pub mod pe;
pub mod utils;

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub use elf::ElfExe;
pub use macho::MachoExe;
pub use pe::PeExe;

/// Number of prefix bytes read for magic sniffing.
const SNIFF_LEN: usize = 16;

/// Executable container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    Elf,
    Pe,
    MachO,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Elf => write!(f, "ELF"),
            Format::Pe => write!(f, "PE"),
            Format::MachO => write!(f, "Mach-O"),
        }
    }
}

/// Byte order of an executable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Little-endian byte order
    Little,
    /// Big-endian byte order
    Big,
}

/// A half-open virtual-address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    /// An empty range; yields "no table found" when scanned.
    pub const EMPTY: AddressRange = AddressRange { start: 0, end: 0 };

    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.end)
    }
}

/// Capability set every format reader supports.
///
/// `read_at` takes `&mut self` because the readers seek an underlying file
/// handle; they perform no other mutation.
pub trait AddressMapped {
    /// Byte order declared by the image's header.
    fn byte_order(&self) -> Endianness;

    /// Virtual-address span of the read-only data segment.
    ///
    /// May be empty when the image has no suitable segment; an empty range
    /// scans to nothing rather than failing.
    fn ro_data_range(&self) -> AddressRange;

    /// Read `size` bytes starting at virtual address `addr`, translating
    /// through the format's segment or section table.
    ///
    /// Fails with [`Error::UnmappedAddress`] when no single segment maps
    /// the full requested range.
    fn read_at(&mut self, addr: u64, size: u64) -> Result<Vec<u8>>;
}

/// An opened executable: one of the three format readers.
#[derive(Debug)]
pub enum Exe {
    Elf(ElfExe),
    Pe(PeExe),
    MachO(MachoExe),
}

impl Exe {
    pub fn format(&self) -> Format {
        match self {
            Exe::Elf(_) => Format::Elf,
            Exe::Pe(_) => Format::Pe,
            Exe::MachO(_) => Format::MachO,
        }
    }

    /// Release the underlying file handle.
    ///
    /// Dropping an `Exe` releases the handle too; `close` makes the release
    /// point explicit at the call site.
    pub fn close(self) {
        match self {
            Exe::Elf(e) => drop(e.into_file()),
            Exe::Pe(e) => drop(e.into_file()),
            Exe::MachO(e) => drop(e.into_file()),
        }
    }
}

impl AddressMapped for Exe {
    fn byte_order(&self) -> Endianness {
        match self {
            Exe::Elf(e) => e.byte_order(),
            Exe::Pe(e) => e.byte_order(),
            Exe::MachO(e) => e.byte_order(),
        }
    }

    fn ro_data_range(&self) -> AddressRange {
        match self {
            Exe::Elf(e) => e.ro_data_range(),
            Exe::Pe(e) => e.ro_data_range(),
            Exe::MachO(e) => e.ro_data_range(),
        }
    }

    fn read_at(&mut self, addr: u64, size: u64) -> Result<Vec<u8>> {
        match self {
            Exe::Elf(e) => e.read_at(addr, size),
            Exe::Pe(e) => e.read_at(addr, size),
            Exe::MachO(e) => e.read_at(addr, size),
        }
    }
}

/// Sniff an executable's magic prefix and construct the matching reader.
///
/// Match order is ELF, then PE, then Mach-O (slim in either byte order,
/// or the fat/universal wrapper). The handle is left open and seekable;
/// on any failure it is released before returning.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Exe> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut prefix = [0u8; SNIFF_LEN];
    let mut got = 0;
    while got < SNIFF_LEN {
        match file.read(&mut prefix[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Error::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
    file.seek(SeekFrom::Start(0)).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let prefix = &prefix[..got];

    let format = sniff(prefix).ok_or(Error::UnrecognizedFormat)?;
    debug!(format = %format, path = %path.display(), "sniffed executable format");

    match format {
        Format::Elf => ElfExe::parse(file)
            .map(Exe::Elf)
            .map_err(|e| e.for_format(Format::Elf)),
        Format::Pe => PeExe::parse(file)
            .map(Exe::Pe)
            .map_err(|e| e.for_format(Format::Pe)),
        Format::MachO => MachoExe::parse(file)
            .map(Exe::MachO)
            .map_err(|e| e.for_format(Format::MachO)),
    }
}

/// Match a file prefix against the known magic numbers.
fn sniff(prefix: &[u8]) -> Option<Format> {
    if prefix.starts_with(elf::ELF_MAGIC) {
        return Some(Format::Elf);
    }
    if prefix.starts_with(pe::DOS_MAGIC) {
        return Some(Format::Pe);
    }
    // Slim Mach-O in either byte order, or a fat/universal wrapper.
    if prefix.starts_with(&[0xfe, 0xed, 0xfa])
        || (prefix.len() >= 4 && prefix[1..4] == [0xfa, 0xed, 0xfe])
        || prefix.starts_with(&macho::FAT_MAGIC_BE)
        || prefix.starts_with(&macho::FAT_MAGIC_LE)
    {
        return Some(Format::MachO);
    }
    None
}
