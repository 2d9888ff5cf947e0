//! Shared helpers for the format parsers.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::HeaderError;
use crate::formats::Endianness;

type Result<T> = std::result::Result<T, HeaderError>;

/// Bounds-checked integer reads with endianness support.
pub trait EndianRead {
    fn read_u16(&self, offset: usize, endian: Endianness) -> Result<u16>;
    fn read_u32(&self, offset: usize, endian: Endianness) -> Result<u32>;
    fn read_u64(&self, offset: usize, endian: Endianness) -> Result<u64>;
}

impl EndianRead for [u8] {
    fn read_u16(&self, offset: usize, endian: Endianness) -> Result<u16> {
        let bytes: [u8; 2] = self
            .get(offset..offset + 2)
            .ok_or(HeaderError::Truncated { offset, needed: 2 })?
            .try_into()
            .unwrap();
        Ok(match endian {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&self, offset: usize, endian: Endianness) -> Result<u32> {
        let bytes: [u8; 4] = self
            .get(offset..offset + 4)
            .ok_or(HeaderError::Truncated { offset, needed: 4 })?
            .try_into()
            .unwrap();
        Ok(match endian {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64(&self, offset: usize, endian: Endianness) -> Result<u64> {
        let bytes: [u8; 8] = self
            .get(offset..offset + 8)
            .ok_or(HeaderError::Truncated { offset, needed: 8 })?
            .try_into()
            .unwrap();
        Ok(match endian {
            Endianness::Little => u64::from_le_bytes(bytes),
            Endianness::Big => u64::from_be_bytes(bytes),
        })
    }
}

/// Seek to `offset` and read exactly `len` bytes of header material.
pub fn read_header_bytes(file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)
        .map_err(|_| HeaderError::Truncated {
            offset: offset as usize,
            needed: len,
        })?;
    Ok(buf)
}

/// Read `size` bytes at file offset `file_off` on behalf of a `read_at`
/// translation; `addr` is the virtual address being served, kept for error
/// context.
pub(crate) fn read_translated(
    file: &mut File,
    file_off: u64,
    size: u64,
    addr: u64,
) -> crate::error::Result<Vec<u8>> {
    use crate::error::Error;

    file.seek(SeekFrom::Start(file_off))
        .map_err(|source| Error::Io { addr, source })?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf)
        .map_err(|source| Error::Io { addr, source })?;
    Ok(buf)
}
