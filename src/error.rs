//! Error types for modstamp operations.
//!
//! One crate-level [`Error`] covers the whole read pipeline; structural
//! failures inside a format parser are reported through the narrower
//! [`HeaderError`] and wrapped by [`Error::Malformed`] so callers keep the
//! underlying cause for diagnostics.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::formats::Format;

/// Main error type for modstamp operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The path of the running executable could not be resolved.
    #[error("cannot find running executable")]
    PathResolution(#[source] io::Error),

    /// The executable file could not be opened or sniffed.
    #[error("cannot open executable {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Magic-number sniffing matched none of ELF, PE, or Mach-O.
    #[error("unrecognized executable format")]
    UnrecognizedFormat,

    /// The sniffed format's own header parsing failed.
    #[error("malformed {format} executable")]
    Malformed {
        format: Format,
        #[source]
        source: HeaderError,
    },

    /// A read was attempted for a range no segment or section maps.
    #[error("address {addr:#x} (+{size} bytes) not mapped")]
    UnmappedAddress { addr: u64, size: u64 },

    /// The full read-only range was scanned without finding a marker pair.
    #[error("no module information in executable")]
    NoModuleInfo,

    /// Lower-level read or seek failure while streaming scan windows.
    #[error("read failed at address {addr:#x}")]
    Io {
        addr: u64,
        #[source]
        source: io::Error,
    },
}

/// Result type alias for modstamp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural errors from the format-specific header parsers.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("truncated at offset {offset:#x}, needed {needed} bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid magic")]
    BadMagic,

    #[error("unsupported class: {0}")]
    UnsupportedClass(u8),

    #[error("unsupported data encoding: {0}")]
    UnsupportedEncoding(u8),

    #[error("no sections")]
    NoSections,

    #[error("empty fat header")]
    EmptyFatHeader,

    #[error("i/o error reading header")]
    Io(#[from] io::Error),
}

impl HeaderError {
    /// Wrap this header failure as a crate-level malformed-executable error.
    pub(crate) fn for_format(self, format: Format) -> Error {
        Error::Malformed {
            format,
            source: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnmappedAddress {
            addr: 0x401000,
            size: 16,
        };
        assert_eq!(err.to_string(), "address 0x401000 (+16 bytes) not mapped");

        let err = Error::NoModuleInfo;
        assert_eq!(err.to_string(), "no module information in executable");
    }

    #[test]
    fn test_malformed_carries_cause() {
        use std::error::Error as _;

        let err = HeaderError::Truncated {
            offset: 0x40,
            needed: 56,
        }
        .for_format(Format::Elf);
        assert_eq!(err.to_string(), "malformed ELF executable");
        let cause = err.source().expect("source");
        assert_eq!(
            cause.to_string(),
            "truncated at offset 0x40, needed 56 bytes"
        );
    }
}
