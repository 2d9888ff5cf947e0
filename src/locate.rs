//! Marker-bracketed blob location.
//!
//! The producing toolchain brackets the module table with two fixed 16-byte
//! markers somewhere in the executable's read-only data. The locator walks
//! that range in bounded windows, so a multi-hundred-megabyte segment is
//! never materialized at once, and carries just enough state across window
//! boundaries that a marker or table straddling a boundary is still found.
//! The recovered bytes are independent of the window size.

use memchr::memmem;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::formats::AddressMapped;

/// Marker preceding the embedded table.
pub const INFO_START: [u8; 16] = [
    0x30, 0x77, 0xaf, 0x0c, 0x92, 0x74, 0x08, 0x02, 0x41, 0xe1, 0xc1, 0x07, 0xe6, 0xd6, 0x18, 0xe6,
];

/// Marker following the embedded table.
pub const INFO_END: [u8; 16] = [
    0xf9, 0x32, 0x43, 0x31, 0x86, 0x18, 0x20, 0x72, 0x00, 0x82, 0x42, 0x10, 0x41, 0x16, 0xd8, 0xf2,
];

const MARKER_LEN: usize = 16;

/// Maximum bytes read per window.
const SCAN_WINDOW: u64 = 4 << 20;

/// Upper bound on the embedded table; a candidate start marker with no end
/// marker within this many bytes is abandoned.
const MAX_TABLE_SIZE: usize = 128 << 10;

/// Scan progress carried across window boundaries.
enum ScanState {
    /// No start marker yet. `tail` holds the last `MARKER_LEN - 1` bytes of
    /// the previous window so a start marker split across the boundary is
    /// still matched.
    Seeking { tail: Vec<u8> },
    /// Start marker seen. `pending` accumulates the bytes after it until
    /// the end marker shows up or the table bound is exceeded.
    Started { pending: Vec<u8> },
}

/// Extract the raw table bytes from between the two markers.
///
/// Windows are read strictly in increasing address order, so the first
/// complete marker pair in the range wins. Returns [`Error::NoModuleInfo`]
/// when the range is empty or exhausted without a pair.
pub fn locate(exe: &mut impl AddressMapped) -> Result<Vec<u8>> {
    locate_with_window(exe, SCAN_WINDOW)
}

/// `locate` with an explicit window size. The result must not depend on the
/// window size; the default is only a memory bound.
pub(crate) fn locate_with_window(exe: &mut impl AddressMapped, window: u64) -> Result<Vec<u8>> {
    debug_assert!(window > 0);
    let range = exe.ro_data_range();
    if range.is_empty() {
        return Err(Error::NoModuleInfo);
    }
    trace!(range = %range, "scanning read-only data for module info");

    let mut state = ScanState::Seeking { tail: Vec::new() };
    let mut addr = range.start;
    while addr < range.end {
        let size = window.min(range.end - addr);
        let data = exe.read_at(addr, size)?;

        state = match state {
            ScanState::Seeking { mut tail } => {
                tail.extend_from_slice(&data);
                match memmem::find(&tail, &INFO_START) {
                    Some(i) => {
                        let mut pending = tail.split_off(i + MARKER_LEN);
                        if let Some(j) = memmem::find(&pending, &INFO_END) {
                            pending.truncate(j);
                            debug!(len = pending.len(), "found module info table");
                            return Ok(pending);
                        }
                        ScanState::Started { pending }
                    }
                    None => {
                        let keep = tail.len().min(MARKER_LEN - 1);
                        tail.drain(..tail.len() - keep);
                        ScanState::Seeking { tail }
                    }
                }
            }
            ScanState::Started { mut pending } => {
                // The end marker may straddle the boundary, so rescan from
                // MARKER_LEN - 1 bytes before the newly appended data.
                let search_from = pending.len().saturating_sub(MARKER_LEN - 1);
                pending.extend_from_slice(&data);
                if let Some(j) = memmem::find(&pending[search_from..], &INFO_END) {
                    pending.truncate(search_from + j);
                    debug!(len = pending.len(), "found module info table");
                    return Ok(pending);
                }
                if pending.len() > MAX_TABLE_SIZE + MARKER_LEN {
                    // No end marker within the table bound: not a real
                    // table. Resume seeking past this candidate.
                    let keep = pending.len().min(MARKER_LEN - 1);
                    pending.drain(..pending.len() - keep);
                    ScanState::Seeking { tail: pending }
                } else {
                    ScanState::Started { pending }
                }
            }
        };
        addr += size;
    }
    Err(Error::NoModuleInfo)
}
