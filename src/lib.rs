//! Access to the module version metadata a build toolchain embeds into an
//! executable image.
//!
//! The toolchain writes a small tab-delimited table into the binary's
//! read-only data, bracketed by two fixed 16-byte markers. This crate
//! locates that table, in the running program's own image or in any
//! executable on disk, and answers three questions about the build: the
//! main package path, the main module identity, and the set of dependency
//! modules. A program can, for example, report the version of its own main
//! module in response to a `--version` flag.
//!
//! ```no_run
//! let table = modstamp::Table::read()?;
//! if let Some(main) = table.main_module() {
//!     println!("{} {}", main.path, main.version);
//! }
//! # Ok::<(), modstamp::Error>(())
//! ```
//!
//! ELF, PE, and Mach-O executables are supported. Binaries not produced
//! with the embedding convention yield [`Error::NoModuleInfo`], which is an
//! expected outcome rather than a defect of the file.

pub mod error;
pub mod formats;
pub mod locate;
pub mod logging;
pub mod scan;
pub mod table;

pub use error::{Error, Result};
pub use formats::{open, AddressMapped, AddressRange, Endianness, Exe, Format};
pub use locate::{locate, INFO_END, INFO_START};
pub use table::{Module, Table, Version};
