//! The public query surface over an extracted module table.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::formats;
use crate::locate;
use crate::scan::Scanner;

/// A version identifier, or [`Version::DEVEL`] when the build carried no
/// version metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Sentinel meaning "no version metadata available".
    pub const DEVEL: &'static str = "(devel)";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_devel(&self) -> bool {
        self.0 == Self::DEVEL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version(s.to_string())
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Version(s)
    }
}

/// Identity of one build unit: the main module or a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub path: String,
    pub version: Version,
}

/// The module information table embedded in an executable.
///
/// Owns the raw blob; every query runs an independent scan, so a shared
/// `&Table` can be queried repeatedly and concurrently.
#[derive(Debug, Clone)]
pub struct Table {
    buf: Vec<u8>,
}

impl Table {
    /// Read the table from the currently running executable.
    ///
    /// The usual caveats about resolving one's own executable path apply:
    /// the file that started the process may have been replaced or removed.
    pub fn read() -> Result<Table> {
        let exe_path = env::current_exe().map_err(Error::PathResolution)?;
        Self::read_from(exe_path)
    }

    /// Read the table from the executable at `path`.
    ///
    /// Opens the file, sniffs its format, scans the read-only data for the
    /// marker pair, and releases the handle before returning, on failure
    /// paths included.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Table> {
        let mut exe = formats::open(path)?;
        let found = locate::locate(&mut exe);
        exe.close();
        Ok(Table { buf: found? })
    }

    /// Wrap an already-extracted table blob.
    pub fn from_blob(buf: Vec<u8>) -> Table {
        Table { buf }
    }

    /// Path of the main package the executable was built from: the package
    /// containing the entry point, as opposed to the module containing it.
    ///
    /// Empty when the table carries no `path` row.
    pub fn main_package(&self) -> String {
        let mut sc = Scanner::new(&self.buf);
        while sc.scan() {
            if sc.has_keyword("path") {
                return lossy(sc.entry().path);
            }
        }
        String::new()
    }

    /// The main module the executable was built from, or `None` when the
    /// table carries no `mod` row. The version may be [`Version::DEVEL`].
    pub fn main_module(&self) -> Option<Module> {
        let mut sc = Scanner::new(&self.buf);
        while sc.scan() {
            if sc.has_keyword("mod") {
                let e = sc.entry();
                return Some(Module {
                    path: lossy(e.path),
                    version: Version(lossy(e.version)),
                });
            }
        }
        None
    }

    /// Map from dependency module path to its identity. Duplicate paths are
    /// resolved last-write-wins; the map may be empty.
    pub fn dependencies(&self) -> HashMap<String, Module> {
        let mut ret = HashMap::new();
        let mut sc = Scanner::new(&self.buf);
        while sc.scan() {
            if sc.has_keyword("dep") {
                let e = sc.entry();
                let path = lossy(e.path);
                ret.insert(
                    path.clone(),
                    Module {
                        path,
                        version: Version(lossy(e.version)),
                    },
                );
            }
        }
        ret
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_blob(
            b"path\texample.com/demo/cmd\n\
              mod\texample.com/demo\t(devel)\n\
              dep\texample.com/a\tv0.1.0\n\
              dep\texample.com/b\tv2.0.0\n"
                .to_vec(),
        )
    }

    #[test]
    fn test_main_package() {
        assert_eq!(sample().main_package(), "example.com/demo/cmd");
    }

    #[test]
    fn test_first_path_row_wins() {
        let t = Table::from_blob(b"path\tfirst\npath\tsecond\n".to_vec());
        assert_eq!(t.main_package(), "first");
    }

    #[test]
    fn test_main_module_devel() {
        let m = sample().main_module().expect("main module");
        assert_eq!(m.path, "example.com/demo");
        assert!(m.version.is_devel());
        assert_eq!(m.version.to_string(), "(devel)");
    }

    #[test]
    fn test_dependencies() {
        let deps = sample().dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps["example.com/a"].version.as_str(), "v0.1.0");
        assert_eq!(deps["example.com/b"].path, "example.com/b");
    }

    #[test]
    fn test_dependency_last_write_wins() {
        let t = Table::from_blob(
            b"dep\texample.com/a\tv0.1.0\ndep\texample.com/a\tv0.2.0\n".to_vec(),
        );
        let deps = t.dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps["example.com/a"].version.as_str(), "v0.2.0");
    }

    #[test]
    fn test_unrecognized_keyword_tolerated() {
        let t = Table::from_blob(
            b"future-thing\tx\ty\nmod\texample.com/demo\tv1.0.0\n".to_vec(),
        );
        assert_eq!(t.main_package(), "");
        assert_eq!(t.main_module().expect("mod").path, "example.com/demo");
        assert!(t.dependencies().is_empty());
    }

    #[test]
    fn test_absence_handling() {
        let t = Table::from_blob(Vec::new());
        assert_eq!(t.main_package(), "");
        assert!(t.main_module().is_none());
        let deps = t.dependencies();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_queries_are_idempotent() {
        let t = sample();
        assert_eq!(t.main_package(), t.main_package());
        assert_eq!(t.main_module(), t.main_module());
        assert_eq!(t.dependencies(), t.dependencies());
    }
}
