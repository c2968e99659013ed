//! Key types that identify a module or a specific symbol file within it.
//!
//! See [`breakpad_sym_lookup`][bp] for a similar `(debug_file, debug_id) ->
//! relative path` derivation.
//!
//! [bp]: https://docs.rs/breakpad-symbols

use std::fmt;

use debugid::DebugId;

/// Identifies a module: `(debug_file, debug_id)`.
///
/// This is the key used by the symbol-map store (component D) and by the
/// symbolication engine's per-request module table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub debug_file: String,
    pub debug_id: DebugId,
}

impl ModuleKey {
    pub fn new(debug_file: impl Into<String>, debug_id: DebugId) -> Self {
        ModuleKey {
            debug_file: debug_file.into(),
            debug_id,
        }
    }

    /// The symbol filename this module's `.sym` file is expected to have.
    ///
    /// `strip_suffix(debug_file, ".pdb") + ".sym"` when `debug_file` ends in
    /// `.pdb`, else `debug_file + ".sym"`.
    pub fn symbol_filename(&self) -> String {
        derive_symbol_filename(&self.debug_file)
    }

    /// The download key for this module's own symbol file.
    pub fn download_key(&self) -> DownloadKey {
        DownloadKey {
            debug_file: self.debug_file.clone(),
            debug_id: self.debug_id,
            symbol_filename: self.symbol_filename(),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.debug_file, self.debug_id.breakpad())
    }
}

/// Identifies a single file to download: `(debug_file, debug_id, symbol_filename)`.
///
/// The download facade (component H) is trusted to pass a `symbol_filename`
/// that matches `debug_file`; it is not re-derived at that boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadKey {
    pub debug_file: String,
    pub debug_id: DebugId,
    pub symbol_filename: String,
}

impl DownloadKey {
    pub fn new(
        debug_file: impl Into<String>,
        debug_id: DebugId,
        symbol_filename: impl Into<String>,
    ) -> Self {
        DownloadKey {
            debug_file: debug_file.into(),
            debug_id,
            symbol_filename: symbol_filename.into(),
        }
    }

    /// The path segment used both to probe public origins over HTTP and to
    /// key private origins' object storage: `<debug_file>/<debug_id>/<symbol_filename>`.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.debug_file,
            self.debug_id.breakpad(),
            self.symbol_filename
        )
    }
}

impl fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path())
    }
}

fn derive_symbol_filename(debug_file: &str) -> String {
    match debug_file.strip_suffix(".pdb") {
        Some(stem) => format!("{stem}.sym"),
        None => format!("{debug_file}.sym"),
    }
}
