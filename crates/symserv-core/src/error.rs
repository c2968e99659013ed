//! Error taxonomy for symbol lookup.
//!
//! Shaped like [`breakpad_symbols::SymbolError`][bp], extended with the
//! fetch-layer distinctions this service needs (transient network failure
//! vs. a definitive absence vs. a file that downloaded but carried nothing
//! useful).
//!
//! [bp]: https://docs.rs/breakpad-symbols/latest/breakpad_symbols/enum.SymbolError.html

use thiserror::Error;

/// Possible outcomes of trying to locate and load symbols for one module.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// No origin had the file. Safe to negative-cache.
    #[error("symbol file not found")]
    NotFound,

    /// The module lacked a debug file or debug id, so no path could be built.
    #[error("the debug file or id were missing")]
    MissingDebugFileOrId,

    /// Network or storage failure while fetching. This is *not* evidence the
    /// file is absent, so callers must not negative-cache it indefinitely.
    #[error("transient error fetching symbol file: {0}")]
    Transient(String),

    /// The file downloaded successfully but parsed to zero entries.
    #[error("symbol file downloaded but contained no usable entries")]
    Empty,

    /// The byte stream could not be read to completion.
    #[error("couldn't read input stream")]
    LoadError(#[from] std::io::Error),
}

impl PartialEq for SymbolError {
    fn eq(&self, other: &SymbolError) -> bool {
        matches!(
            (self, other),
            (SymbolError::NotFound, SymbolError::NotFound)
                | (
                    SymbolError::MissingDebugFileOrId,
                    SymbolError::MissingDebugFileOrId
                )
                | (SymbolError::Transient(_), SymbolError::Transient(_))
                | (SymbolError::Empty, SymbolError::Empty)
                | (SymbolError::LoadError(_), SymbolError::LoadError(_))
        )
    }
}
