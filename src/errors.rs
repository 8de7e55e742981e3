//! Domain error taxonomy
//!
//! Entry-level failures are reported with these variants so the apply loop
//! can warn and continue; anything raised before entry iteration begins is
//! surfaced through `anyhow` and aborts the run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing/invalid configuration: absent processName after merge,
    /// unknown preset name, launch timeout with a zero retry delay.
    #[error("config error: {0}")]
    Config(String),

    /// Malformed grid spec or out-of-bounds cell.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The process could not be started.
    #[error("launch failure: {0}")]
    Launch(String),

    /// A window-positioning call failed; the backend message is preserved.
    #[error("os call failed: {0}")]
    OsCall(String),
}
