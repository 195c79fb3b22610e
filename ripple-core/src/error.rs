//! Error types.
//!
//! Extenders themselves never fail: unknown names are skipped and malformed
//! options are normalized. Errors only surface at the edges, when a cell is
//! written that cannot accept writes or when a configuration cannot be parsed.

use thiserror::Error;

use crate::reactive::CellId;

/// Errors produced by cells and configuration parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// A write was attempted on a computed cell without a write function.
    #[error("cell {0} is read-only")]
    NotWritable(CellId),

    /// An extender configuration document could not be parsed.
    #[error("invalid extender configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
