//! Core types for the persisted quad-tree:
//! - Error types and result types
//! - Record id alias
//! - Statistics structures

use std::io;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while writing, opening or traversing an index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid index format: {0}")]
    Format(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Index is closed")]
    Closed,
}

impl IndexError {
    /// The file is corrupt or not an index file.
    pub fn is_format(&self) -> bool {
        matches!(self, IndexError::Format(_))
    }

    /// The operation is never valid on this kind of tree.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, IndexError::Unsupported(_))
    }

    /// Maps an unexpected end of file to a format error. A record that ends
    /// early means the file is truncated, not that the disk failed.
    pub(crate) fn from_read(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            IndexError::Format(format!("truncated {}", what))
        } else {
            IndexError::Io(err)
        }
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Record number of an indexed shape
pub type ShapeId = u32;

// ============================================================================
// Statistics
// ============================================================================

/// Statistics about an opened index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub num_shapes: u32,
    pub max_depth: u32,
    /// Nodes decoded from the file so far, root included
    pub nodes_loaded: u64,
    /// Times the scrolling window was (re)loaded from the channel
    pub window_fills: u64,
}
