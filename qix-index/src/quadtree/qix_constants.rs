//! Constants for the persisted quad-tree file format.

/// Signature at the start of every headered index file
pub const SIGNATURE: &[u8; 3] = b"SQT";

/// File format version written by this crate
pub const VERSION: u8 = 1;

/// Version reported for legacy headerless files
pub const LEGACY_VERSION: u8 = 0;

/// Size of the optional file header in bytes
pub const HEADER_SIZE: usize = 8;

/// Size of the tree header (`numShapes`, `maxDepth`) in bytes
pub const TREE_HEADER_SIZE: usize = 8;

/// Minimum size of the scrolling read window (8KB)
pub const MIN_BUFFER_SIZE: usize = 8192;

/// Serialized size of a node envelope (4 x f64)
pub const ENVELOPE_SIZE: usize = 4 * 8;

/// Fixed part of a node record: offset + envelope + id count + child count
pub const NODE_FIXED_SIZE: usize = 4 + ENVELOPE_SIZE + 4 + 4;

/// Lower bound used when no depth is requested for a new in-memory tree
pub const MIN_DEFAULT_MAX_DEPTH: u32 = 10;
