//! Persisted quad-tree index (`.qix` files).
//!
//! This module reads and writes the on-disk quad-tree layout:
//! - An optional 8-byte header declaring byte order and format version
//! - A tree header with the record count and maximum depth
//! - Node records written depth first, each carrying the byte size of its
//!   subtree so siblings can be located without pointers
//!
//! Loading a file reads only the headers and the root node. Children are read
//! through a shared [`ScrollingBuffer`] the first time a traversal reaches
//! them, so opening a large index is cheap.

pub mod byte_order;
pub mod fs_node;
pub mod qix_config;
pub mod qix_constants;
pub mod qix_types;
pub mod scrolling_buffer;
mod fs_quadtree;
mod index_store;

pub use byte_order::{ByteOrderCode, Endianness, IndexHeader};
pub use fs_node::FileSystemNode;
pub use fs_quadtree::FileSystemQuadTree;
pub use index_store::{IndexStore, IndexStoreBuilder};
pub use qix_config::IndexStoreConfig;
pub use qix_constants::MIN_BUFFER_SIZE;
pub use qix_types::{IndexError, IndexResult, IndexStats, ShapeId};
pub use scrolling_buffer::ScrollingBuffer;
