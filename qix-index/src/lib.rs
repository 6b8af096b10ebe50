//! # qix_index - Persisted Quad-Tree Spatial Index
//!
//! This crate builds quad-tree spatial indexes over record bounding boxes,
//! writes them to `.qix` files and queries them straight from disk.
//!
//! ## Features
//!
//! - **In-Memory Builder**: Insert record envelopes, trim, then persist
//! - **Lazy Loading**: Opening an index reads only the headers and root node
//! - **Scrolling Reads**: Nodes are decoded through a reusable read window
//! - **Byte Order Aware**: Little and big endian files, with or without header
//! - **Legacy Files**: Headerless files from older writers are detected
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qix_index::{ByteOrderCode, Envelope, IndexStore, MemoryQuadTree, QuadTree};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Build a tree in memory
//! let records = vec![
//!     (0, Envelope::new(0.0, 0.0, 1.0, 1.0)),
//!     (1, Envelope::new(10.0, 10.0, 12.0, 11.0)),
//! ];
//! let mut tree = MemoryQuadTree::from_records(records, 8)?;
//!
//! // Persist it
//! let store = IndexStore::new("parcels.qix", ByteOrderCode::NewMsb);
//! store.store(&mut tree)?;
//!
//! // Query the file
//! let index = store.load()?;
//! let candidates = index.search(&Envelope::new(9.0, 9.0, 11.0, 11.0))?;
//! index.close()?;
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod memory_quadtree;
pub mod quadtree;
pub mod spatial_tree;

pub use envelope::Envelope;
pub use memory_quadtree::{MemoryNode, MemoryQuadTree};
pub use spatial_tree::{IndexNode, IndexSource, QuadTree};

pub use quadtree::{
    ByteOrderCode, Endianness, FileSystemNode, FileSystemQuadTree, IndexError, IndexHeader,
    IndexResult, IndexStats, IndexStore, IndexStoreBuilder, IndexStoreConfig, ScrollingBuffer,
    ShapeId,
};
