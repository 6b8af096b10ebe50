//! Quad-tree traits shared by the in-memory builder and the file-backed index.

use crate::envelope::Envelope;
use crate::quadtree::qix_types::{IndexResult, ShapeId};

/// Represents a quad-tree spatial index over record ids.
///
/// Both the mutable in-memory tree and the immutable file-backed tree
/// implement this trait; the file-backed one rejects every mutation.
pub trait QuadTree {
    /// Adds a record to the tree.
    fn insert(&mut self, shape_id: ShapeId, bounds: &Envelope) -> IndexResult<()>;

    /// Finds the ids of all records stored in nodes whose envelope
    /// intersects `query`. The result is a candidate set: callers refine it
    /// against the real geometries.
    fn search(&self, query: &Envelope) -> IndexResult<Vec<ShapeId>>;

    /// Total number of records in the tree.
    fn num_shapes(&self) -> u32;

    /// Maximum depth the tree was built with.
    fn max_depth(&self) -> u32;

    /// Removes empty subtrees. Returns `true` when the whole tree is empty.
    fn trim(&mut self) -> IndexResult<bool>;

    /// Releases any resources held by the tree.
    fn close(&self) -> IndexResult<()>;
}

/// Read access to a node of a tree that is about to be serialized.
pub trait IndexNode {
    fn envelope(&self) -> &Envelope;

    fn num_shape_ids(&self) -> usize;

    /// # Panics
    ///
    /// Panics if `index >= num_shape_ids()`.
    fn shape_id(&self, index: usize) -> ShapeId;

    fn num_sub_nodes(&self) -> usize;

    /// # Panics
    ///
    /// Panics if `index >= num_sub_nodes()`.
    fn sub_node(&self, index: usize) -> &Self;
}

/// A tree the [`IndexStore`](crate::IndexStore) can write to disk.
pub trait IndexSource: QuadTree {
    type Node: IndexNode;

    fn root(&self) -> &Self::Node;
}
