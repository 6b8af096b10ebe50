//! Mutable in-memory quad-tree used to build an index before storing it.

use log::debug;

use crate::envelope::Envelope;
use crate::quadtree::qix_constants::MIN_DEFAULT_MAX_DEPTH;
use crate::quadtree::qix_types::{IndexError, IndexResult, ShapeId};
use crate::spatial_tree::{IndexNode, IndexSource, QuadTree};

/// A node of a [`MemoryQuadTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    envelope: Envelope,
    shape_ids: Vec<ShapeId>,
    sub_nodes: Vec<MemoryNode>,
}

impl MemoryNode {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            shape_ids: Vec::new(),
            sub_nodes: Vec::new(),
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn set_envelope(&mut self, envelope: Envelope) {
        self.envelope = envelope;
    }

    pub fn shape_ids(&self) -> &[ShapeId] {
        &self.shape_ids
    }

    pub fn sub_nodes(&self) -> &[MemoryNode] {
        &self.sub_nodes
    }

    pub fn add_shape_id(&mut self, shape_id: ShapeId) {
        self.shape_ids.push(shape_id);
    }

    /// Removes the first occurrence of `shape_id`. Returns whether it was present.
    pub fn remove_shape_id(&mut self, shape_id: ShapeId) -> bool {
        match self.shape_ids.iter().position(|id| *id == shape_id) {
            Some(pos) => {
                self.shape_ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn add_sub_node(&mut self, node: MemoryNode) {
        self.sub_nodes.push(node);
    }

    pub fn remove_sub_node(&mut self, index: usize) -> Option<MemoryNode> {
        if index < self.sub_nodes.len() {
            Some(self.sub_nodes.remove(index))
        } else {
            None
        }
    }

    /// Drops all ids and children, keeping the envelope.
    pub fn clear(&mut self) {
        self.shape_ids.clear();
        self.sub_nodes.clear();
    }

    fn is_empty(&self) -> bool {
        self.shape_ids.is_empty() && self.sub_nodes.is_empty()
    }

    fn insert(&mut self, shape_id: ShapeId, bounds: &Envelope, depth: u32) {
        if depth > 1 {
            if let Some(child) = self
                .sub_nodes
                .iter_mut()
                .find(|child| child.envelope.contains(bounds))
            {
                child.insert(shape_id, bounds, depth - 1);
                return;
            }

            if self.sub_nodes.is_empty() {
                let quads = self.envelope.quadrants();
                if quads.iter().any(|quad| quad.contains(bounds)) {
                    self.sub_nodes = quads.iter().map(|quad| MemoryNode::new(*quad)).collect();
                    self.insert(shape_id, bounds, depth);
                    return;
                }
            }
        }

        self.shape_ids.push(shape_id);
    }

    /// Post-order trim. Returns `true` when this node ended up empty.
    fn trim(&mut self) -> bool {
        self.sub_nodes.retain_mut(|child| !child.trim());

        if self.sub_nodes.len() == 1 && self.shape_ids.is_empty() {
            if let Some(only) = self.sub_nodes.pop() {
                *self = only;
            }
        }

        self.is_empty()
    }

    fn search(&self, query: &Envelope, results: &mut Vec<ShapeId>) {
        if !self.envelope.intersects(query) {
            return;
        }
        results.extend_from_slice(&self.shape_ids);
        for child in &self.sub_nodes {
            child.search(query, results);
        }
    }

    fn count_nodes(&self) -> usize {
        1 + self.sub_nodes.iter().map(MemoryNode::count_nodes).sum::<usize>()
    }
}

impl IndexNode for MemoryNode {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn num_shape_ids(&self) -> usize {
        self.shape_ids.len()
    }

    fn shape_id(&self, index: usize) -> ShapeId {
        self.shape_ids[index]
    }

    fn num_sub_nodes(&self) -> usize {
        self.sub_nodes.len()
    }

    fn sub_node(&self, index: usize) -> &Self {
        &self.sub_nodes[index]
    }
}

/// Quad-tree held entirely in memory.
///
/// Records descend into the deepest node whose envelope fully contains them,
/// down to `max_depth` levels. Nodes are split into four quadrants lazily,
/// the first time a record fits one of them.
///
/// # Example
///
/// ```rust
/// use qix_index::{Envelope, MemoryQuadTree, QuadTree};
///
/// let mut tree = MemoryQuadTree::new(Envelope::new(0.0, 0.0, 100.0, 100.0), 8).unwrap();
/// tree.insert(1, &Envelope::new(1.0, 1.0, 2.0, 2.0)).unwrap();
/// tree.insert(2, &Envelope::new(80.0, 80.0, 90.0, 90.0)).unwrap();
///
/// let hits = tree.search(&Envelope::new(0.0, 0.0, 10.0, 10.0)).unwrap();
/// assert_eq!(hits, vec![1]);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryQuadTree {
    root: MemoryNode,
    num_shapes: u32,
    max_depth: u32,
}

impl MemoryQuadTree {
    /// Creates an empty tree covering `bounds`.
    pub fn new(bounds: Envelope, max_depth: u32) -> IndexResult<Self> {
        if max_depth == 0 {
            return Err(IndexError::InvalidInput("max depth must be at least 1".into()));
        }
        if !bounds.is_finite() || bounds.is_empty() {
            return Err(IndexError::InvalidInput(format!(
                "tree bounds must be finite and non-empty, got {}",
                bounds
            )));
        }
        Ok(Self {
            root: MemoryNode::new(bounds),
            num_shapes: 0,
            max_depth,
        })
    }

    /// Builds a tree from `(shape_id, bounds)` pairs. The tree covers the
    /// union of all bounds and uses [`default_max_depth`](Self::default_max_depth).
    pub fn from_records<I>(records: I, leaf_size: usize) -> IndexResult<Self>
    where
        I: IntoIterator<Item = (ShapeId, Envelope)>,
    {
        let records: Vec<_> = records.into_iter().collect();
        let mut bounds = Envelope::empty();
        for (_, env) in &records {
            bounds.expand(env);
        }
        if records.is_empty() {
            bounds = Envelope::new(0.0, 0.0, 0.0, 0.0);
        }

        let mut tree = Self::new(bounds, Self::default_max_depth(records.len(), leaf_size))?;
        for (shape_id, env) in &records {
            tree.insert(*shape_id, env)?;
        }
        debug!(
            "built quad-tree with {} records, {} nodes, max depth {}",
            tree.num_shapes,
            tree.node_count(),
            tree.max_depth
        );
        Ok(tree)
    }

    /// Smallest depth whose leaf level can hold `num_records` at
    /// `leaf_size` records per leaf, never less than 10.
    pub fn default_max_depth(num_records: usize, leaf_size: usize) -> u32 {
        let leaf_size = leaf_size.max(1) as u64;
        let mut depth = 0u32;
        let mut nodes = 1u64;
        while nodes.saturating_mul(leaf_size) < num_records as u64 {
            depth += 1;
            nodes = nodes.saturating_mul(4);
        }
        depth.max(MIN_DEFAULT_MAX_DEPTH)
    }

    pub fn root_node(&self) -> &MemoryNode {
        &self.root
    }

    /// Mutable access to the root, for callers assembling a tree by hand.
    pub fn root_node_mut(&mut self) -> &mut MemoryNode {
        &mut self.root
    }

    /// Overrides the record count written to the tree header.
    pub fn set_num_shapes(&mut self, num_shapes: u32) {
        self.num_shapes = num_shapes;
    }

    pub fn node_count(&self) -> usize {
        self.root.count_nodes()
    }
}

impl QuadTree for MemoryQuadTree {
    fn insert(&mut self, shape_id: ShapeId, bounds: &Envelope) -> IndexResult<()> {
        if !bounds.is_finite() || bounds.is_empty() {
            return Err(IndexError::InvalidInput(format!(
                "record {} has invalid bounds {}",
                shape_id, bounds
            )));
        }
        if !self.root.envelope.contains(bounds) {
            self.root.envelope.expand(bounds);
        }

        self.root.insert(shape_id, bounds, self.max_depth);
        self.num_shapes = self.num_shapes.saturating_add(1);
        Ok(())
    }

    fn search(&self, query: &Envelope) -> IndexResult<Vec<ShapeId>> {
        let mut results = Vec::new();
        self.root.search(query, &mut results);
        Ok(results)
    }

    fn num_shapes(&self) -> u32 {
        self.num_shapes
    }

    fn max_depth(&self) -> u32 {
        self.max_depth
    }

    fn trim(&mut self) -> IndexResult<bool> {
        Ok(self.root.trim())
    }

    fn close(&self) -> IndexResult<()> {
        Ok(())
    }
}

impl IndexSource for MemoryQuadTree {
    type Node = MemoryNode;

    fn root(&self) -> &MemoryNode {
        &self.root
    }
}
