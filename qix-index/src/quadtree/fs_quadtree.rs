//! Immutable quad-tree backed by an index file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::byte_order::{ByteOrderCode, IndexHeader};
use super::fs_node::FileSystemNode;
use super::qix_constants::MIN_BUFFER_SIZE;
use super::qix_types::{IndexError, IndexResult, IndexStats, ShapeId};
use super::scrolling_buffer::ScrollingBuffer;
use crate::envelope::Envelope;
use crate::spatial_tree::QuadTree;

/// Read-only view over a serialized quad-tree.
///
/// Opening reads the header, the tree header and the root node's own fields,
/// nothing more. Children are read when a traversal first reaches them and
/// are then kept in memory.
///
/// The tree owns its channel until [`close`](QuadTree::close) is called or
/// the tree is dropped. All nodes share one [`ScrollingBuffer`]; concurrent
/// traversals of the same tree are serialized on it. Load the file again to
/// get an independent session.
pub struct FileSystemQuadTree<R = File> {
    header: IndexHeader,
    num_shapes: u32,
    max_depth: u32,
    root: Arc<FileSystemNode>,
    buffer: Mutex<Option<ScrollingBuffer<R>>>,
    nodes_loaded: AtomicU64,
}

impl<R: Read + Seek> FileSystemQuadTree<R> {
    /// Opens a tree from the start of `channel`.
    pub fn load(channel: R) -> IndexResult<Self> {
        Self::load_with_buffer_size(channel, MIN_BUFFER_SIZE)
    }

    /// Opens a tree with a larger initial read window.
    pub fn load_with_buffer_size(mut channel: R, buffer_size: usize) -> IndexResult<Self> {
        channel.seek(SeekFrom::Start(0))?;
        let header = IndexHeader::read_from(&mut channel)?;
        if header.is_legacy() {
            // no header: the tree header starts at byte 0
            channel.seek(SeekFrom::Start(0))?;
        }

        let mut buffer = ScrollingBuffer::with_capacity(
            channel,
            header.byte_order().endianness(),
            buffer_size,
        )?;
        let num_shapes = buffer.get_u32()?;
        let max_depth = buffer.get_u32()?;
        let root = FileSystemNode::read_node(&mut buffer)?;

        debug!(
            "loaded quad-tree: {} shapes, max depth {}, byte order {:?}, version {}",
            num_shapes,
            max_depth,
            header.byte_order(),
            header.version()
        );

        Ok(Self {
            header,
            num_shapes,
            max_depth,
            root: Arc::new(root),
            buffer: Mutex::new(Some(buffer)),
            nodes_loaded: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> Arc<FileSystemNode> {
        self.root.clone()
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn byte_order(&self) -> ByteOrderCode {
        self.header.byte_order()
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.lock().is_none()
    }

    /// Returns child `index` of `node`, reading it on first access.
    pub fn sub_node(
        &self,
        node: &FileSystemNode,
        index: usize,
    ) -> IndexResult<Arc<FileSystemNode>> {
        let mut guard = self.buffer.lock();
        let buffer = guard.as_mut().ok_or(IndexError::Closed)?;
        self.tracked_sub_node(node, index, buffer)
    }

    /// Current statistics. Window fills read as zero once the tree is closed.
    pub fn stats(&self) -> IndexStats {
        let window_fills = self
            .buffer
            .lock()
            .as_ref()
            .map(|buffer| buffer.fill_count())
            .unwrap_or(0);

        IndexStats {
            num_shapes: self.num_shapes,
            max_depth: self.max_depth,
            nodes_loaded: self.nodes_loaded.load(Ordering::Relaxed),
            window_fills,
        }
    }

    fn tracked_sub_node(
        &self,
        node: &FileSystemNode,
        index: usize,
        buffer: &mut ScrollingBuffer<R>,
    ) -> IndexResult<Arc<FileSystemNode>> {
        let before = node.loaded_sub_nodes();
        let child = node.sub_node(index, buffer)?;
        let read = node.loaded_sub_nodes() - before;
        if read > 0 {
            self.nodes_loaded.fetch_add(read as u64, Ordering::Relaxed);
        }
        Ok(child)
    }
}

impl<R: Read + Seek> QuadTree for FileSystemQuadTree<R> {
    fn insert(&mut self, shape_id: ShapeId, _bounds: &Envelope) -> IndexResult<()> {
        Err(IndexError::Unsupported(format!(
            "cannot insert record {} into a file-backed quad-tree",
            shape_id
        )))
    }

    /// Depth-first search; any read failure aborts the whole query.
    fn search(&self, query: &Envelope) -> IndexResult<Vec<ShapeId>> {
        let mut guard = self.buffer.lock();
        let buffer = guard.as_mut().ok_or(IndexError::Closed)?;

        let mut results = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if !node.envelope().intersects(query) {
                continue;
            }
            results.extend_from_slice(node.shape_ids());

            // pushed in reverse so children are visited in file order
            for index in (0..node.num_sub_nodes()).rev() {
                stack.push(self.tracked_sub_node(&node, index, buffer)?);
            }
        }
        Ok(results)
    }

    fn num_shapes(&self) -> u32 {
        self.num_shapes
    }

    fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// A persisted tree is already trimmed.
    fn trim(&mut self) -> IndexResult<bool> {
        Ok(false)
    }

    fn close(&self) -> IndexResult<()> {
        if self.buffer.lock().take().is_some() {
            debug!("closed quad-tree index channel");
        }
        Ok(())
    }
}
