//! Node records: the recursive writer and the lazily-expanded reader.
//!
//! A node record is laid out as
//!
//! ```text
//! u32      subtree size (bytes of all descendant records)
//! 4 x f64  envelope (min_x, min_y, max_x, max_y)
//! u32      number of shape ids
//! u32[n]   shape ids
//! u32      number of sub nodes
//! ...      sub node records, depth first, no gaps
//! ```
//!
//! Nothing points at a child. The first child starts right after its parent's
//! fixed fields and every following sibling starts where the previous
//! sibling's subtree ends.

use std::io::{Read, Seek, Write};
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use super::byte_order::Endianness;
use super::qix_constants::NODE_FIXED_SIZE;
use super::qix_types::{IndexError, IndexResult, ShapeId};
use super::scrolling_buffer::ScrollingBuffer;
use crate::envelope::Envelope;
use crate::spatial_tree::IndexNode;

// ============================================================================
// Write path
// ============================================================================

/// Serialized size of the node's own record, children excluded.
pub fn record_size<N: IndexNode>(node: &N) -> u64 {
    NODE_FIXED_SIZE as u64 + 4 * node.num_shape_ids() as u64
}

/// Total serialized size of all descendants of `node`.
pub fn sub_node_offset<N: IndexNode>(node: &N) -> u64 {
    (0..node.num_sub_nodes())
        .map(|i| {
            let child = node.sub_node(i);
            record_size(child) + sub_node_offset(child)
        })
        .sum()
}

/// Writes `node` and its whole subtree, pre-order.
pub fn write_node<N: IndexNode, W: Write>(
    node: &N,
    writer: &mut W,
    endianness: Endianness,
) -> IndexResult<()> {
    let offset = sub_node_offset(node);
    let offset = u32::try_from(offset).map_err(|_| {
        IndexError::InvalidInput(format!(
            "subtree of {} bytes does not fit the 32-bit offset field",
            offset
        ))
    })?;

    let mut buf = Vec::with_capacity(record_size(node) as usize);
    let env = node.envelope();
    endianness.write_u32(&mut buf, offset)?;
    endianness.write_f64(&mut buf, env.min_x)?;
    endianness.write_f64(&mut buf, env.min_y)?;
    endianness.write_f64(&mut buf, env.max_x)?;
    endianness.write_f64(&mut buf, env.max_y)?;
    endianness.write_u32(&mut buf, count_field(node.num_shape_ids())?)?;
    for i in 0..node.num_shape_ids() {
        endianness.write_u32(&mut buf, node.shape_id(i))?;
    }
    endianness.write_u32(&mut buf, count_field(node.num_sub_nodes())?)?;
    writer.write_all(&buf)?;

    for i in 0..node.num_sub_nodes() {
        write_node(node.sub_node(i), writer, endianness)?;
    }
    Ok(())
}

fn count_field(count: usize) -> IndexResult<u32> {
    u32::try_from(count)
        .map_err(|_| IndexError::InvalidInput(format!("count {} exceeds u32", count)))
}

// ============================================================================
// Read path
// ============================================================================

/// A node decoded from an index file.
///
/// Its own fields are read eagerly; children are read on first access through
/// [`sub_node`](Self::sub_node) and then kept for the life of the tree.
pub struct FileSystemNode {
    envelope: Envelope,
    shape_ids: Vec<ShapeId>,
    num_sub_nodes: usize,
    /// Absolute offset of this node's record
    record_start: u64,
    /// Absolute offset where the first child record begins
    sub_node_start_byte: u64,
    /// Bytes taken by all descendant records
    sub_nodes_length: u32,
    /// Children materialized so far, always a prefix of the child list
    sub_nodes: RwLock<Vec<Arc<FileSystemNode>>>,
}

impl std::fmt::Debug for FileSystemNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemNode")
            .field("envelope", &self.envelope)
            .field("shape_ids", &self.shape_ids.len())
            .field("num_sub_nodes", &self.num_sub_nodes)
            .field("record_start", &self.record_start)
            .field("sub_nodes_length", &self.sub_nodes_length)
            .finish()
    }
}

impl FileSystemNode {
    /// Decodes one node record at the buffer's current position.
    pub fn read_node<R: Read + Seek>(
        buffer: &mut ScrollingBuffer<R>,
    ) -> IndexResult<FileSystemNode> {
        let record_start = buffer.position();
        let sub_nodes_length = buffer.get_u32()?;
        let min_x = buffer.get_double()?;
        let min_y = buffer.get_double()?;
        let max_x = buffer.get_double()?;
        let max_y = buffer.get_double()?;
        let num_shape_ids = buffer.get_u32()? as usize;
        let shape_ids = buffer.get_u32_array(num_shape_ids)?;
        let num_sub_nodes = buffer.get_u32()? as usize;
        let sub_node_start_byte = buffer.position();

        // each child record takes at least the fixed part
        if (num_sub_nodes as u64) * (NODE_FIXED_SIZE as u64) > sub_nodes_length as u64 {
            return Err(IndexError::Format(format!(
                "node at offset {} claims {} sub nodes in {} bytes",
                record_start, num_sub_nodes, sub_nodes_length
            )));
        }

        trace!(
            "read node at offset {} ({} ids, {} sub nodes)",
            record_start,
            num_shape_ids,
            num_sub_nodes
        );

        Ok(FileSystemNode {
            envelope: Envelope::new(min_x, min_y, max_x, max_y),
            shape_ids,
            num_sub_nodes,
            record_start,
            sub_node_start_byte,
            sub_nodes_length,
            sub_nodes: RwLock::new(Vec::with_capacity(num_sub_nodes)),
        })
    }

    /// Returns child `index`, reading it (and any unread older sibling) from
    /// `buffer` on first access.
    pub fn sub_node<R: Read + Seek>(
        &self,
        index: usize,
        buffer: &mut ScrollingBuffer<R>,
    ) -> IndexResult<Arc<FileSystemNode>> {
        if index >= self.num_sub_nodes {
            return Err(IndexError::InvalidInput(format!(
                "sub node {} requested from a node with {} sub nodes",
                index, self.num_sub_nodes
            )));
        }
        if let Some(node) = self.sub_nodes.read().get(index) {
            return Ok(node.clone());
        }

        let mut sub_nodes = self.sub_nodes.write();
        while sub_nodes.len() <= index {
            let start = match sub_nodes.last() {
                None => self.sub_node_start_byte,
                Some(previous) => previous.end_byte(),
            };
            if start >= self.end_byte() {
                return Err(IndexError::Format(format!(
                    "sub node {} of node at offset {} lies outside its subtree",
                    sub_nodes.len(),
                    self.record_start
                )));
            }

            buffer.go_to(start)?;
            let node = Self::read_node(buffer)?;
            if node.end_byte() > self.end_byte() {
                return Err(IndexError::Format(format!(
                    "sub node at offset {} overruns its parent subtree",
                    start
                )));
            }
            sub_nodes.push(Arc::new(node));
        }
        Ok(sub_nodes[index].clone())
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn shape_ids(&self) -> &[ShapeId] {
        &self.shape_ids
    }

    pub fn num_shape_ids(&self) -> usize {
        self.shape_ids.len()
    }

    /// Id at `index`, or `None` past the end of the node's ids.
    pub fn shape_id(&self, index: usize) -> Option<ShapeId> {
        self.shape_ids.get(index).copied()
    }

    pub fn num_sub_nodes(&self) -> usize {
        self.num_sub_nodes
    }

    /// Children already read from the file.
    pub fn loaded_sub_nodes(&self) -> usize {
        self.sub_nodes.read().len()
    }

    pub fn record_start(&self) -> u64 {
        self.record_start
    }

    pub fn sub_node_start_byte(&self) -> u64 {
        self.sub_node_start_byte
    }

    pub fn sub_nodes_length(&self) -> u32 {
        self.sub_nodes_length
    }

    /// First byte after this node's subtree, where its next sibling starts.
    pub fn end_byte(&self) -> u64 {
        self.sub_node_start_byte + self.sub_nodes_length as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_quadtree::MemoryNode;
    use crate::quadtree::scrolling_buffer::tests::CountingReader;
    use std::io::Cursor;

    fn node(env: Envelope, ids: &[ShapeId], children: Vec<MemoryNode>) -> MemoryNode {
        let mut node = MemoryNode::new(env);
        for id in ids {
            node.add_shape_id(*id);
        }
        for child in children {
            node.add_sub_node(child);
        }
        node
    }

    /// root(ids 1,2)
    ///  ├─ a(ids 10,11,12)
    ///  │   ├─ a1(id 100)
    ///  │   └─ a2()
    ///  ├─ b(id 20)
    ///  └─ c(ids 30,31)
    ///      └─ c1(ids 300,301,302,303)
    fn three_level_fixture() -> MemoryNode {
        let a = node(
            Envelope::new(0.0, 0.0, 5.0, 5.0),
            &[10, 11, 12],
            vec![
                node(Envelope::new(0.0, 0.0, 2.0, 2.0), &[100], vec![]),
                node(Envelope::new(3.0, 3.0, 5.0, 5.0), &[], vec![]),
            ],
        );
        let b = node(Envelope::new(5.0, 0.0, 10.0, 5.0), &[20], vec![]);
        let c = node(
            Envelope::new(0.0, 5.0, 10.0, 10.0),
            &[30, 31],
            vec![node(Envelope::new(6.0, 6.0, 9.0, 9.0), &[300, 301, 302, 303], vec![])],
        );
        node(Envelope::new(0.0, 0.0, 10.0, 10.0), &[1, 2], vec![a, b, c])
    }

    fn serialize(root: &MemoryNode, endianness: Endianness) -> Vec<u8> {
        let mut out = Vec::new();
        write_node(root, &mut out, endianness).unwrap();
        out
    }

    #[test]
    fn test_record_sizes() {
        let root = three_level_fixture();
        assert_eq!(record_size(&root), 44 + 8);
        // a: 56 + a1: 48 + a2: 44 = 148; b: 48; c: 52 + c1: 60 = 112
        assert_eq!(sub_node_offset(root.sub_node(0)), 48 + 44);
        assert_eq!(sub_node_offset(&root), 148 + 48 + 112);
    }

    #[test]
    fn test_written_layout() {
        let root = node(Envelope::new(1.0, 2.0, 3.0, 4.0), &[7], vec![]);
        let bytes = serialize(&root, Endianness::Big);

        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(Endianness::Big.read_f64(&bytes[4..12]), 1.0);
        assert_eq!(Endianness::Big.read_f64(&bytes[12..20]), 2.0);
        assert_eq!(Endianness::Big.read_f64(&bytes[20..28]), 3.0);
        assert_eq!(Endianness::Big.read_f64(&bytes[28..36]), 4.0);
        assert_eq!(&bytes[36..40], &[0, 0, 0, 1]);
        assert_eq!(&bytes[40..44], &[0, 0, 0, 7]);
        assert_eq!(&bytes[44..48], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_sibling_offsets_on_three_level_fixture() {
        let bytes = serialize(&three_level_fixture(), Endianness::Little);
        assert_eq!(bytes.len(), 52 + 308);

        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Little).unwrap();
        let root = FileSystemNode::read_node(&mut buffer).unwrap();
        assert_eq!(root.record_start(), 0);
        assert_eq!(root.sub_node_start_byte(), 52);
        assert_eq!(root.sub_nodes_length(), 308);

        // siblings resolve at start + sum of previous subtree sizes
        let c = root.sub_node(2, &mut buffer).unwrap();
        assert_eq!(c.record_start(), 52 + 148 + 48);
        assert_eq!(c.shape_ids(), &[30, 31]);
        assert_eq!(root.loaded_sub_nodes(), 3);

        let a = root.sub_node(0, &mut buffer).unwrap();
        assert_eq!(a.record_start(), 52);
        let b = root.sub_node(1, &mut buffer).unwrap();
        assert_eq!(b.record_start(), 52 + 148);
        assert_eq!(b.shape_ids(), &[20]);

        let a2 = a.sub_node(1, &mut buffer).unwrap();
        assert_eq!(a2.record_start(), 52 + 56 + 48);
        assert_eq!(a2.num_shape_ids(), 0);
        assert_eq!(a2.envelope(), &Envelope::new(3.0, 3.0, 5.0, 5.0));

        let c1 = c.sub_node(0, &mut buffer).unwrap();
        assert_eq!(c1.record_start(), 52 + 148 + 48 + 52);
        assert_eq!(c1.shape_ids(), &[300, 301, 302, 303]);
        assert_eq!(c1.end_byte(), 360);
    }

    #[test]
    fn test_shape_id_out_of_range() {
        let bytes = serialize(&three_level_fixture(), Endianness::Little);
        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Little).unwrap();
        let root = FileSystemNode::read_node(&mut buffer).unwrap();

        assert_eq!(root.shape_id(0), Some(1));
        assert_eq!(root.shape_id(1), Some(2));
        assert_eq!(root.shape_id(2), None);
    }

    #[test]
    fn test_children_are_read_once() {
        let bytes = serialize(&three_level_fixture(), Endianness::Big);
        let (reader, _reads) = CountingReader::new(Cursor::new(bytes));
        let mut buffer = ScrollingBuffer::new(reader, Endianness::Big).unwrap();
        let root = FileSystemNode::read_node(&mut buffer).unwrap();

        let first = root.sub_node(1, &mut buffer).unwrap();
        let position = buffer.position();
        let second = root.sub_node(1, &mut buffer).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(buffer.position(), position);
    }

    #[test]
    fn test_sub_node_out_of_range() {
        let bytes = serialize(&three_level_fixture(), Endianness::Big);
        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        let root = FileSystemNode::read_node(&mut buffer).unwrap();

        let err = root.sub_node(3, &mut buffer).unwrap_err();
        assert!(matches!(err, IndexError::InvalidInput(_)));
    }

    #[test]
    fn test_corrupt_sub_node_count_is_format_error() {
        let leaf = node(Envelope::new(0.0, 0.0, 1.0, 1.0), &[], vec![]);
        let mut bytes = serialize(&leaf, Endianness::Big);
        // claim five children in an empty subtree
        bytes[40..44].copy_from_slice(&[0, 0, 0, 5]);

        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        assert!(FileSystemNode::read_node(&mut buffer).unwrap_err().is_format());
    }

    #[test]
    fn test_truncated_child_is_format_error() {
        let mut bytes = serialize(&three_level_fixture(), Endianness::Big);
        bytes.truncate(52 + 20);

        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        let root = FileSystemNode::read_node(&mut buffer).unwrap();
        assert!(root.sub_node(0, &mut buffer).unwrap_err().is_format());
    }
}
