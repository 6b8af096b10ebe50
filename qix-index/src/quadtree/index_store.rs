//! Writes quad-trees to `.qix` files and opens them again.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::byte_order::{ByteOrderCode, IndexHeader};
use super::fs_node::write_node;
use super::fs_quadtree::FileSystemQuadTree;
use super::qix_config::IndexStoreConfig;
use super::qix_types::IndexResult;
use crate::spatial_tree::IndexSource;

/// A quad-tree index file on disk.
///
/// # Examples
///
/// ```rust,no_run
/// use qix_index::{ByteOrderCode, Envelope, IndexStore, MemoryQuadTree, QuadTree};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut tree = MemoryQuadTree::new(Envelope::new(0.0, 0.0, 100.0, 100.0), 8)?;
/// tree.insert(0, &Envelope::new(1.0, 1.0, 2.0, 2.0))?;
///
/// let store = IndexStore::with_config()
///     .byte_order(ByteOrderCode::NewLsb)
///     .build("roads.qix");
/// store.store(&mut tree)?;
///
/// let loaded = store.load()?;
/// assert_eq!(loaded.search(&Envelope::new(0.0, 0.0, 5.0, 5.0))?, vec![0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
    config: IndexStoreConfig,
}

impl IndexStore {
    /// Creates a store for `path` writing in `byte_order`.
    pub fn new(path: impl AsRef<Path>, byte_order: ByteOrderCode) -> IndexStore {
        let mut config = IndexStoreConfig::new();
        config.set_byte_order(byte_order);
        IndexStore {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }

    /// Creates a new builder for configuring a store.
    pub fn with_config() -> IndexStoreBuilder {
        IndexStoreBuilder::new()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &IndexStoreConfig {
        &self.config
    }

    pub fn byte_order(&self) -> ByteOrderCode {
        self.config.byte_order()
    }

    /// Trims `tree` and writes it to the file, replacing any previous
    /// content.
    ///
    /// The file is flushed and synced even when writing fails. A failure
    /// during that cleanup is only logged when an earlier error is already
    /// being returned.
    pub fn store<T: IndexSource>(&self, tree: &mut T) -> IndexResult<()> {
        tree.trim()?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let source: &T = tree;

        write_then_finish(
            &mut writer,
            |writer| self.write_tree(source, writer),
            |writer| {
                writer.flush()?;
                writer.get_ref().sync_all()?;
                Ok(())
            },
        )?;

        debug!(
            "stored quad-tree with {} shapes to {} ({:?})",
            source.num_shapes(),
            self.path.display(),
            self.byte_order()
        );
        Ok(())
    }

    /// Opens the file and reads the tree header and root node.
    ///
    /// Every call opens its own channel, so the returned trees are
    /// independent of each other.
    pub fn load(&self) -> IndexResult<FileSystemQuadTree<File>> {
        let file = File::open(&self.path)?;
        debug!("loading quad-tree from {}", self.path.display());
        FileSystemQuadTree::load_with_buffer_size(file, self.config.buffer_size())
    }

    fn write_tree<T: IndexSource, W: Write>(
        &self,
        tree: &T,
        writer: &mut W,
    ) -> IndexResult<()> {
        let byte_order = self.byte_order();
        let endianness = byte_order.endianness();

        if byte_order.writes_header() {
            IndexHeader::new(byte_order).write_to(writer)?;
        }
        endianness.write_u32(writer, tree.num_shapes())?;
        endianness.write_u32(writer, tree.max_depth())?;
        write_node(tree.root(), writer, endianness)
    }
}

/// Runs `write` and then always `finish` on the same writer.
///
/// The first failure wins: when both fail, the `write` error is returned and
/// the `finish` error is only logged.
fn write_then_finish<W, F, C>(writer: &mut W, write: F, finish: C) -> IndexResult<()>
where
    F: FnOnce(&mut W) -> IndexResult<()>,
    C: FnOnce(&mut W) -> IndexResult<()>,
{
    let written = write(writer);
    let finished = finish(writer);

    match (written, finished) {
        (Ok(()), finished) => finished,
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(finish_err)) => {
            warn!("failed to close index file after a write error: {}", finish_err);
            Err(err)
        }
    }
}

/// Builder for an [`IndexStore`].
pub struct IndexStoreBuilder {
    config: IndexStoreConfig,
}

impl IndexStoreBuilder {
    pub fn new() -> Self {
        IndexStoreBuilder {
            config: IndexStoreConfig::new(),
        }
    }

    #[inline]
    pub fn byte_order(mut self, byte_order: ByteOrderCode) -> Self {
        self.config.set_byte_order(byte_order);
        self
    }

    #[inline]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.set_buffer_size(buffer_size);
        self
    }

    pub fn build(self, path: impl AsRef<Path>) -> IndexStore {
        IndexStore {
            path: path.as_ref().to_path_buf(),
            config: self.config,
        }
    }
}

impl Default for IndexStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
