use super::byte_order::ByteOrderCode;
use super::qix_constants::MIN_BUFFER_SIZE;

/// Settings shared by every store and load performed through an
/// [`IndexStore`](super::IndexStore).
///
/// Defaults:
/// - byte order: [`ByteOrderCode::NewMsb`], with a header
/// - buffer size: [`MIN_BUFFER_SIZE`] bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStoreConfig {
    byte_order: ByteOrderCode,
    buffer_size: usize,
}

impl IndexStoreConfig {
    #[inline]
    pub fn new() -> IndexStoreConfig {
        IndexStoreConfig {
            byte_order: ByteOrderCode::default(),
            buffer_size: MIN_BUFFER_SIZE,
        }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrderCode {
        self.byte_order
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline]
    pub fn set_byte_order(&mut self, byte_order: ByteOrderCode) {
        self.byte_order = byte_order;
    }

    /// Sets the initial read window. Sizes below [`MIN_BUFFER_SIZE`] are
    /// raised to it.
    #[inline]
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
    }
}

impl Default for IndexStoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexStoreConfig::default();
        assert_eq!(config.byte_order(), ByteOrderCode::NewMsb);
        assert_eq!(config.buffer_size(), MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_small_buffer_is_raised() {
        let mut config = IndexStoreConfig::new();
        config.set_buffer_size(16);
        assert_eq!(config.buffer_size(), MIN_BUFFER_SIZE);

        config.set_buffer_size(MIN_BUFFER_SIZE * 4);
        assert_eq!(config.buffer_size(), MIN_BUFFER_SIZE * 4);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut config = IndexStoreConfig::new();
        let copy = config.clone();
        config.set_byte_order(ByteOrderCode::NewLsb);

        assert_eq!(copy.byte_order(), ByteOrderCode::NewMsb);
        assert_eq!(config.byte_order(), ByteOrderCode::NewLsb);
    }
}
