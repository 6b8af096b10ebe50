//! Paged read cursor over a seekable channel.
//!
//! Node records are made of many small fixed-size fields. Reading each one
//! straight from the file would cost a system call per field, so the buffer
//! keeps an in-memory window (at least [`MIN_BUFFER_SIZE`] bytes) and only
//! goes back to the channel when a read or a jump leaves that window.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use log::trace;

use super::byte_order::Endianness;
use super::qix_constants::MIN_BUFFER_SIZE;
use super::qix_types::{IndexError, IndexResult};

/// Scrolling window over a channel, decoding in a fixed byte order.
///
/// The buffer owns its channel. It is not synchronized; one buffer serves one
/// traversal at a time.
pub struct ScrollingBuffer<R> {
    channel: R,
    endianness: Endianness,
    data: Vec<u8>,
    /// Number of valid bytes in `data`
    limit: usize,
    /// Next unread byte, relative to `window_start`
    cursor: usize,
    /// Absolute file offset of `data[0]`
    window_start: u64,
    channel_len: u64,
    fills: u64,
}

impl<R: Read + Seek> ScrollingBuffer<R> {
    /// Wraps `channel` and loads the first window from its current position.
    pub fn new(channel: R, endianness: Endianness) -> IndexResult<Self> {
        Self::with_capacity(channel, endianness, MIN_BUFFER_SIZE)
    }

    /// Like [`new`](Self::new) with a larger initial window. Capacities below
    /// [`MIN_BUFFER_SIZE`] are raised to it.
    pub fn with_capacity(
        mut channel: R,
        endianness: Endianness,
        capacity: usize,
    ) -> IndexResult<Self> {
        let start = channel.stream_position()?;
        let channel_len = channel.seek(SeekFrom::End(0))?;

        let mut buffer = Self {
            channel,
            endianness,
            data: vec![0u8; capacity.max(MIN_BUFFER_SIZE)],
            limit: 0,
            cursor: 0,
            window_start: start,
            channel_len,
            fills: 0,
        };
        buffer.fill_at(start)?;
        Ok(buffer)
    }

    /// Reads a 4-byte unsigned integer.
    pub fn get_u32(&mut self) -> IndexResult<u32> {
        self.ensure(4)?;
        let value = self
            .endianness
            .read_u32(&self.data[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        Ok(value)
    }

    /// Reads an 8-byte float.
    pub fn get_double(&mut self) -> IndexResult<f64> {
        self.ensure(8)?;
        let value = self
            .endianness
            .read_f64(&self.data[self.cursor..self.cursor + 8]);
        self.cursor += 8;
        Ok(value)
    }

    /// Reads `count` consecutive 4-byte unsigned integers in one bulk decode.
    pub fn get_u32_array(&mut self, count: usize) -> IndexResult<Vec<u32>> {
        let required = count
            .checked_mul(4)
            .ok_or_else(|| IndexError::Format(format!("integer array too large: {}", count)))?;
        self.ensure(required)?;

        let mut values = vec![0u32; count];
        self.endianness
            .read_u32_into(&self.data[self.cursor..self.cursor + required], &mut values);
        self.cursor += required;
        Ok(values)
    }

    /// Moves to an absolute file offset.
    ///
    /// Inside the current window only the cursor moves; otherwise the window
    /// is reloaded starting at `position`.
    pub fn go_to(&mut self, position: u64) -> IndexResult<()> {
        let window_end = self.window_start + self.limit as u64;
        if position >= self.window_start && position < window_end {
            self.cursor = (position - self.window_start) as usize;
            return Ok(());
        }
        self.fill_at(position)
    }

    /// Absolute file offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.window_start + self.cursor as u64
    }

    /// Number of times the window was loaded from the channel.
    pub fn fill_count(&self) -> u64 {
        self.fills
    }

    /// Current window capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Gives the channel back, dropping the window.
    pub fn into_inner(self) -> R {
        self.channel
    }

    fn remaining(&self) -> usize {
        self.limit - self.cursor
    }

    fn ensure(&mut self, required: usize) -> IndexResult<()> {
        if self.remaining() >= required {
            return Ok(());
        }

        // Never grow past what the file can still deliver.
        let available = self.channel_len.saturating_sub(self.position());
        if (required as u64) > available {
            return Err(IndexError::Format(format!(
                "truncated record at offset {}: {} bytes needed, {} left",
                self.position(),
                required,
                available
            )));
        }

        self.refill(required)?;
        if self.remaining() < required {
            return Err(IndexError::Format(format!(
                "truncated record at offset {}",
                self.position()
            )));
        }
        Ok(())
    }

    /// Grows the window (doubling) until it can hold `required` bytes, then
    /// reloads it from the logical position. Unread bytes of the old window
    /// are discarded and read again.
    fn refill(&mut self, required: usize) -> IndexResult<()> {
        let mut capacity = self.data.len();
        while capacity < required {
            capacity *= 2;
        }
        if capacity != self.data.len() {
            trace!("growing scrolling window from {} to {} bytes", self.data.len(), capacity);
            self.data.resize(capacity, 0);
        }
        let position = self.position();
        self.fill_at(position)
    }

    fn fill_at(&mut self, position: u64) -> IndexResult<()> {
        self.channel.seek(SeekFrom::Start(position))?;

        let mut filled = 0;
        while filled < self.data.len() {
            match self.channel.read(&mut self.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.window_start = position;
        self.limit = filled;
        self.cursor = 0;
        self.fills += 1;
        trace!("loaded {} bytes at offset {}", filled, position);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Cursor that counts the reads that actually delivered bytes.
    pub(crate) struct CountingReader<R> {
        pub inner: R,
        pub reads: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl<R> CountingReader<R> {
        pub fn new(inner: R) -> (Self, std::rc::Rc<std::cell::Cell<usize>>) {
            let reads = std::rc::Rc::new(std::cell::Cell::new(0));
            (
                Self {
                    inner,
                    reads: reads.clone(),
                },
                reads,
            )
        }
    }

    impl<R: Read> Read for CountingReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            if n > 0 {
                self.reads.set(self.reads.get() + 1);
            }
            Ok(n)
        }
    }

    impl<R: Seek> Seek for CountingReader<R> {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn u32_file(count: u32, endianness: Endianness) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..count {
            endianness.write_u32(&mut out, i).unwrap();
        }
        out
    }

    #[test]
    fn test_sequential_reads() {
        let mut bytes = Vec::new();
        Endianness::Big.write_u32(&mut bytes, 42).unwrap();
        Endianness::Big.write_f64(&mut bytes, 3.25).unwrap();
        Endianness::Big.write_u32(&mut bytes, 7).unwrap();

        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        assert_eq!(buffer.get_u32().unwrap(), 42);
        assert_eq!(buffer.get_double().unwrap(), 3.25);
        assert_eq!(buffer.get_u32().unwrap(), 7);
        assert_eq!(buffer.position(), 16);
    }

    #[test]
    fn test_declared_order_governs_decoding() {
        let bytes = vec![1, 0, 0, 0];
        let mut little =
            ScrollingBuffer::new(Cursor::new(bytes.clone()), Endianness::Little).unwrap();
        let mut big = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        assert_eq!(little.get_u32().unwrap(), 1);
        assert_eq!(big.get_u32().unwrap(), 1 << 24);
    }

    #[test]
    fn test_starts_at_channel_position() {
        let bytes = u32_file(10, Endianness::Little);
        let mut cursor = Cursor::new(bytes);
        cursor.set_position(8);

        let mut buffer = ScrollingBuffer::new(cursor, Endianness::Little).unwrap();
        assert_eq!(buffer.position(), 8);
        assert_eq!(buffer.get_u32().unwrap(), 2);
    }

    #[test]
    fn test_go_to_inside_window_does_not_read() {
        let bytes = u32_file(1024, Endianness::Little); // 4KB, fits the window
        let (reader, reads) = CountingReader::new(Cursor::new(bytes));

        let mut buffer = ScrollingBuffer::new(reader, Endianness::Little).unwrap();
        assert_eq!(reads.get(), 1);

        for index in [500u64, 3, 1023, 0, 77] {
            buffer.go_to(index * 4).unwrap();
            assert_eq!(buffer.get_u32().unwrap() as u64, index);
        }
        assert_eq!(reads.get(), 1);
        assert_eq!(buffer.fill_count(), 1);
    }

    #[test]
    fn test_go_to_outside_window_reloads_once() {
        let bytes = u32_file(8192, Endianness::Big); // 32KB
        let (reader, reads) = CountingReader::new(Cursor::new(bytes));

        let mut buffer = ScrollingBuffer::new(reader, Endianness::Big).unwrap();
        buffer.go_to(6000 * 4).unwrap();
        assert_eq!(reads.get(), 2);
        assert_eq!(buffer.get_u32().unwrap(), 6000);

        // the new window starts at 6000, so 6100 is local
        buffer.go_to(6100 * 4).unwrap();
        assert_eq!(buffer.get_u32().unwrap(), 6100);
        assert_eq!(reads.get(), 2);

        // jumping back before the window start reloads
        buffer.go_to(10 * 4).unwrap();
        assert_eq!(buffer.get_u32().unwrap(), 10);
        assert_eq!(reads.get(), 3);
    }

    #[test]
    fn test_read_across_window_boundary_refills() {
        let mut bytes = vec![0u8; MIN_BUFFER_SIZE - 2];
        Endianness::Little.write_u32(&mut bytes, 0xCAFEBABE).unwrap();

        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Little).unwrap();
        buffer.go_to((MIN_BUFFER_SIZE - 2) as u64).unwrap();
        assert_eq!(buffer.get_u32().unwrap(), 0xCAFEBABE);
        assert_eq!(buffer.fill_count(), 2);
        assert_eq!(buffer.capacity(), MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_wide_array_grows_window() {
        let count = 5000u32; // 20000 bytes, more than two default windows
        let mut bytes = Vec::new();
        Endianness::Big.write_u32(&mut bytes, count).unwrap();
        bytes.extend(u32_file(count, Endianness::Big));

        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        let n = buffer.get_u32().unwrap() as usize;
        let values = buffer.get_u32_array(n).unwrap();

        assert_eq!(values.len(), 5000);
        assert_eq!(values[0], 0);
        assert_eq!(values[4999], 4999);
        assert_eq!(buffer.capacity(), 4 * MIN_BUFFER_SIZE);
        assert_eq!(buffer.position(), 4 + 20000);
    }

    #[test]
    fn test_truncated_read_is_format_error() {
        let mut buffer =
            ScrollingBuffer::new(Cursor::new(vec![1u8, 2, 3]), Endianness::Big).unwrap();
        assert!(buffer.get_u32().unwrap_err().is_format());
    }

    #[test]
    fn test_absurd_array_length_is_format_error() {
        let bytes = u32_file(4, Endianness::Big);
        let mut buffer = ScrollingBuffer::new(Cursor::new(bytes), Endianness::Big).unwrap();
        let err = buffer.get_u32_array(u32::MAX as usize).unwrap_err();
        assert!(err.is_format());
        // the window was not blown up to match the bogus length
        assert_eq!(buffer.capacity(), MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_custom_capacity_respects_minimum() {
        let buffer =
            ScrollingBuffer::with_capacity(Cursor::new(vec![0u8; 16]), Endianness::Big, 16)
                .unwrap();
        assert_eq!(buffer.capacity(), MIN_BUFFER_SIZE);

        let buffer =
            ScrollingBuffer::with_capacity(Cursor::new(vec![0u8; 16]), Endianness::Big, 65536)
                .unwrap();
        assert_eq!(buffer.capacity(), 65536);
    }
}
