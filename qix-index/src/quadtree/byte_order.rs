//! Byte order negotiation and the optional 8-byte file header.
//!
//! A headered file starts with `"SQT"`, a signed byte-order code, the format
//! version and three reserved zero bytes. Older files carry no header at all;
//! their byte order is guessed from the tree header that sits at byte 0.

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use log::warn;

use super::qix_constants::{HEADER_SIZE, LEGACY_VERSION, SIGNATURE, VERSION};
use super::qix_types::{IndexError, IndexResult};

/// Concrete byte order used to encode multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the running platform.
    pub fn native() -> Endianness {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    #[inline]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        }
    }

    #[inline]
    pub fn read_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endianness::Little => LittleEndian::read_f64(buf),
            Endianness::Big => BigEndian::read_f64(buf),
        }
    }

    /// Decodes `dst.len()` consecutive 4-byte integers from `src`.
    #[inline]
    pub fn read_u32_into(self, src: &[u8], dst: &mut [u32]) {
        match self {
            Endianness::Little => LittleEndian::read_u32_into(src, dst),
            Endianness::Big => BigEndian::read_u32_into(src, dst),
        }
    }

    pub fn write_u32<W: Write>(self, writer: &mut W, value: u32) -> std::io::Result<()> {
        match self {
            Endianness::Little => writer.write_u32::<LittleEndian>(value),
            Endianness::Big => writer.write_u32::<BigEndian>(value),
        }
    }

    pub fn write_f64<W: Write>(self, writer: &mut W, value: f64) -> std::io::Result<()> {
        match self {
            Endianness::Little => writer.write_f64::<LittleEndian>(value),
            Endianness::Big => writer.write_f64::<BigEndian>(value),
        }
    }
}

/// Byte order code stored in the file header.
///
/// Codes above [`ByteOrderCode::Native`] request a headered file; the others
/// produce the legacy headerless layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ByteOrderCode {
    /// Whatever the writing platform uses, no header
    Native = 0,
    /// Little endian, no header
    Lsb = -1,
    /// Big endian, no header
    Msb = -2,
    /// Little endian with header
    NewLsb = 1,
    /// Big endian with header
    NewMsb = 2,
}

impl ByteOrderCode {
    /// Parses a stored code. Codes outside `-2..=2` mean the file is corrupt.
    pub fn from_code(code: i8) -> IndexResult<ByteOrderCode> {
        match code {
            0 => Ok(ByteOrderCode::Native),
            -1 => Ok(ByteOrderCode::Lsb),
            -2 => Ok(ByteOrderCode::Msb),
            1 => Ok(ByteOrderCode::NewLsb),
            2 => Ok(ByteOrderCode::NewMsb),
            other => Err(IndexError::Format(format!(
                "unknown byte order code {}",
                other
            ))),
        }
    }

    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn endianness(self) -> Endianness {
        match self {
            ByteOrderCode::Native => Endianness::native(),
            ByteOrderCode::Lsb | ByteOrderCode::NewLsb => Endianness::Little,
            ByteOrderCode::Msb | ByteOrderCode::NewMsb => Endianness::Big,
        }
    }

    /// Whether a file written with this code starts with an [`IndexHeader`].
    pub fn writes_header(self) -> bool {
        self.code() > ByteOrderCode::Native.code()
    }
}

impl Default for ByteOrderCode {
    fn default() -> Self {
        ByteOrderCode::NewMsb
    }
}

/// The optional header at the start of an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    byte_order: ByteOrderCode,
    version: u8,
}

impl IndexHeader {
    /// Header for a file about to be written.
    pub fn new(byte_order: ByteOrderCode) -> Self {
        Self {
            byte_order,
            version: VERSION,
        }
    }

    pub fn byte_order(&self) -> ByteOrderCode {
        self.byte_order
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// A legacy file has no header; its tree header starts at byte 0.
    pub fn is_legacy(&self) -> bool {
        self.version == LEGACY_VERSION
    }

    /// Writes the fixed 8-byte header record.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> IndexResult<()> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..3].copy_from_slice(SIGNATURE);
        buf[3] = self.byte_order.code() as u8;
        buf[4] = self.version;
        // bytes 5..8 reserved
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Reads the first 8 bytes of a file and works out its byte order.
    pub fn read_from<R: Read>(reader: &mut R) -> IndexResult<IndexHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| IndexError::from_read(e, "index header"))?;
        Self::parse(&buf)
    }

    /// Interprets an 8-byte header record.
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> IndexResult<IndexHeader> {
        if &buf[..3] != SIGNATURE {
            warn!(
                "Old qix file format; this file format is deprecated. \
                 It is strongly recommended to regenerate it in the new format"
            );
            return Ok(IndexHeader {
                byte_order: Self::guess_legacy_order(buf),
                version: LEGACY_VERSION,
            });
        }

        let byte_order = ByteOrderCode::from_code(buf[3] as i8)?;
        let version = buf[4];
        if version > VERSION {
            return Err(IndexError::Format(format!(
                "unsupported index version {} (max {})",
                version, VERSION
            )));
        }
        Ok(IndexHeader {
            byte_order,
            version,
        })
    }

    /// Guesses the byte order of a headerless file from its tree header.
    ///
    /// Bytes 0..4 hold the record count and 4..8 the (small) max depth, so
    /// the high-order bytes of these fields are zero. Which end of the field
    /// they sit at reveals the byte order.
    fn guess_legacy_order(buf: &[u8; HEADER_SIZE]) -> ByteOrderCode {
        let lsb = if buf[4..8].iter().all(|b| *b == 0) {
            !(buf[0] == 0 && buf[1] == 0)
        } else {
            !(buf[4] == 0 && buf[5] == 0)
        };

        if lsb {
            ByteOrderCode::Lsb
        } else {
            ByteOrderCode::Msb
        }
    }
}
