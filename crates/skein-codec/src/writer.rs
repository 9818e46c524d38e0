use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Header written by [`Writer::begin`]: total length (4) + object id (4).
pub const HEADER_SIZE: usize = 8;

/// Longest string the 16-bit length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Append-only big-endian encoder over a growable buffer.
///
/// A writer created with [`Writer::begin`] reserves an 8-byte header whose
/// length field is back-patched by [`Writer::bake`]. A writer created with
/// [`Writer::new`] has no header.
///
/// `bake` is one-shot: any write or bake after it fails with
/// [`CodecError::AlreadyBaked`].
#[derive(Debug)]
pub struct Writer {
    buf: BytesMut,
    has_header: bool,
    baked: bool,
}

impl Writer {
    /// Create a headerless writer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            has_header: false,
            baked: false,
        }
    }

    /// Create a writer with a length placeholder and `object_id` preamble.
    pub fn begin(object_id: u32) -> Self {
        let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
        buf.put_u32(0);
        buf.put_u32(object_id);
        Self {
            buf,
            has_header: true,
            baked: false,
        }
    }

    pub fn i8(&mut self, value: i8) -> Result<()> {
        self.open()?.put_i8(value);
        Ok(())
    }

    pub fn u8(&mut self, value: u8) -> Result<()> {
        self.open()?.put_u8(value);
        Ok(())
    }

    pub fn i16(&mut self, value: i16) -> Result<()> {
        self.open()?.put_i16(value);
        Ok(())
    }

    pub fn u16(&mut self, value: u16) -> Result<()> {
        self.open()?.put_u16(value);
        Ok(())
    }

    pub fn i32(&mut self, value: i32) -> Result<()> {
        self.open()?.put_i32(value);
        Ok(())
    }

    pub fn u32(&mut self, value: u32) -> Result<()> {
        self.open()?.put_u32(value);
        Ok(())
    }

    pub fn i64(&mut self, value: i64) -> Result<()> {
        self.open()?.put_i64(value);
        Ok(())
    }

    pub fn u64(&mut self, value: u64) -> Result<()> {
        self.open()?.put_u64(value);
        Ok(())
    }

    pub fn i128(&mut self, value: i128) -> Result<()> {
        self.open()?.put_i128(value);
        Ok(())
    }

    pub fn u128(&mut self, value: u128) -> Result<()> {
        self.open()?.put_u128(value);
        Ok(())
    }

    pub fn f32(&mut self, value: f32) -> Result<()> {
        self.open()?.put_f32(value);
        Ok(())
    }

    pub fn f64(&mut self, value: f64) -> Result<()> {
        self.open()?.put_f64(value);
        Ok(())
    }

    /// One byte, `1` or `0`.
    pub fn bool(&mut self, value: bool) -> Result<()> {
        self.open()?.put_u8(u8::from(value));
        Ok(())
    }

    /// One UTF-16 code unit. Characters outside the BMP are rejected.
    pub fn char(&mut self, value: char) -> Result<()> {
        let unit = u16::try_from(u32::from(value)).map_err(|_| {
            CodecError::UnsupportedValue("char outside the basic multilingual plane")
        })?;
        self.u16(unit)
    }

    /// UTF-8 bytes prefixed by their u16 byte length.
    pub fn string(&mut self, value: &str) -> Result<()> {
        let len = value.len();
        if len > MAX_STRING_LEN {
            return Err(CodecError::StringTooLong {
                len,
                max: MAX_STRING_LEN,
            });
        }
        let buf = self.open()?;
        buf.put_u16(len as u16);
        buf.put_slice(value.as_bytes());
        Ok(())
    }

    /// Raw bytes prefixed by their u32 count.
    pub fn bytes(&mut self, value: &[u8]) -> Result<()> {
        self.count(value.len())?;
        self.open()?.put_slice(value);
        Ok(())
    }

    /// An enum variant ordinal.
    pub fn ordinal(&mut self, ordinal: u32) -> Result<()> {
        self.u32(ordinal)
    }

    /// A u32 collection count.
    pub fn count(&mut self, len: usize) -> Result<u32> {
        let count = u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
        self.u32(count)?;
        Ok(count)
    }

    /// Write a u32 count, then `element` for each item in order.
    pub fn list<T>(
        &mut self,
        items: &[T],
        mut element: impl FnMut(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        self.count(items.len())?;
        for item in items {
            element(self, item)?;
        }
        Ok(())
    }

    /// Bytes written so far, including any header.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finalize the buffer.
    ///
    /// With a header, the first 4 bytes are patched with the total length.
    pub fn bake(&mut self) -> Result<Bytes> {
        self.open()?;
        self.baked = true;

        if self.has_header {
            let total = self.buf.len();
            let total = u32::try_from(total).map_err(|_| CodecError::LengthOverflow(total))?;
            self.buf[..4].copy_from_slice(&total.to_be_bytes());
        }

        Ok(self.buf.split().freeze())
    }

    fn open(&mut self) -> Result<&mut BytesMut> {
        if self.baked {
            return Err(CodecError::AlreadyBaked);
        }
        Ok(&mut self.buf)
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
