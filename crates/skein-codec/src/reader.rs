use bytes::Buf;

use crate::error::{CodecError, Result};

/// Big-endian decoder over a borrowed byte buffer.
///
/// Mirrors [`Writer`](crate::Writer): every read consumes exactly the bytes the
/// matching write produced, and fails with [`CodecError::UnexpectedEnd`]
/// instead of reading past the end.
#[derive(Debug, Clone)]
pub struct Reader<'de> {
    buf: &'de [u8],
}

impl<'de> Reader<'de> {
    /// Read from the start of `buf`.
    pub fn new(buf: &'de [u8]) -> Self {
        Self { buf }
    }

    /// Read from `buf`, first discarding the 8-byte length/object-id header
    /// when `has_header` is set.
    pub fn begin(buf: &'de [u8], has_header: bool) -> Result<Self> {
        let mut reader = Self::new(buf);
        if has_header {
            reader.u32()?;
            reader.u32()?;
        }
        Ok(reader)
    }

    pub fn i8(&mut self) -> Result<i8> {
        self.need(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    pub fn i128(&mut self) -> Result<i128> {
        self.need(16)?;
        Ok(self.buf.get_i128())
    }

    pub fn u128(&mut self) -> Result<u128> {
        self.need(16)?;
        Ok(self.buf.get_u128())
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.buf.get_f32())
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    /// Any non-zero byte is `true`.
    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn char(&mut self) -> Result<char> {
        let unit = self.u16()?;
        char::from_u32(u32::from(unit)).ok_or(CodecError::InvalidChar(unit))
    }

    /// A u16-length-prefixed UTF-8 string, borrowed from the input.
    pub fn str(&mut self) -> Result<&'de str> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    pub fn string(&mut self) -> Result<String> {
        self.str().map(str::to_owned)
    }

    /// u32-count-prefixed raw bytes, borrowed from the input.
    pub fn bytes(&mut self) -> Result<&'de [u8]> {
        let len = self.count()?;
        self.take(len)
    }

    /// An enum ordinal, checked against the receiver's variant count.
    pub fn ordinal(&mut self, variants: usize) -> Result<u32> {
        let ordinal = self.u32()?;
        if (ordinal as usize) < variants {
            Ok(ordinal)
        } else {
            Err(CodecError::OrdinalOutOfRange { ordinal, variants })
        }
    }

    /// A u32 collection count.
    pub fn count(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    /// Read a u32 count, then `element` that many times.
    pub fn list<T>(&mut self, mut element: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.count()?;
        // Every element takes at least one byte, so the input bounds the count.
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(element(self)?);
        }
        Ok(items)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'de [u8]> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(CodecError::UnexpectedEnd {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Color {
        Red,
        Green,
        Blue,
    }

    const COLORS: [Color; 3] = [Color::Red, Color::Green, Color::Blue];

    #[test]
    fn cursor_roundtrip_with_header() {
        let mut writer = Writer::begin(0);
        writer.i32(42).unwrap();
        writer.string("Hello").unwrap();
        writer.ordinal(Color::Green as u32).unwrap();
        writer
            .list(&["Hello", "World", "My", "Friends"], |w, s| w.string(s))
            .unwrap();
        writer.list(&[1, 2, 3], |w, v| w.i32(*v)).unwrap();
        let bytes = writer.bake().unwrap();

        let mut reader = Reader::begin(&bytes, true).unwrap();
        assert_eq!(reader.i32().unwrap(), 42);
        assert_eq!(reader.string().unwrap(), "Hello");
        let color = COLORS[reader.ordinal(COLORS.len()).unwrap() as usize];
        assert_eq!(color, Color::Green);
        assert_eq!(
            reader.list(|r| r.string()).unwrap(),
            vec!["Hello", "World", "My", "Friends"]
        );
        assert_eq!(reader.list(|r| r.i32()).unwrap(), vec![1, 2, 3]);
        assert!(reader.is_empty());
    }

    #[test]
    fn begin_without_header_reads_from_start() {
        let bytes = [0, 0, 0, 9];
        let mut reader = Reader::begin(&bytes, false).unwrap();
        assert_eq!(reader.u32().unwrap(), 9);
    }

    #[test]
    fn begin_with_short_header_fails() {
        let bytes = [0, 0, 0, 9, 0];
        let err = Reader::begin(&bytes, true).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedEnd {
                needed: 4,
                remaining: 1
            }
        ));
    }

    #[test]
    fn short_read_reports_unexpected_end() {
        let mut reader = Reader::new(&[0x01, 0x02]);
        let err = reader.i32().unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedEnd {
                needed: 4,
                remaining: 2
            }
        ));
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn truncated_string_body() {
        let mut reader = Reader::new(&[0, 5, b'a', b'b']);
        assert!(matches!(
            reader.str(),
            Err(CodecError::UnexpectedEnd { needed: 5, .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut reader = Reader::new(&[0, 2, 0xC3, 0x28]);
        assert!(matches!(reader.str(), Err(CodecError::InvalidUtf8(_))));
    }

    #[test]
    fn surrogate_char_rejected() {
        let mut reader = Reader::new(&[0xD8, 0x00]);
        assert!(matches!(reader.char(), Err(CodecError::InvalidChar(0xD800))));
    }

    #[test]
    fn ordinal_out_of_range() {
        let mut reader = Reader::new(&[0, 0, 0, 3]);
        let err = reader.ordinal(3).unwrap_err();
        assert!(matches!(
            err,
            CodecError::OrdinalOutOfRange {
                ordinal: 3,
                variants: 3
            }
        ));
        assert!(err.is_misuse());
    }

    #[test]
    fn nonzero_byte_is_true() {
        let mut reader = Reader::new(&[0, 1, 7]);
        assert!(!reader.bool().unwrap());
        assert!(reader.bool().unwrap());
        assert!(reader.bool().unwrap());
    }

    #[test]
    fn oversized_list_count_fails_without_huge_allocation() {
        let mut reader = Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 1]);
        let err = reader.list(|r| r.i32()).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedEnd { .. }));
    }
}
