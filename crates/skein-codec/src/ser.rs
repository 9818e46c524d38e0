use serde::ser::{self, Serialize};

use crate::error::{CodecError, Result};
use crate::writer::Writer;

/// `serde::Serializer` that lays values out positionally on a [`Writer`].
///
/// No field names, type tags or struct lengths are written: the receiver must
/// decode into a type with the same field order.
pub struct Encoder<'a> {
    writer: &'a mut Writer,
}

impl<'a> Encoder<'a> {
    pub fn new(writer: &'a mut Writer) -> Self {
        Self { writer }
    }
}

impl<'a, 'b> ser::Serializer for &'b mut Encoder<'a> {
    type Ok = ();
    type Error = CodecError;

    type SerializeSeq = Counted<'a, 'b>;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Counted<'a, 'b>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.writer.bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.writer.i8(v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.writer.i16(v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.writer.i32(v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.writer.i64(v)
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.writer.i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.writer.u8(v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.writer.u16(v)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.writer.u32(v)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.writer.u64(v)
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.writer.u128(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.writer.f32(v)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.writer.f64(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.writer.char(v)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.writer.string(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.writer.bytes(v)
    }

    fn serialize_none(self) -> Result<()> {
        Err(CodecError::UnsupportedValue("absent value (None)"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        self.writer.ordinal(variant_index)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.writer.ordinal(variant_index)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let len = len.ok_or(CodecError::UnsupportedValue("sequence of unknown length"))?;
        Counted::begin(self, len)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.writer.ordinal(variant_index)?;
        Ok(self)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        let len = len.ok_or(CodecError::UnsupportedValue("map of unknown length"))?;
        Counted::begin(self, len)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.writer.ordinal(variant_index)?;
        Ok(self)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// Sequence or map whose element count was written up front.
///
/// Writing past the declared count fails immediately; stopping short fails
/// at `end`.
pub struct Counted<'a, 'b> {
    encoder: &'b mut Encoder<'a>,
    declared: u32,
    written: u32,
}

impl<'a, 'b> Counted<'a, 'b> {
    fn begin(encoder: &'b mut Encoder<'a>, len: usize) -> Result<Self> {
        let declared = encoder.writer.count(len)?;
        Ok(Self {
            encoder,
            declared,
            written: 0,
        })
    }

    fn element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        if self.written == self.declared {
            return Err(CodecError::CountMismatch {
                declared: self.declared,
                actual: self.written.saturating_add(1),
            });
        }
        value.serialize(&mut *self.encoder)?;
        self.written += 1;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if self.written != self.declared {
            return Err(CodecError::CountMismatch {
                declared: self.declared,
                actual: self.written,
            });
        }
        Ok(())
    }
}

impl ser::SerializeSeq for Counted<'_, '_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeMap for Counted<'_, '_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.element(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut *self.encoder)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeTuple for &mut Encoder<'_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for &mut Encoder<'_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for &mut Encoder<'_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut Encoder<'_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn skip_field(&mut self, _key: &'static str) -> Result<()> {
        Err(CodecError::UnsupportedValue("skipped struct field"))
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for &mut Encoder<'_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn skip_field(&mut self, _key: &'static str) -> Result<()> {
        Err(CodecError::UnsupportedValue("skipped struct field"))
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
