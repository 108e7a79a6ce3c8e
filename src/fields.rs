//! Positional big-endian field decoding.
//!
//! Every reply is a fixed schema of integers packed back to back. A schema is
//! a list of [`FieldKind`]s which a [`FieldReader`] consumes from offset 0.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    /// One byte, any non-zero value is `1`.
    Bool,
    U16,
    I16,
    U32,
    I32,
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 | FieldKind::Bool => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 => 4,
        }
    }
}

/// Cursor over a payload.
#[derive(Debug)]
pub struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
}

macro_rules! read_be {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.take(std::mem::size_of::<$ty>())?;
            let mut raw = [0u8; std::mem::size_of::<$ty>()];
            raw.copy_from_slice(bytes);
            Ok(<$ty>::from_be_bytes(raw))
        }
    };
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Starts reading at `offset`, used to step over the sequence byte.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        if self.remaining() < width {
            return Err(Error::PayloadTooShort {
                needed: self.offset + width,
                available: self.data.len(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + width];
        self.offset += width;
        Ok(bytes)
    }

    read_be!(read_u8, u8);
    read_be!(read_i8, i8);
    read_be!(read_u16, u16);
    read_be!(read_i16, i16);
    read_be!(read_u32, u32);
    read_be!(read_i32, i32);

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads one field of the given kind, widened to `i64`.
    pub fn read(&mut self, kind: FieldKind) -> Result<i64> {
        Ok(match kind {
            FieldKind::U8 => self.read_u8()?.into(),
            FieldKind::I8 => self.read_i8()?.into(),
            FieldKind::Bool => self.read_bool()?.into(),
            FieldKind::U16 => self.read_u16()?.into(),
            FieldKind::I16 => self.read_i16()?.into(),
            FieldKind::U32 => self.read_u32()?.into(),
            FieldKind::I32 => self.read_i32()?.into(),
        })
    }
}

/// Decodes `schema` sequentially from the start of `data`.
pub fn decode_fields(data: &[u8], schema: &[FieldKind]) -> Result<Vec<i64>> {
    let mut reader = FieldReader::new(data);
    schema.iter().map(|kind| reader.read(*kind)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use FieldKind::*;

    #[test]
    fn widths() {
        assert_eq!(Bool.width(), 1);
        assert_eq!(I16.width(), 2);
        assert_eq!(U32.width(), 4);
    }

    #[test]
    fn decodes_big_endian_in_order() {
        let data = [0x0e, 0x74, 0x00, 0x00, 0x77, 0x24, 0x03, 0x52];
        assert_eq!(
            decode_fields(&data, &[U16, U16, U16, U16]).unwrap(),
            vec![3700, 0, 30500, 850]
        );
    }

    #[test]
    fn mixed_schema_advances_offset() {
        let data = [0xff, 0x01, 0x00, 0x05, 0x00, 0x01, 0x86, 0xa0];
        assert_eq!(
            decode_fields(&data, &[I8, Bool, Bool, U8, I32]).unwrap(),
            vec![-1, 1, 0, 5, 100_000]
        );
    }

    #[test]
    fn signed_sixteen_bit() {
        let mut reader = FieldReader::new(&[0xff, 0xfe, 0x0c, 0xe4]);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_u16().unwrap(), 3300);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn reading_past_end_is_an_error() {
        let mut reader = FieldReader::at(&[0x01, 0x02, 0x03], 2);
        assert!(matches!(
            reader.read_u16(),
            Err(Error::PayloadTooShort {
                needed: 4,
                available: 3
            })
        ));
        // A failed read does not move the cursor
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_u8().unwrap(), 0x03);
    }
}
