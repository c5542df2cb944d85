//! Byte order selected at runtime.
//!
//! A package's byte order is only known after its signature is read, so the
//! fixed-order `byteorder` helpers are wrapped behind an [`Endian`] value.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

macro_rules! endian_io {
    ($($read:ident, $write:ident => $ty:ty;)*) => {
        impl Endian {
            $(
                #[inline]
                pub fn $read<R: Read + ?Sized>(self, reader: &mut R) -> io::Result<$ty> {
                    match self {
                        Endian::Little => reader.$read::<LittleEndian>(),
                        Endian::Big    => reader.$read::<BigEndian>(),
                    }
                }

                #[inline]
                pub fn $write<W: Write + ?Sized>(self, writer: &mut W, value: $ty) -> io::Result<()> {
                    match self {
                        Endian::Little => writer.$write::<LittleEndian>(value),
                        Endian::Big    => writer.$write::<BigEndian>(value),
                    }
                }
            )*
        }
    };
}

endian_io! {
    read_u16, write_u16 => u16;
    read_u32, write_u32 => u32;
    read_i32, write_i32 => i32;
    read_u64, write_u64 => u64;
    read_i64, write_i64 => i64;
}

impl Endian {
    pub fn name(self) -> &'static str {
        match self {
            Endian::Little => "little",
            Endian::Big    => "big",
        }
    }
}
