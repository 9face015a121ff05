//! Method-argument fields.
//!
//! Method arguments are a flat sequence of typed fields. Consecutive `bit`
//! fields share octets, least significant bit first, up to eight per octet;
//! any other field closes the current octet.

use std::fmt;

use bytes::Bytes;

use super::{
    scalar::{WireReader, WireWriter},
    table::{Table, long_len, widen},
};
use crate::error::MalformedData;

/// Reader for method arguments with bit-packing state.
#[derive(Debug)]
pub struct ArgReader<'a> {
    wire: WireReader<'a>,
    bits: Option<(u8, u8)>,
}

impl<'a> ArgReader<'a> {
    /// Read arguments from `buf` starting at `offset`.
    #[must_use]
    pub const fn new(buf: &'a Bytes, offset: usize) -> Self {
        Self {
            wire: WireReader::at(buf, offset),
            bits: None,
        }
    }

    /// Underlying byte reader; closes any pending bit octet.
    pub fn wire(&mut self) -> &mut WireReader<'a> {
        self.bits = None;
        &mut self.wire
    }

    /// Read the next packed bit.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if a new octet is needed and
    /// none remains.
    pub fn read_bit(&mut self) -> Result<bool, MalformedData> {
        let (octet, index) = match self.bits {
            Some((octet, index)) if index < 8 => (octet, index),
            _ => (self.wire.read_u8()?, 0),
        };
        self.bits = Some((octet, index + 1));
        Ok(octet & (1 << index) != 0)
    }
}

/// Writer for method arguments with bit-packing state.
#[derive(Debug)]
pub struct ArgWriter<'w, 'a> {
    wire: &'w mut WireWriter<'a>,
    bits: Option<(u8, u8)>,
}

impl<'w, 'a> ArgWriter<'w, 'a> {
    /// Write arguments through `wire`.
    pub const fn new(wire: &'w mut WireWriter<'a>) -> Self { Self { wire, bits: None } }

    /// Underlying byte writer; flushes any pending bit octet first.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the pending octet does not
    /// fit.
    pub fn wire(&mut self) -> Result<&mut WireWriter<'a>, MalformedData> {
        self.flush()?;
        Ok(&mut *self.wire)
    }

    /// Queue a packed bit.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if a full octet cannot be
    /// flushed.
    pub fn write_bit(&mut self, value: bool) -> Result<(), MalformedData> {
        let (octet, index) = match self.bits {
            Some((octet, index)) if index < 8 => (octet, index),
            _ => {
                self.flush()?;
                (0, 0)
            }
        };
        self.bits = Some((octet | (u8::from(value) << index), index + 1));
        Ok(())
    }

    /// Flush the pending bit octet, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the octet does not fit.
    pub fn finish(&mut self) -> Result<(), MalformedData> { self.flush() }

    fn flush(&mut self) -> Result<(), MalformedData> {
        if let Some((octet, _)) = self.bits.take() {
            self.wire.write_u8(octet)?;
        }
        Ok(())
    }
}

/// A value that can appear in a method's argument list.
pub trait ArgField: Sized {
    /// Decode the field.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the field is truncated or malformed.
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData>;

    /// Encode the field.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the field does not fit or exceeds its
    /// length prefix.
    fn write_arg(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData>;
}

macro_rules! integer_arg {
    ($ty:ty, $read:ident, $write:ident) => {
        impl ArgField for $ty {
            fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> {
                reader.wire().$read()
            }

            fn write_arg(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
                writer.wire()?.$write(*self)
            }
        }
    };
}

integer_arg!(u8, read_u8, write_u8);
integer_arg!(u16, read_u16, write_u16);
integer_arg!(u32, read_u32, write_u32);
integer_arg!(u64, read_u64, write_u64);

impl ArgField for bool {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> { reader.read_bit() }

    fn write_arg(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
        writer.write_bit(*self)
    }
}

impl ArgField for Table {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> {
        Self::decode(reader.wire())
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
        self.encode(writer.wire()?)
    }
}

macro_rules! string_arg {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash)]
        pub struct $name(Bytes);

        impl $name {
            /// Wrap raw bytes.
            #[must_use]
            pub fn new(bytes: impl Into<Bytes>) -> Self { Self(bytes.into()) }

            /// Raw bytes of the string.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] { &self.0 }

            /// Consume the wrapper, returning the shared bytes.
            #[must_use]
            pub fn into_bytes(self) -> Bytes { self.0 }

            /// Length in bytes.
            #[must_use]
            pub fn len(&self) -> usize { self.0.len() }

            /// Returns true if the string is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool { self.0.is_empty() }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self { Self(Bytes::copy_from_slice(text.as_bytes())) }
        }

        impl From<String> for $name {
            fn from(text: String) -> Self { Self(Bytes::from(text)) }
        }

        impl From<Bytes> for $name {
            fn from(bytes: Bytes) -> Self { Self(bytes) }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool { self.0 == other.as_bytes() }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", String::from_utf8_lossy(&self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&String::from_utf8_lossy(&self.0))
            }
        }
    };
}

string_arg!(
    /// String with a one-octet length prefix (at most 255 bytes).
    ShortString
);
string_arg!(
    /// String with a four-octet length prefix.
    LongString
);

impl ArgField for ShortString {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> {
        let wire = reader.wire();
        let len = wire.read_u8()?;
        wire.read_bytes(usize::from(len)).map(Self)
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
        let len = u8::try_from(self.len()).map_err(|_| MalformedData::StringTooLong {
            len: self.len(),
            max: usize::from(u8::MAX),
        })?;
        let wire = writer.wire()?;
        wire.write_u8(len)?;
        wire.write_bytes(&self.0)
    }
}

impl ArgField for LongString {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> {
        let wire = reader.wire();
        let len = wire.read_u32()?;
        wire.read_bytes(widen(len)).map(Self)
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
        let len = long_len(self.len())?;
        let wire = writer.wire()?;
        wire.write_u32(len)?;
        wire.write_bytes(&self.0)
    }
}
