//! Self-describing field values, tables and arrays.
//!
//! A field value is a one-octet kind tag followed by a kind-specific payload.
//! Tables and arrays are length-prefixed containers of such values; tables
//! additionally prefix each value with a short key. Decoded strings, keys and
//! byte arrays are zero-copy slices of the frame they came from.

use std::cmp::Ordering;

use bytes::Bytes;

use super::scalar::{WireReader, WireWriter};
use crate::error::MalformedData;

/// Initial entry capacity used while decoding a container of unknown size.
const INITIAL_ENTRIES: usize = 16;

/// Deepest nesting of tables and arrays the decoder accepts.
pub const MAX_NESTING: usize = 64;

/// Field value kinds and their wire tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldKind {
    Boolean = b't',
    I8 = b'b',
    U8 = b'B',
    I16 = b's',
    U16 = b'u',
    I32 = b'I',
    U32 = b'i',
    I64 = b'l',
    U64 = b'L',
    F32 = b'f',
    F64 = b'd',
    Decimal = b'D',
    Utf8 = b'S',
    Array = b'A',
    Timestamp = b'T',
    Table = b'F',
    Void = b'V',
    Bytes = b'x',
}

impl FieldKind {
    /// Wire tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 { self as u8 }

    /// Look up the kind for a wire tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            b't' => Self::Boolean,
            b'b' => Self::I8,
            b'B' => Self::U8,
            b's' => Self::I16,
            b'u' => Self::U16,
            b'I' => Self::I32,
            b'i' => Self::U32,
            b'l' => Self::I64,
            b'L' => Self::U64,
            b'f' => Self::F32,
            b'd' => Self::F64,
            b'D' => Self::Decimal,
            b'S' => Self::Utf8,
            b'A' => Self::Array,
            b'T' => Self::Timestamp,
            b'F' => Self::Table,
            b'V' => Self::Void,
            b'x' => Self::Bytes,
            _ => return None,
        })
    }
}

/// Fixed-point decimal: `value / 10^scale`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub scale: u8,
    pub value: u32,
}

/// A tagged field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    /// Long string; UTF-8 by convention but not validated.
    Utf8(Bytes),
    Array(Array),
    Timestamp(u64),
    Table(Table),
    Void,
    Bytes(Bytes),
}

impl FieldValue {
    /// Build a long-string value from text.
    #[must_use]
    pub fn utf8(text: &str) -> Self { Self::Utf8(Bytes::copy_from_slice(text.as_bytes())) }

    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Boolean(_) => FieldKind::Boolean,
            Self::I8(_) => FieldKind::I8,
            Self::U8(_) => FieldKind::U8,
            Self::I16(_) => FieldKind::I16,
            Self::U16(_) => FieldKind::U16,
            Self::I32(_) => FieldKind::I32,
            Self::U32(_) => FieldKind::U32,
            Self::I64(_) => FieldKind::I64,
            Self::U64(_) => FieldKind::U64,
            Self::F32(_) => FieldKind::F32,
            Self::F64(_) => FieldKind::F64,
            Self::Decimal(_) => FieldKind::Decimal,
            Self::Utf8(_) => FieldKind::Utf8,
            Self::Array(_) => FieldKind::Array,
            Self::Timestamp(_) => FieldKind::Timestamp,
            Self::Table(_) => FieldKind::Table,
            Self::Void => FieldKind::Void,
            Self::Bytes(_) => FieldKind::Bytes,
        }
    }

    /// Decode one tagged value.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] for unknown tags, truncated payloads, nested
    /// containers that overrun their prefix, or excessive nesting.
    pub fn decode(reader: &mut WireReader<'_>) -> Result<Self, MalformedData> {
        Self::decode_nested(reader, 0)
    }

    fn decode_nested(reader: &mut WireReader<'_>, depth: usize) -> Result<Self, MalformedData> {
        let tag = reader.read_u8()?;
        let kind = FieldKind::from_tag(tag).ok_or(MalformedData::UnknownFieldKind(tag))?;
        let value = match kind {
            FieldKind::Boolean => Self::Boolean(reader.read_u8()? != 0),
            FieldKind::I8 => Self::I8(reader.read_i8()?),
            FieldKind::U8 => Self::U8(reader.read_u8()?),
            FieldKind::I16 => Self::I16(reader.read_i16()?),
            FieldKind::U16 => Self::U16(reader.read_u16()?),
            FieldKind::I32 => Self::I32(reader.read_i32()?),
            FieldKind::U32 => Self::U32(reader.read_u32()?),
            FieldKind::I64 => Self::I64(reader.read_i64()?),
            FieldKind::U64 => Self::U64(reader.read_u64()?),
            FieldKind::F32 => Self::F32(reader.read_f32()?),
            FieldKind::F64 => Self::F64(reader.read_f64()?),
            FieldKind::Decimal => Self::Decimal(Decimal {
                scale: reader.read_u8()?,
                value: reader.read_u32()?,
            }),
            FieldKind::Utf8 => Self::Utf8(read_long_bytes(reader)?),
            FieldKind::Bytes => Self::Bytes(read_long_bytes(reader)?),
            FieldKind::Array => Self::Array(Array::decode_nested(reader, depth + 1)?),
            FieldKind::Timestamp => Self::Timestamp(reader.read_u64()?),
            FieldKind::Table => Self::Table(Table::decode_nested(reader, depth + 1)?),
            FieldKind::Void => Self::Void,
        };
        Ok(value)
    }

    /// Encode this value with its tag.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the writer runs out of space or a key or
    /// string exceeds its length prefix.
    pub fn encode(&self, writer: &mut WireWriter<'_>) -> Result<(), MalformedData> {
        writer.write_u8(self.kind().tag())?;
        match self {
            Self::Boolean(value) => writer.write_u8(u8::from(*value)),
            Self::I8(value) => writer.write_i8(*value),
            Self::U8(value) => writer.write_u8(*value),
            Self::I16(value) => writer.write_i16(*value),
            Self::U16(value) => writer.write_u16(*value),
            Self::I32(value) => writer.write_i32(*value),
            Self::U32(value) => writer.write_u32(*value),
            Self::I64(value) => writer.write_i64(*value),
            Self::U64(value) | Self::Timestamp(value) => writer.write_u64(*value),
            Self::F32(value) => writer.write_f32(*value),
            Self::F64(value) => writer.write_f64(*value),
            Self::Decimal(Decimal { scale, value }) => {
                writer.write_u8(*scale)?;
                writer.write_u32(*value)
            }
            Self::Utf8(bytes) | Self::Bytes(bytes) => write_long_bytes(writer, bytes),
            Self::Array(array) => array.encode(writer),
            Self::Table(table) => table.encode(writer),
            Self::Void => Ok(()),
        }
    }
}

/// One key/value pair of a [`Table`].
#[derive(Clone, Debug, PartialEq)]
pub struct TableEntry {
    pub key: Bytes,
    pub value: FieldValue,
}

/// Ordered key/value container.
///
/// Entry order is preserved on encode. Keys are compared by their bytes only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    entries: Vec<TableEntry>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self { Self { entries: Vec::new() } }

    /// Append an entry, keeping any earlier entry with the same key.
    pub fn push(&mut self, key: impl Into<Bytes>, value: FieldValue) {
        self.entries.push(TableEntry {
            key: key.into(),
            value,
        });
    }

    /// Find the first entry whose key equals `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqp_wire::codec::{FieldValue, Table};
    ///
    /// let table: Table = [("product", FieldValue::utf8("x"))].into_iter().collect();
    /// assert_eq!(table.get(b"product"), Some(&FieldValue::utf8("x")));
    /// assert_eq!(table.get(b"version"), None);
    /// ```
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|entry| entry.key.as_ref() == key)
            .map(|entry| &entry.value)
    }

    /// Iterate over the entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TableEntry> { self.entries.iter() }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Sort entries by key with [`compare_keys`]. The sort is stable.
    pub fn sort_by_key(&mut self) { self.entries.sort_by(|a, b| compare_keys(&a.key, &b.key)); }

    /// Decode a length-prefixed table.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the prefix or any entry is malformed.
    pub fn decode(reader: &mut WireReader<'_>) -> Result<Self, MalformedData> {
        Self::decode_nested(reader, 0)
    }

    fn decode_nested(reader: &mut WireReader<'_>, depth: usize) -> Result<Self, MalformedData> {
        let entries = decode_container(reader, depth, |inner| {
            let key_len = inner.read_u8()?;
            let key = inner.read_bytes(usize::from(key_len))?;
            let value = FieldValue::decode_nested(inner, depth)?;
            Ok(TableEntry { key, value })
        })?;
        Ok(Self { entries })
    }

    /// Encode as a length-prefixed table.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::StringTooLong`] for keys over 255 bytes and
    /// [`MalformedData::ShortBuffer`] if the writer runs out of space.
    pub fn encode(&self, writer: &mut WireWriter<'_>) -> Result<(), MalformedData> {
        encode_container(writer, |writer| {
            for entry in &self.entries {
                let key_len =
                    u8::try_from(entry.key.len()).map_err(|_| MalformedData::StringTooLong {
                        len: entry.key.len(),
                        max: usize::from(u8::MAX),
                    })?;
                writer.write_u8(key_len)?;
                writer.write_bytes(&entry.key)?;
                entry.value.encode(writer)?;
            }
            Ok(())
        })
    }
}

impl<K: Into<Bytes>> FromIterator<(K, FieldValue)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| TableEntry {
                    key: key.into(),
                    value,
                })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a TableEntry;
    type IntoIter = std::slice::Iter<'a, TableEntry>;

    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

/// Ordered sequence of field values; kinds may be mixed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Array {
    values: Vec<FieldValue>,
}

impl Array {
    /// Create an empty array.
    #[must_use]
    pub const fn new() -> Self { Self { values: Vec::new() } }

    /// Append a value.
    pub fn push(&mut self, value: FieldValue) { self.values.push(value); }

    /// Values in order.
    #[must_use]
    pub fn values(&self) -> &[FieldValue] { &self.values }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize { self.values.len() }

    /// Returns true if the array has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Decode a length-prefixed array.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the prefix or any value is malformed.
    pub fn decode(reader: &mut WireReader<'_>) -> Result<Self, MalformedData> {
        Self::decode_nested(reader, 0)
    }

    fn decode_nested(reader: &mut WireReader<'_>, depth: usize) -> Result<Self, MalformedData> {
        let values = decode_container(reader, depth, |inner| {
            FieldValue::decode_nested(inner, depth)
        })?;
        Ok(Self { values })
    }

    /// Encode as a length-prefixed array.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the writer runs out of space or a nested
    /// value cannot be encoded.
    pub fn encode(&self, writer: &mut WireWriter<'_>) -> Result<(), MalformedData> {
        encode_container(writer, |writer| {
            self.values.iter().try_for_each(|value| value.encode(writer))
        })
    }
}

impl FromIterator<FieldValue> for Array {
    fn from_iter<I: IntoIterator<Item = FieldValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Order two keys byte-wise over their common prefix, then by length.
#[must_use]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    let common = a.len().min(b.len());
    a[..common]
        .cmp(&b[..common])
        .then_with(|| a.len().cmp(&b.len()))
}

fn read_long_bytes(reader: &mut WireReader<'_>) -> Result<Bytes, MalformedData> {
    let len = reader.read_u32()?;
    reader.read_bytes(widen(len))
}

fn write_long_bytes(writer: &mut WireWriter<'_>, bytes: &[u8]) -> Result<(), MalformedData> {
    writer.write_u32(long_len(bytes.len())?)?;
    writer.write_bytes(bytes)
}

/// Convert a byte count into a 32-bit length prefix.
pub(crate) fn long_len(len: usize) -> Result<u32, MalformedData> {
    u32::try_from(len).map_err(|_| MalformedData::StringTooLong {
        len,
        max: widen(u32::MAX),
    })
}

/// Widen a wire length into `usize`, saturating on narrow targets.
pub(crate) fn widen(len: u32) -> usize { usize::try_from(len).unwrap_or(usize::MAX) }

fn decode_container<T>(
    reader: &mut WireReader<'_>,
    depth: usize,
    mut element: impl FnMut(&mut WireReader<'_>) -> Result<T, MalformedData>,
) -> Result<Vec<T>, MalformedData> {
    if depth > MAX_NESTING {
        return Err(MalformedData::NestingTooDeep { limit: MAX_NESTING });
    }
    let declared = widen(reader.read_u32()?);
    let body = reader.read_bytes(declared)?;
    let mut inner = WireReader::new(&body);
    let mut items = Vec::with_capacity(INITIAL_ENTRIES);
    while inner.remaining() > 0 {
        let item = element(&mut inner).map_err(|error| match error {
            MalformedData::ShortBuffer { .. } => MalformedData::ContainerOverrun { declared },
            other => other,
        })?;
        items.push(item);
    }
    items.shrink_to_fit();
    Ok(items)
}

fn encode_container(
    writer: &mut WireWriter<'_>,
    body: impl FnOnce(&mut WireWriter<'_>) -> Result<(), MalformedData>,
) -> Result<(), MalformedData> {
    let position = writer.reserve_u32()?;
    let start = writer.offset();
    body(writer)?;
    let len = long_len(writer.offset() - start)?;
    writer.patch_u32(position, len);
    Ok(())
}
