//! Bounds-checked big-endian primitives.
//!
//! [`WireReader`] walks a shared [`Bytes`] buffer and hands out zero-copy
//! slices; [`WireWriter`] fills a caller-provided bounded buffer. Every access
//! checks `offset + width <= len` first and reports
//! [`MalformedData::ShortBuffer`] without moving the cursor when it fails.

use bytes::Bytes;

use crate::error::MalformedData;

macro_rules! read_be {
    ($(#[$meta:meta])* $name:ident, $ty:ty) => {
        $(#[$meta])*
        ///
        /// # Errors
        ///
        /// Returns [`MalformedData::ShortBuffer`] if the buffer holds fewer
        /// bytes than the value's width.
        pub fn $name(&mut self) -> Result<$ty, MalformedData> {
            let bytes = self.take::<{ size_of::<$ty>() }>()?;
            #[expect(
                clippy::big_endian_bytes,
                reason = "AMQP encodes multi-byte integers in network byte order."
            )]
            let value = <$ty>::from_be_bytes(bytes);
            Ok(value)
        }
    };
}

macro_rules! write_be {
    ($(#[$meta:meta])* $name:ident, $ty:ty) => {
        $(#[$meta])*
        ///
        /// # Errors
        ///
        /// Returns [`MalformedData::ShortBuffer`] if the value does not fit.
        pub fn $name(&mut self, value: $ty) -> Result<(), MalformedData> {
            #[expect(
                clippy::big_endian_bytes,
                reason = "AMQP encodes multi-byte integers in network byte order."
            )]
            let bytes = value.to_be_bytes();
            self.put(&bytes)
        }
    };
}

/// Cursor over an inbound buffer.
#[derive(Clone, Debug)]
pub struct WireReader<'a> {
    buf: &'a Bytes,
    offset: usize,
}

impl<'a> WireReader<'a> {
    /// Start reading `buf` from its first byte.
    #[must_use]
    pub const fn new(buf: &'a Bytes) -> Self { Self { buf, offset: 0 } }

    /// Start reading `buf` at `offset`.
    #[must_use]
    pub const fn at(buf: &'a Bytes, offset: usize) -> Self { Self { buf, offset } }

    /// Current position within the buffer.
    #[must_use]
    pub const fn offset(&self) -> usize { self.offset }

    /// Bytes left between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize { self.buf.len().saturating_sub(self.offset) }

    fn check(&self, needed: usize) -> Result<usize, MalformedData> {
        self.offset
            .checked_add(needed)
            .filter(|&end| end <= self.buf.len())
            .ok_or(MalformedData::ShortBuffer {
                offset: self.offset,
                needed,
                available: self.buf.len(),
            })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], MalformedData> {
        let end = self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.offset..end]);
        self.offset = end;
        Ok(out)
    }

    /// Read one octet.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] at the end of the buffer.
    pub fn read_u8(&mut self) -> Result<u8, MalformedData> {
        let [octet] = self.take::<1>()?;
        Ok(octet)
    }

    /// Read a signed octet.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] at the end of the buffer.
    pub fn read_i8(&mut self) -> Result<i8, MalformedData> {
        self.read_u8().map(|octet| i8::from_ne_bytes([octet]))
    }

    read_be!(
        /// Read a big-endian `u16`.
        read_u16, u16
    );
    read_be!(
        /// Read a big-endian `i16`.
        read_i16, i16
    );
    read_be!(
        /// Read a big-endian `u32`.
        read_u32, u32
    );
    read_be!(
        /// Read a big-endian `i32`.
        read_i32, i32
    );
    read_be!(
        /// Read a big-endian `u64`.
        read_u64, u64
    );
    read_be!(
        /// Read a big-endian `i64`.
        read_i64, i64
    );

    /// Read a 32-bit float by reinterpreting its bit pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if fewer than four bytes remain.
    pub fn read_f32(&mut self) -> Result<f32, MalformedData> { self.read_u32().map(f32::from_bits) }

    /// Read a 64-bit float by reinterpreting its bit pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if fewer than eight bytes remain.
    pub fn read_f64(&mut self) -> Result<f64, MalformedData> { self.read_u64().map(f64::from_bits) }

    /// Read `len` bytes as a zero-copy slice of the underlying buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, MalformedData> {
        let end = self.check(len)?;
        let slice = self.buf.slice(self.offset..end);
        self.offset = end;
        Ok(slice)
    }
}

/// Cursor over a bounded outbound buffer.
#[derive(Debug)]
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> WireWriter<'a> {
    /// Start writing at the beginning of `buf`.
    #[must_use]
    pub const fn new(buf: &'a mut [u8]) -> Self { Self { buf, offset: 0 } }

    /// Start writing at `offset`.
    #[must_use]
    pub const fn at(buf: &'a mut [u8], offset: usize) -> Self { Self { buf, offset } }

    /// Number of bytes written so far, counted from the start of the buffer.
    #[must_use]
    pub const fn offset(&self) -> usize { self.offset }

    /// Capacity of the underlying buffer.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.buf.len() }

    fn check(&self, needed: usize) -> Result<usize, MalformedData> {
        self.offset
            .checked_add(needed)
            .filter(|&end| end <= self.buf.len())
            .ok_or(MalformedData::ShortBuffer {
                offset: self.offset,
                needed,
                available: self.buf.len(),
            })
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), MalformedData> {
        let end = self.check(bytes.len())?;
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    /// Write one octet.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the buffer is full.
    pub fn write_u8(&mut self, value: u8) -> Result<(), MalformedData> { self.put(&[value]) }

    /// Write a signed octet.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the buffer is full.
    pub fn write_i8(&mut self, value: i8) -> Result<(), MalformedData> {
        self.put(&value.to_ne_bytes())
    }

    write_be!(
        /// Write a big-endian `u16`.
        write_u16, u16
    );
    write_be!(
        /// Write a big-endian `i16`.
        write_i16, i16
    );
    write_be!(
        /// Write a big-endian `u32`.
        write_u32, u32
    );
    write_be!(
        /// Write a big-endian `i32`.
        write_i32, i32
    );
    write_be!(
        /// Write a big-endian `u64`.
        write_u64, u64
    );
    write_be!(
        /// Write a big-endian `i64`.
        write_i64, i64
    );

    /// Write a 32-bit float's bit pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the value does not fit.
    pub fn write_f32(&mut self, value: f32) -> Result<(), MalformedData> {
        self.write_u32(value.to_bits())
    }

    /// Write a 64-bit float's bit pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the value does not fit.
    pub fn write_f64(&mut self, value: f64) -> Result<(), MalformedData> {
        self.write_u64(value.to_bits())
    }

    /// Copy `bytes` verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if the bytes do not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), MalformedData> { self.put(bytes) }

    /// Reserve four bytes for a length prefix and return their position.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::ShortBuffer`] if four bytes do not fit.
    pub fn reserve_u32(&mut self) -> Result<usize, MalformedData> {
        let position = self.offset;
        self.put(&[0; 4])?;
        Ok(position)
    }

    /// Overwrite a previously reserved prefix with `value`.
    ///
    /// # Panics
    ///
    /// Panics if `position` was not returned by [`Self::reserve_u32`] on this
    /// writer.
    pub fn patch_u32(&mut self, position: usize, value: u32) {
        #[expect(
            clippy::big_endian_bytes,
            reason = "AMQP encodes multi-byte integers in network byte order."
        )]
        let bytes = value.to_be_bytes();
        self.buf[position..position + 4].copy_from_slice(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::{WireReader, WireWriter};
    use crate::error::MalformedData;

    #[rstest]
    #[case::zero(0, [0; 8])]
    #[case::max(u64::MAX, [0xFF; 8])]
    #[case::mixed(0x1122_3344_5566_7788, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88])]
    fn u64_is_big_endian(#[case] value: u64, #[case] wire: [u8; 8]) {
        let mut buf = [0u8; 8];
        WireWriter::new(&mut buf).write_u64(value).expect("fits");
        assert_eq!(buf, wire);
        let bytes = Bytes::copy_from_slice(&buf);
        assert_eq!(WireReader::new(&bytes).read_u64().expect("decodes"), value);
    }

    #[rstest]
    #[case::min(i16::MIN)]
    #[case::zero(0)]
    #[case::max(i16::MAX)]
    fn signed_boundaries_survive(#[case] value: i16) {
        let mut buf = [0u8; 2];
        WireWriter::new(&mut buf).write_i16(value).expect("fits");
        let bytes = Bytes::copy_from_slice(&buf);
        assert_eq!(WireReader::new(&bytes).read_i16().expect("decodes"), value);
    }

    #[test]
    fn floats_reinterpret_bits() {
        let mut buf = [0u8; 12];
        let mut writer = WireWriter::new(&mut buf);
        writer.write_f32(f32::NAN).expect("fits");
        writer.write_f64(-0.0).expect("fits");
        let bytes = Bytes::copy_from_slice(&buf);
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_f32().expect("f32").to_bits(), f32::NAN.to_bits());
        assert_eq!(reader.read_f64().expect("f64").to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn short_read_reports_and_keeps_cursor() {
        let bytes = Bytes::from_static(&[1, 2, 3]);
        let mut reader = WireReader::at(&bytes, 1);
        let err = reader.read_u32().expect_err("too short");
        assert_eq!(
            err,
            MalformedData::ShortBuffer {
                offset: 1,
                needed: 4,
                available: 3,
            }
        );
        assert_eq!(reader.offset(), 1);
        assert_eq!(reader.read_u16().expect("fits"), 0x0203);
    }

    #[test]
    fn short_write_does_not_touch_buffer() {
        let mut buf = [0xAAu8; 3];
        let mut writer = WireWriter::new(&mut buf);
        assert!(writer.write_u32(0).is_err());
        assert_eq!(writer.offset(), 0);
        assert_eq!(buf, [0xAA; 3]);
    }

    #[test]
    fn read_bytes_slices_without_copying() {
        let bytes = Bytes::from_static(b"hello world");
        let mut reader = WireReader::at(&bytes, 6);
        let word = reader.read_bytes(5).expect("slice");
        assert_eq!(&word[..], b"world");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn reserved_prefix_is_patched() {
        let mut buf = [0u8; 7];
        let mut writer = WireWriter::new(&mut buf);
        let position = writer.reserve_u32().expect("reserve");
        writer.write_bytes(b"abc").expect("body");
        writer.patch_u32(position, 3);
        assert_eq!(&buf, b"\0\0\0\x03abc");
    }
}
