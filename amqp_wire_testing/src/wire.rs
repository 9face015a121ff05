//! Byte-level builders for AMQP frames, method arguments and tables.
//!
//! These write the wire format directly so that tests compare the crate's
//! codec against an independent rendition.

use bytes::{Buf, BufMut};

/// Frame-end marker.
pub const FRAME_END: u8 = 0xCE;

/// Method frame type octet.
pub const METHOD: u8 = 1;
/// Content header frame type octet.
pub const HEADER: u8 = 2;
/// Body frame type octet.
pub const BODY: u8 = 3;
/// Heartbeat frame type octet.
pub const HEARTBEAT: u8 = 8;

/// Lay out a frame of any type around `payload`.
///
/// # Panics
///
/// Panics if `payload` is longer than a `u32` length.
#[must_use]
pub fn frame(frame_type: u8, channel: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.put_u8(frame_type);
    out.put_u16(channel);
    out.put_u32(u32::try_from(payload.len()).expect("payload fits a u32 length"));
    out.put_slice(payload);
    out.put_u8(FRAME_END);
    out
}

/// A method frame carrying `args` for method `index` of class `class_id`.
#[must_use]
pub fn method_frame(channel: u16, class_id: u16, index: u16, args: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(args.len() + 4);
    payload.put_u16(class_id);
    payload.put_u16(index);
    payload.put_slice(args);
    frame(METHOD, channel, &payload)
}

/// A content header frame with the encoded property list `properties`.
#[must_use]
pub fn header_frame(channel: u16, class_id: u16, body_size: u64, properties: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(properties.len() + 12);
    payload.put_u16(class_id);
    payload.put_u16(0);
    payload.put_u64(body_size);
    payload.put_slice(properties);
    frame(HEADER, channel, &payload)
}

/// A body frame.
#[must_use]
pub fn body_frame(channel: u16, fragment: &[u8]) -> Vec<u8> { frame(BODY, channel, fragment) }

/// A heartbeat frame.
#[must_use]
pub fn heartbeat_frame() -> Vec<u8> { frame(HEARTBEAT, 0, &[]) }

/// The `AMQP` greeting for the given version.
#[must_use]
pub fn protocol_header(major: u8, minor: u8, revision: u8) -> Vec<u8> {
    vec![b'A', b'M', b'Q', b'P', 0, major, minor, revision]
}

/// Method arguments in wire order, with consecutive bits packed LSB-first.
#[derive(Debug, Default)]
pub struct ArgBuilder {
    out: Vec<u8>,
    bit: Option<(usize, u8)>,
}

impl ArgBuilder {
    /// Start an empty argument list.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn field(mut self) -> Self {
        self.bit = None;
        self
    }

    /// Append an octet.
    #[must_use]
    pub fn octet(self, value: u8) -> Self {
        let mut this = self.field();
        this.out.put_u8(value);
        this
    }

    /// Append a 16-bit integer.
    #[must_use]
    pub fn short(self, value: u16) -> Self {
        let mut this = self.field();
        this.out.put_u16(value);
        this
    }

    /// Append a 32-bit integer.
    #[must_use]
    pub fn long(self, value: u32) -> Self {
        let mut this = self.field();
        this.out.put_u32(value);
        this
    }

    /// Append a 64-bit integer.
    #[must_use]
    pub fn longlong(self, value: u64) -> Self {
        let mut this = self.field();
        this.out.put_u64(value);
        this
    }

    /// Append a short string.
    ///
    /// # Panics
    ///
    /// Panics if `value` is longer than 255 bytes.
    #[must_use]
    pub fn shortstr(self, value: &str) -> Self {
        let mut this = self.field();
        this.out
            .put_u8(u8::try_from(value.len()).expect("short string fits a u8 length"));
        this.out.put_slice(value.as_bytes());
        this
    }

    /// Append a long string.
    ///
    /// # Panics
    ///
    /// Panics if `value` is longer than a `u32` length.
    #[must_use]
    pub fn longstr(self, value: &[u8]) -> Self {
        let mut this = self.field();
        this.out
            .put_u32(u32::try_from(value.len()).expect("long string fits a u32 length"));
        this.out.put_slice(value);
        this
    }

    /// Append an encoded table, as produced by [`TableBuilder::finish`].
    #[must_use]
    pub fn table(self, encoded: &[u8]) -> Self {
        let mut this = self.field();
        this.out.put_slice(encoded);
        this
    }

    /// Append a bit, sharing the previous octet while fewer than eight
    /// bits are packed in it.
    #[must_use]
    pub fn bit(mut self, value: bool) -> Self {
        let (at, shift) = match self.bit {
            Some((at, shift)) if shift < 8 => (at, shift),
            _ => {
                self.out.put_u8(0);
                (self.out.len() - 1, 0)
            }
        };
        if value {
            self.out[at] |= 1 << shift;
        }
        self.bit = Some((at, shift + 1));
        self
    }

    /// Finish the argument list.
    #[must_use]
    pub fn finish(self) -> Vec<u8> { self.out }
}

/// Field table entries, finished with their 32-bit length prefix.
#[derive(Debug, Default)]
pub struct TableBuilder {
    body: Vec<u8>,
}

impl TableBuilder {
    /// Start an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn key(mut self, key: &str, kind: u8) -> Self {
        self.body
            .put_u8(u8::try_from(key.len()).expect("table key fits a u8 length"));
        self.body.put_slice(key.as_bytes());
        self.body.put_u8(kind);
        self
    }

    /// Append a long-string (`S`) entry.
    ///
    /// # Panics
    ///
    /// Panics if `key` exceeds 255 bytes.
    #[must_use]
    pub fn longstr(self, key: &str, value: &str) -> Self {
        let mut this = self.key(key, b'S');
        this.body
            .put_u32(u32::try_from(value.len()).expect("value fits a u32 length"));
        this.body.put_slice(value.as_bytes());
        this
    }

    /// Append a boolean (`t`) entry.
    #[must_use]
    pub fn boolean(self, key: &str, value: bool) -> Self {
        let mut this = self.key(key, b't');
        this.body.put_u8(u8::from(value));
        this
    }

    /// Append a signed 32-bit (`I`) entry.
    #[must_use]
    pub fn int(self, key: &str, value: i32) -> Self {
        let mut this = self.key(key, b'I');
        this.body.put_i32(value);
        this
    }

    /// Append a nested table (`F`) entry.
    #[must_use]
    pub fn table(self, key: &str, nested: &Self) -> Self {
        let mut this = self.key(key, b'F');
        this.body.put_slice(&nested.encoded());
        this
    }

    fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 4);
        out.put_u32(u32::try_from(self.body.len()).expect("table fits a u32 length"));
        out.put_slice(&self.body);
        out
    }

    /// Finish the table.
    #[must_use]
    pub fn finish(self) -> Vec<u8> { self.encoded() }
}

/// A frame split out of captured client output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub frame_type: u8,
    pub channel: u16,
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Split `bytes` into frames, skipping a leading protocol greeting.
    ///
    /// # Panics
    ///
    /// Panics if the bytes are not a whole number of well-formed frames.
    #[must_use]
    pub fn parse_all(bytes: &[u8]) -> Vec<Self> {
        let mut rest = bytes.strip_prefix(b"AMQP".as_slice()).map_or(bytes, |_| &bytes[8..]);
        let mut frames = Vec::new();
        while rest.has_remaining() {
            assert!(rest.len() >= 8, "truncated frame header");
            let frame_type = rest.get_u8();
            let channel = rest.get_u16();
            let len = usize::try_from(rest.get_u32()).expect("frame length fits usize");
            assert!(rest.len() > len, "truncated frame payload");
            let payload = rest[..len].to_vec();
            rest.advance(len);
            assert_eq!(rest.get_u8(), FRAME_END, "frame end marker");
            frames.push(Self {
                frame_type,
                channel,
                payload,
            });
        }
        frames
    }

    /// Class and method index of a method frame.
    #[must_use]
    pub fn method(&self) -> Option<(u16, u16)> {
        if self.frame_type != METHOD || self.payload.len() < 4 {
            return None;
        }
        let mut id = &self.payload[..4];
        Some((id.get_u16(), id.get_u16()))
    }

    /// Arguments of a method frame.
    #[must_use]
    pub fn args(&self) -> &[u8] { self.payload.get(4..).unwrap_or_default() }
}
