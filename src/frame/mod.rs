//! AMQP frames and their wire layout.
//!
//! A frame is `type:u8 | channel:u16 | size:u32 | payload | 0xCE`. The
//! [`reader`] reassembles frames from arbitrary input chunks, the [`writer`]
//! lays them out into a bounded buffer and [`codec`] adapts both to
//! `tokio_util`'s framing traits.

use bytes::Bytes;

use crate::method::{Method, MethodId, Properties};

pub mod codec;
pub mod reader;
pub mod writer;

pub use codec::AmqpCodec;
pub use reader::{FrameReader, Phase};
pub use writer::{body_frame_header, encode_frame};

/// Size of the fixed frame header: type, channel and payload size.
pub const HEADER_SIZE: usize = 7;

/// Size of the frame-end marker.
pub const FOOTER_SIZE: usize = 1;

/// Frame-end marker octet.
pub const FRAME_END: u8 = 0xCE;

/// Smallest frame size a peer may negotiate.
pub const FRAME_MIN_SIZE: usize = 4096;

/// Length of the protocol greeting.
pub const PROTOCOL_HEADER_SIZE: usize = 8;

/// Frame type octets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Method = 1,
    Header = 2,
    Body = 3,
    Heartbeat = 8,
    /// Pseudo-type reported for the `AMQP` greeting.
    ProtocolHeader = b'A',
}

impl FrameType {
    /// Octet used on the wire (or to report the greeting).
    #[must_use]
    pub const fn octet(self) -> u8 { self as u8 }

    /// Look up a wire frame type. The greeting pseudo-type is not a wire
    /// frame type and is never returned.
    #[must_use]
    pub const fn from_octet(octet: u8) -> Option<Self> {
        match octet {
            1 => Some(Self::Method),
            2 => Some(Self::Header),
            3 => Some(Self::Body),
            8 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// The `AMQP` greeting: protocol id octet followed by the version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolHeader {
    pub protocol_id: u8,
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
}

impl ProtocolHeader {
    /// Greeting sent by a 0-9-1 client.
    pub const AMQP_0_9_1: Self = Self {
        protocol_id: 0,
        major: 0,
        minor: 9,
        revision: 1,
    };

    /// Wire form of the greeting.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; PROTOCOL_HEADER_SIZE] {
        [
            b'A',
            b'M',
            b'Q',
            b'P',
            self.protocol_id,
            self.major,
            self.minor,
            self.revision,
        ]
    }
}

/// Payload of a content-header frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentHeader {
    pub class_id: u16,
    /// Total length of the body frames that follow.
    pub body_size: u64,
    pub properties: Properties,
    /// Encoded property list exactly as received; empty on frames built
    /// locally.
    pub raw: Bytes,
}

/// Decoded frame payload.
#[derive(Clone, Debug, PartialEq)]
pub enum FramePayload {
    ProtocolHeader(ProtocolHeader),
    Method(Method),
    Header(ContentHeader),
    Body(Bytes),
    Heartbeat,
}

/// A decoded frame and the channel it travelled on.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub channel: u16,
    pub payload: FramePayload,
}

impl Frame {
    /// Bundle a payload with its channel.
    #[must_use]
    pub const fn new(channel: u16, payload: FramePayload) -> Self { Self { channel, payload } }

    /// Build a method frame.
    #[must_use]
    pub fn method(channel: u16, method: impl Into<Method>) -> Self {
        Self::new(channel, FramePayload::Method(method.into()))
    }

    /// Frame type of the payload.
    #[must_use]
    pub const fn frame_type(&self) -> FrameType {
        match self.payload {
            FramePayload::ProtocolHeader(_) => FrameType::ProtocolHeader,
            FramePayload::Method(_) => FrameType::Method,
            FramePayload::Header(_) => FrameType::Header,
            FramePayload::Body(_) => FrameType::Body,
            FramePayload::Heartbeat => FrameType::Heartbeat,
        }
    }

    /// The carried method, if this is a method frame.
    #[must_use]
    pub const fn as_method(&self) -> Option<&Method> {
        match &self.payload {
            FramePayload::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Id of the carried method, if this is a method frame.
    #[must_use]
    pub fn method_id(&self) -> Option<MethodId> { self.as_method().map(Method::id) }
}
