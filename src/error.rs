//! Canonical error and result types for the crate.
//!
//! Every failure the protocol core can report is an [`AmqpError`]. Each
//! variant maps onto a numeric [`ErrorCode`] partitioned into two categories
//! by a reserved high bit: client codes produced by this library and
//! transport codes sourced from the operating system's own error numbering.
//!
//! Wire-structure problems carry a detailed [`MalformedData`] reason but all
//! share the single "bad data" client code.

use std::io;

use thiserror::Error;

/// Bit marking an [`ErrorCode`] as originating from the transport.
pub const ERROR_CATEGORY_TRANSPORT: u32 = 1 << 29;

const ERROR_CATEGORY_MASK: u32 = ERROR_CATEGORY_TRANSPORT;

const ERROR_NO_MEMORY: u32 = 1;
const ERROR_BAD_AMQP_DATA: u32 = 2;
const ERROR_UNKNOWN_CLASS: u32 = 3;
const ERROR_UNKNOWN_METHOD: u32 = 4;
const ERROR_HOST_RESOLUTION: u32 = 5;
const ERROR_INCOMPATIBLE_VERSION: u32 = 6;
const ERROR_CONNECTION_CLOSED: u32 = 7;
const ERROR_BAD_URL: u32 = 8;

/// Descriptions for client codes, indexed by `code - 1`.
static CLIENT_ERROR_STRINGS: [&str; 8] = [
    "could not allocate memory",
    "received bad AMQP data",
    "unknown AMQP class id",
    "unknown AMQP method id",
    "unknown host",
    "incompatible AMQP version",
    "connection closed unexpectedly",
    "could not parse AMQP URL",
];

/// Detailed reasons for rejecting wire data.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MalformedData {
    /// A read or write would run past the end of the buffer.
    #[error("buffer too short: need {needed} bytes at offset {offset}, have {available}")]
    ShortBuffer {
        /// Offset at which the access started.
        offset: usize,
        /// Bytes the access required.
        needed: usize,
        /// Total length of the buffer.
        available: usize,
    },

    /// A field value carried a kind tag outside the defined set.
    #[error("unknown field value kind {0:#04x}")]
    UnknownFieldKind(u8),

    /// A nested table or array element crossed its container's boundary.
    #[error("container element overruns its declared length of {declared} bytes")]
    ContainerOverrun {
        /// Byte length announced by the container prefix.
        declared: usize,
    },

    /// Tables and arrays nest deeper than the decoder allows.
    #[error("field values nest deeper than {limit} levels")]
    NestingTooDeep {
        /// Maximum accepted nesting depth.
        limit: usize,
    },

    /// The frame-end octet did not match the protocol constant.
    #[error("frame end marker mismatch: expected 0xce, found {found:#04x}")]
    MissingFrameEnd {
        /// Octet found in the end-marker position.
        found: u8,
    },

    /// A frame announced a payload larger than the negotiated maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Total frame size implied by the header.
        size: usize,
        /// Negotiated frame maximum.
        max: usize,
    },

    /// A frame payload is too short for its frame type.
    #[error("frame payload of {len} bytes is too short for frame type {frame_type}")]
    TruncatedPayload {
        /// Frame type octet.
        frame_type: u8,
        /// Payload length received.
        len: usize,
    },

    /// A string or key exceeds the width of its length prefix.
    #[error("string of {len} bytes exceeds the {max}-byte limit of its length prefix")]
    StringTooLong {
        /// Length of the offending string.
        len: usize,
        /// Largest length the prefix can express.
        max: usize,
    },

    /// A frame of an unexpected type arrived.
    #[error("expected {expected} frame on channel {channel}, got frame type {frame_type}")]
    UnexpectedFrame {
        /// Channel being waited on.
        channel: u16,
        /// Human readable description of the awaited frame.
        expected: &'static str,
        /// Frame type octet actually received.
        frame_type: u8,
    },

    /// A method frame carried a different method or channel than awaited.
    #[error(
        "expected method {expected:#010x} on channel {channel}, got {actual:#010x} on channel \
         {actual_channel}"
    )]
    UnexpectedMethod {
        /// Channel being waited on.
        channel: u16,
        /// Awaited method id.
        expected: u32,
        /// Channel the method arrived on.
        actual_channel: u16,
        /// Method id actually received.
        actual: u32,
    },

    /// Body frames delivered more bytes than the content header announced.
    #[error("body frames carry {received} bytes but the content header announced {announced}")]
    BodyOverrun {
        /// Body size from the content header.
        announced: u64,
        /// Body bytes received so far.
        received: u64,
    },
}

/// Top-level error type exposed by `amqp_wire`.
#[derive(Debug, Error)]
pub enum AmqpError {
    /// The pool or allocator could not satisfy a request.
    #[error("could not allocate memory")]
    NoMemory,

    /// Wire data violated the protocol's structure.
    #[error("received bad AMQP data: {0}")]
    BadAmqpData(#[from] MalformedData),

    /// A content header named a class this library does not know.
    #[error("unknown AMQP class id {0}")]
    UnknownClass(u16),

    /// A method frame carried an id this library does not know.
    #[error("unknown AMQP method id {0:#010x}")]
    UnknownMethod(u32),

    /// The broker host name did not resolve to any address.
    #[error("unknown host {0}")]
    HostResolution(String),

    /// The broker announced a protocol version other than 0-9.
    #[error("incompatible AMQP version {major}-{minor}")]
    IncompatibleVersion {
        /// Major version announced by the broker.
        major: u8,
        /// Minor version announced by the broker.
        minor: u8,
    },

    /// The transport reported an orderly close while a frame was awaited.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// A connection URL could not be parsed.
    #[error("could not parse AMQP URL: {0}")]
    BadUrl(String),

    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl AmqpError {
    /// Return the numeric code for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqp_wire::{AmqpError, ErrorCode};
    ///
    /// assert_eq!(AmqpError::ConnectionClosed.code(), ErrorCode::new(7));
    /// ```
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoMemory => ErrorCode(ERROR_NO_MEMORY),
            Self::BadAmqpData(_) => ErrorCode(ERROR_BAD_AMQP_DATA),
            Self::UnknownClass(_) => ErrorCode(ERROR_UNKNOWN_CLASS),
            Self::UnknownMethod(_) => ErrorCode(ERROR_UNKNOWN_METHOD),
            Self::HostResolution(_) => ErrorCode(ERROR_HOST_RESOLUTION),
            Self::IncompatibleVersion { .. } => ErrorCode(ERROR_INCOMPATIBLE_VERSION),
            Self::ConnectionClosed => ErrorCode(ERROR_CONNECTION_CLOSED),
            Self::BadUrl(_) => ErrorCode(ERROR_BAD_URL),
            Self::Transport(error) => ErrorCode::transport(error),
        }
    }

    /// Returns true if the error was caused by malformed wire data.
    #[must_use]
    pub fn is_malformed(&self) -> bool { matches!(self, Self::BadAmqpData(_)) }
}

/// Numeric error code with a category bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// Wrap a raw code.
    #[must_use]
    pub const fn new(raw: u32) -> Self { Self(raw) }

    /// Build a transport code from an I/O error.
    ///
    /// Errors without an OS error number, such as those raised by a custom
    /// transport, map to transport code zero, which no OS uses for a failure.
    /// Its description is `"(unknown transport error)"`.
    #[must_use]
    pub fn transport(error: &io::Error) -> Self {
        let os = error
            .raw_os_error()
            .and_then(|raw| u32::try_from(raw).ok())
            .unwrap_or(0);
        Self(ERROR_CATEGORY_TRANSPORT | (os & !ERROR_CATEGORY_MASK))
    }

    /// Return the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Returns true if the code came from the transport.
    #[must_use]
    pub const fn is_transport(self) -> bool { self.0 & ERROR_CATEGORY_MASK != 0 }

    /// Describe the error code.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqp_wire::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::new(2).description(), "received bad AMQP data");
    /// assert_eq!(ErrorCode::new(99).description(), "(undefined client error)");
    /// ```
    #[must_use]
    pub fn description(self) -> String {
        let code = self.0 & !ERROR_CATEGORY_MASK;
        if self.is_transport() {
            if code == 0 {
                return "(unknown transport error)".to_owned();
            }
            return i32::try_from(code).map_or_else(
                |_| "(undefined transport error)".to_owned(),
                |raw| io::Error::from_raw_os_error(raw).to_string(),
            );
        }
        usize::try_from(code)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| CLIENT_ERROR_STRINGS.get(index))
            .map_or_else(|| "(undefined client error)".to_owned(), |s| (*s).to_owned())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Canonical result alias used by `amqp_wire` public APIs.
pub type Result<T> = std::result::Result<T, AmqpError>;
