//! Incremental frame reassembly.
//!
//! [`FrameReader::handle_input`] accepts input in chunks of any size,
//! copying bytes into a frame buffer until a complete frame is present and
//! then decoding it. Partial progress is carried across calls, so a caller
//! can feed socket reads straight through.
//!
//! ```text
//! Initial --"AMQP"--> Idle
//!    |                  |
//!    +---- 7+ bytes ----+--> Header --size known--> Body --frame end--> Idle
//! ```

use std::{mem, num::NonZeroUsize};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use super::{
    ContentHeader,
    FOOTER_SIZE,
    FRAME_END,
    FRAME_MIN_SIZE,
    Frame,
    FramePayload,
    FrameType,
    HEADER_SIZE,
    PROTOCOL_HEADER_SIZE,
    ProtocolHeader,
};
use crate::{
    codec::{WireReader, table::widen},
    error::{AmqpError, MalformedData},
    method::{Method, MethodId, Properties},
    pool::Pool,
};

/// Bytes of a method payload before its arguments.
const METHOD_PREAMBLE: usize = 4;

/// Bytes of a content-header payload before its property list.
const HEADER_PREAMBLE: usize = 12;

/// Reassembly phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Between frames; no frame buffer is held.
    Idle,
    /// Freshly opened; the next eight bytes may be a protocol greeting.
    Initial,
    /// Collecting the seven-byte frame header.
    Header,
    /// Collecting the payload and frame-end marker.
    Body,
}

/// Frame reassembly state machine.
#[derive(Debug)]
pub struct FrameReader {
    phase: Phase,
    pool: Pool,
    frame_max: usize,
    inbound: BytesMut,
    offset: usize,
    target: usize,
}

/// Clamp a negotiated frame size to the protocol minimum.
#[must_use]
pub fn clamp_frame_max(frame_max: usize) -> NonZeroUsize {
    NonZeroUsize::new(frame_max.max(FRAME_MIN_SIZE)).unwrap_or(NonZeroUsize::MIN)
}

impl FrameReader {
    /// Create a reader in the [`Phase::Initial`] state, ready to receive a
    /// protocol greeting or a first frame.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the first frame buffer cannot be
    /// allocated.
    pub fn new(frame_max: usize) -> Result<Self, AmqpError> {
        let page_size = clamp_frame_max(frame_max);
        let mut pool = Pool::new(page_size);
        let inbound = pool.reserve(page_size.get())?;
        Ok(Self {
            phase: Phase::Initial,
            pool,
            frame_max: page_size.get(),
            inbound,
            offset: 0,
            target: PROTOCOL_HEADER_SIZE,
        })
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase { self.phase }

    /// Largest frame the reader accepts, in bytes.
    #[must_use]
    pub const fn frame_max(&self) -> usize { self.frame_max }

    /// Frame pool backing the reassembly buffers.
    #[must_use]
    pub const fn pool(&self) -> &Pool { &self.pool }

    /// Returns true if bytes of an incomplete frame are buffered.
    #[must_use]
    pub fn is_mid_frame(&self) -> bool { self.offset > 0 && self.phase != Phase::Idle }

    /// Resize frame buffers for a newly negotiated `frame_max`.
    ///
    /// # Panics
    ///
    /// Panics if bytes of an incomplete frame are buffered.
    pub fn retune(&mut self, frame_max: usize) {
        assert!(
            !self.is_mid_frame(),
            "frame reader retuned while a frame is being reassembled"
        );
        let page_size = clamp_frame_max(frame_max);
        self.inbound = BytesMut::new();
        self.pool.empty();
        self.pool = Pool::new(page_size);
        self.frame_max = page_size.get();
    }

    /// Rewind the frame pool for reuse.
    ///
    /// # Panics
    ///
    /// Panics if bytes of an incomplete frame are buffered.
    pub fn recycle(&mut self) {
        assert!(
            !self.is_mid_frame(),
            "frame buffers released while a frame is being reassembled"
        );
        self.pool.recycle();
    }

    /// Feed `input` into the reassembly buffer.
    ///
    /// Returns the number of bytes consumed and, when a frame was completed,
    /// the decoded frame. Frames of unknown type are consumed without being
    /// returned. Empty input consumes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::BadAmqpData`] for a missing frame-end marker, a
    /// frame larger than `frame_max`, or a malformed payload;
    /// [`AmqpError::UnknownMethod`] or [`AmqpError::UnknownClass`] for
    /// payloads outside the catalogue; and [`AmqpError::NoMemory`] if no
    /// frame buffer can be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqp_wire::frame::{FramePayload, FrameReader};
    ///
    /// let mut reader = FrameReader::new(4096).expect("reader");
    /// let (used, frame) = reader.handle_input(b"AMQP\x00\x00\x09\x01").expect("greeting");
    /// assert_eq!(used, 8);
    /// assert!(matches!(
    ///     frame.map(|frame| frame.payload),
    ///     Some(FramePayload::ProtocolHeader(_))
    /// ));
    /// ```
    pub fn handle_input(&mut self, input: &[u8]) -> Result<(usize, Option<Frame>), AmqpError> {
        if input.is_empty() {
            return Ok((0, None));
        }

        if self.inbound.capacity() == 0 {
            self.inbound = self.pool.reserve(self.frame_max)?;
            if self.phase == Phase::Idle {
                self.phase = Phase::Header;
            }
        }

        let mut consumed = self.consume(input);
        if self.offset < self.target {
            trace!(consumed, buffered = self.offset, target = self.target, "partial frame");
            return Ok((consumed, None));
        }

        if self.phase == Phase::Initial {
            if self.inbound.starts_with(b"AMQP") {
                let header = ProtocolHeader {
                    protocol_id: self.inbound[4],
                    major: self.inbound[5],
                    minor: self.inbound[6],
                    revision: self.inbound[7],
                };
                self.return_to_idle();
                debug!(?header, "received protocol header");
                return Ok((
                    consumed,
                    Some(Frame::new(0, FramePayload::ProtocolHeader(header))),
                ));
            }
            self.phase = Phase::Header;
        }

        if self.phase == Phase::Header {
            let mut header = [0u8; 4];
            header.copy_from_slice(&self.inbound[3..HEADER_SIZE]);
            #[expect(
                clippy::big_endian_bytes,
                reason = "AMQP encodes multi-byte integers in network byte order."
            )]
            let payload_len = u32::from_be_bytes(header);
            let target = widen(payload_len).saturating_add(HEADER_SIZE + FOOTER_SIZE);
            if target > self.frame_max {
                return Err(MalformedData::OversizedFrame {
                    size: target,
                    max: self.frame_max,
                }
                .into());
            }
            self.target = target;
            self.phase = Phase::Body;

            consumed += self.consume(&input[consumed..]);
            if self.offset < self.target {
                trace!(consumed, buffered = self.offset, target = self.target, "partial frame");
                return Ok((consumed, None));
            }
        }

        let raw = mem::take(&mut self.inbound);
        self.return_to_idle();
        let frame = decode_frame(raw.freeze())?;
        Ok((consumed, frame))
    }

    fn consume(&mut self, input: &[u8]) -> usize {
        let wanted = self.target - self.offset;
        let taken = wanted.min(input.len());
        self.inbound.extend_from_slice(&input[..taken]);
        self.offset += taken;
        taken
    }

    fn return_to_idle(&mut self) {
        self.inbound = BytesMut::new();
        self.offset = 0;
        self.target = HEADER_SIZE;
        self.phase = Phase::Idle;
    }
}

fn decode_frame(raw: Bytes) -> Result<Option<Frame>, AmqpError> {
    let end = raw.len() - FOOTER_SIZE;
    if raw[end] != FRAME_END {
        return Err(MalformedData::MissingFrameEnd { found: raw[end] }.into());
    }

    let mut header = WireReader::new(&raw);
    let frame_type = header.read_u8()?;
    let channel = header.read_u16()?;
    let payload = raw.slice(HEADER_SIZE..end);

    let decoded = match FrameType::from_octet(frame_type) {
        Some(FrameType::Method) => {
            require_len(frame_type, &payload, METHOD_PREAMBLE)?;
            let id = MethodId(WireReader::new(&payload).read_u32()?);
            FramePayload::Method(Method::decode(id, &payload, METHOD_PREAMBLE)?)
        }
        Some(FrameType::Header) => {
            require_len(frame_type, &payload, HEADER_PREAMBLE)?;
            let mut fields = WireReader::new(&payload);
            let class_id = fields.read_u16()?;
            let _weight = fields.read_u16()?;
            let body_size = fields.read_u64()?;
            FramePayload::Header(ContentHeader {
                class_id,
                body_size,
                properties: Properties::decode(class_id, &payload, HEADER_PREAMBLE)?,
                raw: payload.slice(HEADER_PREAMBLE..),
            })
        }
        Some(FrameType::Body) => FramePayload::Body(payload),
        Some(FrameType::Heartbeat) => FramePayload::Heartbeat,
        Some(FrameType::ProtocolHeader) | None => {
            warn!(frame_type, channel, "ignoring frame of unknown type");
            return Ok(None);
        }
    };
    let frame = Frame::new(channel, decoded);
    debug!(channel, frame_type, method = ?frame.method_id(), "decoded frame");
    Ok(Some(frame))
}

fn require_len(frame_type: u8, payload: &Bytes, needed: usize) -> Result<(), MalformedData> {
    if payload.len() < needed {
        return Err(MalformedData::TruncatedPayload {
            frame_type,
            len: payload.len(),
        });
    }
    Ok(())
}
