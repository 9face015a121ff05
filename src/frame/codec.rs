//! `tokio_util` codec adapter over the frame reader and writer.
//!
//! Lets async callers drive the same reassembly state machine through
//! `FramedRead`/`FramedWrite`. The frame pool is recycled between frames;
//! pages still referenced by earlier frames are left to them.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Frame, FrameReader, Phase, encode_frame};
use crate::error::AmqpError;

/// Frame codec for AMQP 0-9-1 streams.
#[derive(Debug)]
pub struct AmqpCodec {
    reader: FrameReader,
}

impl AmqpCodec {
    /// Create a codec accepting frames of up to `frame_max` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the first frame buffer cannot be
    /// allocated.
    pub fn new(frame_max: usize) -> Result<Self, AmqpError> {
        Ok(Self {
            reader: FrameReader::new(frame_max)?,
        })
    }

    /// Largest frame accepted or produced, in bytes.
    #[must_use]
    pub const fn frame_max(&self) -> usize { self.reader.frame_max() }

    /// Adopt a newly negotiated frame size.
    ///
    /// # Panics
    ///
    /// Panics if called while a frame is partially decoded.
    pub fn retune(&mut self, frame_max: usize) { self.reader.retune(frame_max); }
}

impl Decoder for AmqpCodec {
    type Item = Frame;
    type Error = AmqpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while !src.is_empty() {
            if self.reader.phase() == Phase::Idle {
                self.reader.recycle();
            }
            let (consumed, frame) = self.reader.handle_input(src)?;
            src.advance(consumed);
            if frame.is_some() {
                return Ok(frame);
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if self.reader.is_mid_frame() => Err(AmqpError::ConnectionClosed),
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for AmqpCodec {
    type Error = AmqpError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        dst.resize(start + self.reader.frame_max(), 0);
        match encode_frame(&item, &mut dst[start..]) {
            Ok(len) => {
                dst.truncate(start + len);
                Ok(())
            }
            Err(error) => {
                dst.truncate(start);
                Err(error.into())
            }
        }
    }
}
