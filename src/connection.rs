//! Synchronous connection state.
//!
//! A [`Connection`] owns everything one logical AMQP connection needs: the
//! frame reader and its pool, the decoding pool, the negotiated limits, the
//! outbound scratch buffer, the socket read buffer and the queue of frames
//! deferred while an RPC was outstanding. Every operation runs on the
//! caller's thread; the only blocking point is [`Transport::recv`].
//!
//! Frames come back in wire order, except that [`Connection::simple_rpc`]
//! hands its reply straight to the caller and defers everything else it
//! sees. [`Connection::simple_wait_frame`] drains deferred frames before
//! reading the transport again.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{
    codec::table::widen,
    config::Tuning,
    error::{AmqpError, MalformedData},
    frame::{
        FRAME_END,
        Frame,
        FramePayload,
        FrameReader,
        ProtocolHeader,
        body_frame_header,
        encode_frame,
        reader::clamp_frame_max,
        writer::FRAME_OVERHEAD,
    },
    method::{Method, MethodId},
    pool::Pool,
    reply::RpcReply,
    transport::Transport,
};

mod api;
mod content;
mod login;
mod rpc;

pub use content::Content;
pub use login::{AuthMechanism, CLIENT_PRODUCT};

/// Limits in force before login negotiates new ones.
pub const INITIAL_TUNING: Tuning = Tuning {
    channel_max: 0,
    frame_max: 65_536,
    heartbeat: 0,
};

/// Page size of the decoding pool.
pub const INITIAL_DECODING_POOL_PAGE_SIZE: usize = 131_072;

/// Size of the buffer each transport read fills.
pub const INITIAL_INBOUND_SOCK_BUFFER_SIZE: usize = 131_072;

/// State of one AMQP connection over a blocking transport.
#[derive(Debug)]
pub struct Connection<T> {
    transport: T,
    reader: FrameReader,
    decoding_pool: Pool,
    tuning: Tuning,
    outbound: Vec<u8>,
    sock_inbound: Vec<u8>,
    sock_offset: usize,
    sock_limit: usize,
    queue: VecDeque<Frame>,
    most_recent: RpcReply,
}

impl<T: Transport> Connection<T> {
    /// Wrap an open transport. Nothing is sent until [`Connection::login`]
    /// or [`Connection::send_header`].
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the initial buffers cannot be
    /// allocated.
    pub fn new(transport: T) -> Result<Self, AmqpError> {
        let reader = FrameReader::new(widen(INITIAL_TUNING.frame_max))?;
        Ok(Self {
            transport,
            outbound: zeroed(reader.frame_max())?,
            tuning: INITIAL_TUNING,
            reader,
            decoding_pool: Pool::new(clamp_frame_max(INITIAL_DECODING_POOL_PAGE_SIZE)),
            sock_inbound: zeroed(INITIAL_INBOUND_SOCK_BUFFER_SIZE)?,
            sock_offset: 0,
            sock_limit: 0,
            queue: VecDeque::new(),
            most_recent: RpcReply::None,
        })
    }

    /// Borrow the transport.
    pub const fn transport(&self) -> &T { &self.transport }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Give up the connection state and return the transport.
    pub fn into_transport(self) -> T { self.transport }

    /// Apply negotiated limits and resize the frame buffers to match.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the outbound buffer cannot be
    /// resized.
    ///
    /// # Panics
    ///
    /// Panics if a frame is partially reassembled.
    pub fn tune(&mut self, tuning: Tuning) -> Result<(), AmqpError> {
        let outbound = zeroed(clamp_frame_max(widen(tuning.frame_max)).get())?;
        self.reader.retune(widen(tuning.frame_max));
        self.outbound = outbound;
        self.tuning = tuning;
        debug!(
            channel_max = tuning.channel_max,
            frame_max = tuning.frame_max,
            heartbeat = tuning.heartbeat,
            "connection tuned"
        );
        Ok(())
    }

    /// Current limits.
    #[must_use]
    pub const fn tuning(&self) -> Tuning { self.tuning }

    /// Negotiated channel limit; zero means unlimited.
    #[must_use]
    pub const fn channel_max(&self) -> u16 { self.tuning.channel_max }

    /// Negotiated frame size limit.
    #[must_use]
    pub const fn frame_max(&self) -> u32 { self.tuning.frame_max }

    /// Negotiated heartbeat interval in seconds; zero disables heartbeats.
    #[must_use]
    pub const fn heartbeat(&self) -> u16 { self.tuning.heartbeat }

    /// Returns true if the buffers may be released: no frame is partially
    /// reassembled and no frame is deferred.
    #[must_use]
    pub fn release_buffers_ok(&self) -> bool {
        !self.reader.is_mid_frame() && self.queue.is_empty()
    }

    /// Recycle the frame and decoding pools.
    ///
    /// # Panics
    ///
    /// Panics if a frame is partially reassembled or frames are deferred.
    pub fn release_buffers(&mut self) {
        assert!(
            self.queue.is_empty(),
            "buffers released while {} deferred frames are queued",
            self.queue.len()
        );
        self.reader.recycle();
        self.decoding_pool.recycle();
        debug!("connection buffers released");
    }

    /// Release the buffers if [`Connection::release_buffers_ok`].
    pub fn maybe_release_buffers(&mut self) {
        if self.release_buffers_ok() {
            self.release_buffers();
        }
    }

    /// Returns true if frames deferred by an RPC are waiting.
    #[must_use]
    pub fn frames_enqueued(&self) -> bool { !self.queue.is_empty() }

    /// Returns true if bytes from the last transport read remain unparsed.
    #[must_use]
    pub const fn data_in_buffer(&self) -> bool { self.sock_offset < self.sock_limit }

    /// Send the 0-9-1 protocol greeting.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::Transport`] if the write fails.
    pub fn send_header(&mut self) -> Result<(), AmqpError> {
        let greeting = ProtocolHeader::AMQP_0_9_1.to_bytes();
        self.transport.send(&[greeting.as_slice()])?;
        Ok(())
    }

    /// Encode and send one frame.
    ///
    /// Body frames are written straight from their payload; everything else
    /// is laid out in the outbound buffer first.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::BadAmqpData`] if the frame does not fit in
    /// `frame_max` and [`AmqpError::Transport`] if the write fails.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<(), AmqpError> {
        if let FramePayload::Body(body) = &frame.payload {
            return self.send_body(frame.channel, body);
        }
        let len = encode_frame(frame, &mut self.outbound)?;
        self.transport.send(&[&self.outbound[..len]])?;
        trace!(channel = frame.channel, len, method = ?frame.method_id(), "sent frame");
        Ok(())
    }

    fn send_body(&mut self, channel: u16, body: &[u8]) -> Result<(), AmqpError> {
        let size = body.len() + FRAME_OVERHEAD;
        if size > self.reader.frame_max() {
            return Err(MalformedData::OversizedFrame {
                size,
                max: self.reader.frame_max(),
            }
            .into());
        }
        let header = body_frame_header(channel, body.len())?;
        self.transport.send(&[header.as_slice(), body, &[FRAME_END]])?;
        trace!(channel, len = body.len(), "sent body frame");
        Ok(())
    }

    /// Return the next frame, deferred frames first.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::ConnectionClosed`] if the transport closes,
    /// [`AmqpError::Transport`] if it fails and any decoding error raised by
    /// the frame reader.
    pub fn simple_wait_frame(&mut self) -> Result<Frame, AmqpError> {
        match self.queue.pop_front() {
            Some(frame) => Ok(frame),
            None => self.next_live_frame(),
        }
    }

    /// Wait for method `expected` on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::UnexpectedFrame`] or
    /// [`MalformedData::UnexpectedMethod`] if anything else arrives, plus the
    /// errors of [`Connection::simple_wait_frame`].
    pub fn simple_wait_method(
        &mut self,
        channel: u16,
        expected: MethodId,
    ) -> Result<Method, AmqpError> {
        let frame = self.simple_wait_frame()?;
        expect_method(frame, channel, expected)
    }

    /// Read frames from the transport, ignoring the deferred queue.
    fn next_live_frame(&mut self) -> Result<Frame, AmqpError> {
        loop {
            while self.data_in_buffer() {
                let (used, frame) = self
                    .reader
                    .handle_input(&self.sock_inbound[self.sock_offset..self.sock_limit])?;
                self.sock_offset += used;
                if let Some(frame) = frame {
                    return Ok(frame);
                }
            }

            let read = self.transport.recv(&mut self.sock_inbound)?;
            if read == 0 {
                return Err(AmqpError::ConnectionClosed);
            }
            trace!(read, "transport read");
            self.sock_offset = 0;
            self.sock_limit = read;
        }
    }
}

/// Unwrap the method of `frame`, checking its channel and id.
fn expect_method(frame: Frame, channel: u16, expected: MethodId) -> Result<Method, AmqpError> {
    let frame_type = frame.frame_type().octet();
    let actual_channel = frame.channel;
    let FramePayload::Method(method) = frame.payload else {
        return Err(MalformedData::UnexpectedFrame {
            channel,
            expected: "method",
            frame_type,
        }
        .into());
    };
    if actual_channel != channel || method.id() != expected {
        return Err(MalformedData::UnexpectedMethod {
            channel,
            expected: expected.0,
            actual_channel,
            actual: method.id().0,
        }
        .into());
    }
    Ok(method)
}

fn zeroed(len: usize) -> Result<Vec<u8>, AmqpError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| AmqpError::NoMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

#[cfg(test)]
mod tests;
