//! Request/reply correlation.

use tracing::debug;

use super::Connection;
use crate::{
    error::AmqpError,
    frame::{Frame, FramePayload},
    method::{Method, MethodId},
    reply::RpcReply,
    transport::Transport,
};

impl<T: Transport> Connection<T> {
    /// Send `method` on `channel` as a single method frame.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::BadAmqpData`] if the method does not fit in a
    /// frame and [`AmqpError::Transport`] if the write fails.
    pub fn send_method(
        &mut self,
        channel: u16,
        method: impl Into<Method>,
    ) -> Result<(), AmqpError> {
        self.send_frame(&Frame::method(channel, method))
    }

    /// Send `request` and wait for its reply.
    ///
    /// The reply is the first method frame that is one of `expected` on
    /// `channel`, a `channel.close` on `channel` or a `connection.close` on
    /// channel 0. Deferred frames are searched before the transport is read;
    /// every other frame read while waiting is deferred in arrival order.
    ///
    /// Failures are reported in the returned [`RpcReply`], never raised.
    pub fn simple_rpc(
        &mut self,
        channel: u16,
        request: impl Into<Method>,
        expected: &[MethodId],
    ) -> RpcReply {
        if let Err(error) = self.send_method(channel, request) {
            return error.into();
        }
        let method = match self.take_deferred_reply(channel, expected) {
            Some(method) => method,
            None => match self.wait_live_reply(channel, expected) {
                Ok(method) => method,
                Err(error) => return error.into(),
            },
        };
        if expected.contains(&method.id()) {
            RpcReply::Normal(method)
        } else {
            RpcReply::ServerException(method)
        }
    }

    /// Run [`Connection::simple_rpc`] expecting the single reply `reply`,
    /// record the outcome and return the reply method if it was normal.
    pub fn simple_rpc_decoded(
        &mut self,
        channel: u16,
        request: impl Into<Method>,
        reply: MethodId,
    ) -> Option<Method> {
        self.most_recent = self.simple_rpc(channel, request, &[reply]);
        match &self.most_recent {
            RpcReply::Normal(method) => Some(method.clone()),
            _ => None,
        }
    }

    /// Outcome of the most recent synchronous call.
    #[must_use]
    pub const fn rpc_reply(&self) -> &RpcReply { &self.most_recent }

    fn take_deferred_reply(&mut self, channel: u16, expected: &[MethodId]) -> Option<Method> {
        let position = self
            .queue
            .iter()
            .position(|frame| is_reply(frame, channel, expected))?;
        let frame = self.queue.remove(position)?;
        debug!(channel, position, "reply served from deferred frames");
        match frame.payload {
            FramePayload::Method(method) => Some(method),
            _ => None,
        }
    }

    fn wait_live_reply(
        &mut self,
        channel: u16,
        expected: &[MethodId],
    ) -> Result<Method, AmqpError> {
        loop {
            let frame = self.next_live_frame()?;
            if is_reply(&frame, channel, expected) {
                if let FramePayload::Method(method) = frame.payload {
                    return Ok(method);
                }
                continue;
            }
            self.queue.try_reserve(1).map_err(|_| AmqpError::NoMemory)?;
            debug!(
                channel = frame.channel,
                frame_type = frame.frame_type().octet(),
                method = ?frame.method_id(),
                awaiting = channel,
                "deferring frame"
            );
            self.queue.push_back(frame);
        }
    }
}

fn is_reply(frame: &Frame, channel: u16, expected: &[MethodId]) -> bool {
    frame.method_id().is_some_and(|id| {
        (frame.channel == channel && (expected.contains(&id) || id == MethodId::CHANNEL_CLOSE))
            || (frame.channel == 0 && id == MethodId::CONNECTION_CLOSE)
    })
}
