//! Reading message content: a content header followed by body frames.

use bytes::{Bytes, BytesMut};

use super::Connection;
use crate::{
    error::{AmqpError, MalformedData},
    frame::FramePayload,
    method::Properties,
    transport::Transport,
};

/// A message body and its properties.
#[derive(Clone, Debug, PartialEq)]
pub struct Content {
    pub class_id: u16,
    pub properties: Properties,
    pub body: Bytes,
}

impl<T: Transport> Connection<T> {
    /// Read the content that follows a `basic.deliver`, `basic.get-ok` or
    /// `basic.return` on `channel`.
    ///
    /// A body carried by a single frame is returned without copying; longer
    /// bodies are gathered into a buffer taken from the decoding pool. The
    /// announced size is never allocated up front: the buffer starts at no
    /// more than one pool page and grows with the fragments that arrive.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData::UnexpectedFrame`] if any other frame
    /// interrupts the content, [`MalformedData::BodyOverrun`] if the body
    /// frames carry more bytes than the header announced and the errors of
    /// [`Connection::simple_wait_frame`].
    pub fn read_content(&mut self, channel: u16) -> Result<Content, AmqpError> {
        let frame = self.simple_wait_frame()?;
        let frame_type = frame.frame_type().octet();
        let header = match frame.payload {
            FramePayload::Header(header) if frame.channel == channel => header,
            _ => {
                return Err(MalformedData::UnexpectedFrame {
                    channel,
                    expected: "content header",
                    frame_type,
                }
                .into());
            }
        };

        let announced = header.body_size;
        let mut whole = Bytes::new();
        let mut gathered: Option<BytesMut> = None;
        let mut received = 0u64;
        while received < announced {
            let fragment = self.next_body_fragment(channel)?;
            received += fragment.len() as u64;
            if received > announced {
                return Err(MalformedData::BodyOverrun {
                    announced,
                    received,
                }
                .into());
            }
            if gathered.is_none() {
                if received == announced {
                    whole = fragment;
                    break;
                }
                let hint = usize::try_from(announced)
                    .unwrap_or(usize::MAX)
                    .min(self.decoding_pool.page_size());
                gathered = Some(self.decoding_pool.reserve(hint)?);
            }
            if let Some(buf) = &mut gathered {
                buf.extend_from_slice(&fragment);
            }
        }

        Ok(Content {
            class_id: header.class_id,
            properties: header.properties,
            body: gathered.map_or(whole, BytesMut::freeze),
        })
    }

    fn next_body_fragment(&mut self, channel: u16) -> Result<Bytes, AmqpError> {
        let frame = self.simple_wait_frame()?;
        let frame_type = frame.frame_type().octet();
        match frame.payload {
            FramePayload::Body(fragment) if frame.channel == channel => Ok(fragment),
            _ => Err(MalformedData::UnexpectedFrame {
                channel,
                expected: "content body",
                frame_type,
            }
            .into()),
        }
    }
}
