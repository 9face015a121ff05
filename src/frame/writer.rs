//! Frame encoding into bounded buffers.

use super::{FOOTER_SIZE, FRAME_END, Frame, FramePayload, FrameType, HEADER_SIZE};
use crate::{
    codec::{WireWriter, table::long_len},
    error::MalformedData,
};

/// Encode `frame` into the start of `buf`, returning the bytes written.
///
/// A protocol greeting is written as its eight raw bytes.
///
/// # Errors
///
/// Returns [`MalformedData::ShortBuffer`] if the frame does not fit in `buf`
/// and [`MalformedData::StringTooLong`] if an argument exceeds its length
/// prefix.
///
/// # Examples
///
/// ```
/// use amqp_wire::frame::{Frame, FramePayload, encode_frame};
///
/// let mut buf = [0u8; 16];
/// let len = encode_frame(&Frame::new(0, FramePayload::Heartbeat), &mut buf).expect("fits");
/// assert_eq!(&buf[..len], &[8, 0, 0, 0, 0, 0, 0, 0xCE]);
/// ```
pub fn encode_frame(frame: &Frame, buf: &mut [u8]) -> Result<usize, MalformedData> {
    let mut wire = WireWriter::new(buf);
    if let FramePayload::ProtocolHeader(header) = &frame.payload {
        wire.write_bytes(&header.to_bytes())?;
        return Ok(wire.offset());
    }

    wire.write_u8(frame.frame_type().octet())?;
    wire.write_u16(frame.channel)?;
    let size_at = wire.reserve_u32()?;
    let start = wire.offset();

    match &frame.payload {
        FramePayload::Method(method) => {
            wire.write_u32(method.id().0)?;
            method.encode(&mut wire)?;
        }
        FramePayload::Header(header) => {
            wire.write_u16(header.class_id)?;
            wire.write_u16(0)?;
            wire.write_u64(header.body_size)?;
            header.properties.encode(&mut wire)?;
        }
        FramePayload::Body(body) => wire.write_bytes(body)?,
        FramePayload::Heartbeat | FramePayload::ProtocolHeader(_) => {}
    }

    let size = long_len(wire.offset() - start)?;
    wire.patch_u32(size_at, size);
    wire.write_u8(FRAME_END)?;
    Ok(wire.offset())
}

/// Header octets of a body frame carrying `len` bytes on `channel`.
///
/// Used to send a body without copying it into the outbound buffer: the
/// caller writes these octets, the body, then [`FRAME_END`].
///
/// # Errors
///
/// Returns [`MalformedData::StringTooLong`] if `len` exceeds the 32-bit size
/// field.
pub fn body_frame_header(channel: u16, len: usize) -> Result<[u8; HEADER_SIZE], MalformedData> {
    let mut header = [0u8; HEADER_SIZE];
    let mut wire = WireWriter::new(&mut header);
    wire.write_u8(FrameType::Body.octet())?;
    wire.write_u16(channel)?;
    wire.write_u32(long_len(len)?)?;
    Ok(header)
}

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;
