//! Canned server frames for scripting a broker conversation.

use crate::wire::{ArgBuilder, TableBuilder, body_frame, header_frame, method_frame};

/// `connection.start` announcing protocol version `major`-`minor`, the
/// `PLAIN` mechanism and the `en_US` locale.
#[must_use]
pub fn connection_start(major: u8, minor: u8) -> Vec<u8> {
    let properties = TableBuilder::new()
        .longstr("product", "scripted-broker")
        .table(
            "capabilities",
            &TableBuilder::new().boolean("publisher_confirms", true),
        )
        .finish();
    let args = ArgBuilder::new()
        .octet(major)
        .octet(minor)
        .table(&properties)
        .longstr(b"PLAIN AMQPLAIN")
        .longstr(b"en_US")
        .finish();
    method_frame(0, 10, 10, &args)
}

/// `connection.tune` proposing the given limits.
#[must_use]
pub fn connection_tune(channel_max: u16, frame_max: u32, heartbeat: u16) -> Vec<u8> {
    let args = ArgBuilder::new()
        .short(channel_max)
        .long(frame_max)
        .short(heartbeat)
        .finish();
    method_frame(0, 10, 30, &args)
}

/// `connection.open-ok`.
#[must_use]
pub fn connection_open_ok() -> Vec<u8> {
    method_frame(0, 10, 41, &ArgBuilder::new().shortstr("").finish())
}

/// The whole server side of a successful login, in order.
#[must_use]
pub fn login(channel_max: u16, frame_max: u32, heartbeat: u16) -> Vec<Vec<u8>> {
    vec![
        connection_start(0, 9),
        connection_tune(channel_max, frame_max, heartbeat),
        connection_open_ok(),
    ]
}

fn close_args(code: u16, text: &str, class_id: u16, method_index: u16) -> Vec<u8> {
    ArgBuilder::new()
        .short(code)
        .shortstr(text)
        .short(class_id)
        .short(method_index)
        .finish()
}

/// `connection.close` sent by the server on channel 0.
#[must_use]
pub fn connection_close(code: u16, text: &str, class_id: u16, method_index: u16) -> Vec<u8> {
    method_frame(0, 10, 50, &close_args(code, text, class_id, method_index))
}

/// `connection.close-ok`.
#[must_use]
pub fn connection_close_ok() -> Vec<u8> { method_frame(0, 10, 51, &[]) }

/// `channel.open-ok`.
#[must_use]
pub fn channel_open_ok(channel: u16) -> Vec<u8> {
    method_frame(channel, 20, 11, &ArgBuilder::new().longstr(b"").finish())
}

/// `channel.close` sent by the server.
#[must_use]
pub fn channel_close(
    channel: u16,
    code: u16,
    text: &str,
    class_id: u16,
    method_index: u16,
) -> Vec<u8> {
    method_frame(channel, 20, 40, &close_args(code, text, class_id, method_index))
}

/// `channel.close-ok`.
#[must_use]
pub fn channel_close_ok(channel: u16) -> Vec<u8> { method_frame(channel, 20, 41, &[]) }

/// `queue.declare-ok` for `queue`.
#[must_use]
pub fn queue_declare_ok(channel: u16, queue: &str, messages: u32, consumers: u32) -> Vec<u8> {
    let args = ArgBuilder::new()
        .shortstr(queue)
        .long(messages)
        .long(consumers)
        .finish();
    method_frame(channel, 50, 11, &args)
}

/// `basic.qos-ok`.
#[must_use]
pub fn basic_qos_ok(channel: u16) -> Vec<u8> { method_frame(channel, 60, 11, &[]) }

/// `basic.deliver` to `consumer_tag`; content frames must follow.
#[must_use]
pub fn basic_deliver(channel: u16, consumer_tag: &str, delivery_tag: u64) -> Vec<u8> {
    let args = ArgBuilder::new()
        .shortstr(consumer_tag)
        .longlong(delivery_tag)
        .bit(false)
        .shortstr("amq.direct")
        .shortstr("rk")
        .finish();
    method_frame(channel, 60, 60, &args)
}

/// `basic.get-ok`; content frames must follow.
#[must_use]
pub fn basic_get_ok(channel: u16, delivery_tag: u64, remaining: u32) -> Vec<u8> {
    let args = ArgBuilder::new()
        .longlong(delivery_tag)
        .bit(true)
        .shortstr("")
        .shortstr("jobs")
        .long(remaining)
        .finish();
    method_frame(channel, 60, 71, &args)
}

/// `basic.get-empty`.
#[must_use]
pub fn basic_get_empty(channel: u16) -> Vec<u8> {
    method_frame(channel, 60, 72, &ArgBuilder::new().shortstr("").finish())
}

/// A basic-class content header with no properties.
#[must_use]
pub fn basic_header(channel: u16, body_size: u64) -> Vec<u8> {
    header_frame(channel, 60, body_size, &[0, 0])
}

/// A content header followed by `body` split into fragments of at most
/// `fragment` bytes.
#[must_use]
pub fn content(channel: u16, body: &[u8], fragment: usize) -> Vec<Vec<u8>> {
    let mut frames = vec![basic_header(channel, body.len() as u64)];
    frames.extend(body.chunks(fragment).map(|part| body_frame(channel, part)));
    frames
}
