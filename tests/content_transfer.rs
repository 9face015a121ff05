//! Publishing and consuming message content through a scripted broker.

mod broker;

use amqp_wire::{
    BasicProperties,
    Connection,
    FieldValue,
    Method,
    MethodId,
    Properties,
    Table,
    method::{BasicConsume, BasicDeliver, BasicPublish},
};
use amqp_wire_testing::{RawFrame, ScriptedTransport, scripted, server, wire};
use broker::logged_in;
use proptest::prelude::*;
use rstest::rstest;

fn publish(conn: &mut Connection<ScriptedTransport>, properties: BasicProperties, body: &[u8]) {
    conn.basic_publish(
        1,
        BasicPublish {
            exchange: "amq.direct".into(),
            routing_key: "jobs".into(),
            ..BasicPublish::default()
        },
        properties,
        body,
    )
    .expect("publish");
}

/// Re-encode captured client frames so they can be replayed as server input.
fn replay(frames: &[RawFrame]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|frame| wire::frame(frame.frame_type, frame.channel, &frame.payload))
        .collect()
}

#[rstest]
fn large_body_is_split_into_frame_sized_fragments(scripted: ScriptedTransport) {
    let mut conn = logged_in(scripted, 4096);
    let body: Vec<u8> = (0..=255u8).cycle().take(150_000).collect();
    let properties = BasicProperties {
        content_type: Some("application/octet-stream".into()),
        delivery_mode: Some(2),
        headers: Some(
            [("attempt", FieldValue::I32(1))]
                .into_iter()
                .collect::<Table>(),
        ),
        ..BasicProperties::default()
    };
    publish(&mut conn, properties.clone(), &body);

    let frames = RawFrame::parse_all(&conn.transport_mut().take_written());
    assert_eq!(frames[0].method(), Some((60, 40)));
    assert_eq!(frames[1].frame_type, wire::HEADER);
    let bodies = &frames[2..];
    assert_eq!(bodies.len(), 37);
    assert!(bodies.iter().all(|frame| frame.payload.len() <= 4088));
    assert_eq!(bodies[36].payload.len(), 150_000 - 36 * 4088);

    let mut consumer = logged_in(ScriptedTransport::new(), 4096);
    consumer.transport_mut().push(replay(&frames[1..]));
    let content = consumer.read_content(1).expect("content");
    assert_eq!(content.body, body);
    assert_eq!(content.properties, Properties::Basic(properties));
}

#[rstest]
fn consumer_receives_deliveries_after_consume_ok(scripted: ScriptedTransport) {
    let mut conn = logged_in(scripted, 4096);
    let mut script = wire::method_frame(
        1,
        60,
        21,
        &wire::ArgBuilder::new().shortstr("amq.ctag-1").finish(),
    );
    script.extend(server::basic_deliver(1, "amq.ctag-1", 1));
    for frame in server::content(1, b"first", 4088) {
        script.extend(frame);
    }
    conn.transport_mut().push(script);
    conn.transport_mut().push(server::basic_deliver(1, "amq.ctag-1", 2));
    for frame in server::content(1, b"second", 3) {
        conn.transport_mut().push(frame);
    }

    let ok = conn
        .basic_consume(
            1,
            BasicConsume {
                queue: "jobs".into(),
                ..BasicConsume::default()
            },
        )
        .expect("consume-ok");
    assert_eq!(ok.consumer_tag, "amq.ctag-1");

    for (tag, body) in [(1, b"first".as_slice()), (2, b"second".as_slice())] {
        let frame = conn.simple_wait_frame().expect("deliver");
        let deliver = frame
            .as_method()
            .cloned()
            .and_then(|method| BasicDeliver::try_from(method).ok())
            .expect("basic.deliver");
        assert_eq!(deliver.delivery_tag, tag);
        assert_eq!(conn.read_content(1).expect("content").body, body);
        conn.basic_ack(1, tag, false).expect("ack");
        conn.maybe_release_buffers();
    }

    let acks: Vec<_> = RawFrame::parse_all(&conn.transport_mut().take_written())
        .into_iter()
        .filter(|frame| frame.method() == Some((60, 80)))
        .map(|frame| frame.args().to_vec())
        .collect();
    assert_eq!(
        acks,
        [1, 2].map(|tag| wire::ArgBuilder::new().longlong(tag).bit(false).finish())
    );
}

#[rstest]
fn get_ok_content_arrives_after_the_reply(scripted: ScriptedTransport) {
    let mut conn = logged_in(scripted, 4096);
    conn.transport_mut().push(server::basic_get_ok(1, 9, 4));
    for frame in server::content(1, b"payload", 2) {
        conn.transport_mut().push(frame);
    }

    let reply = conn.basic_get(1, "jobs", true);
    assert_eq!(
        reply.method().map(Method::id),
        Some(MethodId::BASIC_GET_OK)
    );
    assert!(!conn.frames_enqueued());
    let content = conn.read_content(1).expect("content");
    assert_eq!(content.body, b"payload".as_slice());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn published_bodies_reassemble_under_any_read_size(
        body in proptest::collection::vec(any::<u8>(), 0..20_000),
        read_limit in 1usize..5000,
    ) {
        let mut publisher = logged_in(ScriptedTransport::new(), 4096);
        publish(&mut publisher, BasicProperties::default(), &body);
        let frames = RawFrame::parse_all(&publisher.transport_mut().take_written());
        prop_assert_eq!(frames.len(), 2 + body.len().div_ceil(4088));

        let mut consumer = logged_in(ScriptedTransport::new().with_read_limit(read_limit), 4096);
        consumer.transport_mut().push(replay(&frames[1..]));
        let content = consumer.read_content(1).expect("content");
        prop_assert_eq!(content.body.as_ref(), body.as_slice());
    }
}
