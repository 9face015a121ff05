//! Unit tests for the blocking connection driven by a scripted transport.

use std::num::NonZeroUsize;

use amqp_wire_testing::{ArgBuilder, RawFrame, ScriptedTransport, scripted, server, wire};
use bytes::Bytes;
use rstest::{fixture, rstest};
use tracing_test::traced_test;

use super::*;
use crate::{
    codec::FieldValue,
    error::ErrorCode,
    method::{
        BasicGetOk,
        BasicProperties,
        BasicPublish,
        ChannelClose,
        ConnectionClose,
        ConnectionStartOk,
        Properties,
        QueueDeclare,
        QueueDeclareOk,
    },
};

fn login_with(mut transport: ScriptedTransport, frame_max: u32) -> Connection<ScriptedTransport> {
    for chunk in server::login(2047, frame_max, 60) {
        transport.push(chunk);
    }
    let mut conn = Connection::new(transport).expect("connection");
    let reply = conn.login(
        "/",
        Tuning::default(),
        AuthMechanism::Plain {
            user: "guest",
            password: "guest",
        },
    );
    assert!(reply.is_normal(), "{reply}");
    conn.transport_mut().take_written();
    conn
}

/// A connection that completed login with a 4096-byte frame limit.
#[fixture]
fn connection(scripted: ScriptedTransport) -> Connection<ScriptedTransport> {
    login_with(scripted, 4096)
}

fn sent(conn: &mut Connection<ScriptedTransport>) -> Vec<RawFrame> {
    RawFrame::parse_all(&conn.transport_mut().take_written())
}

fn jobs() -> QueueDeclare {
    QueueDeclare {
        queue: "jobs".into(),
        durable: true,
        ..QueueDeclare::default()
    }
}

#[rstest]
fn new_connection_starts_with_initial_limits(scripted: ScriptedTransport) {
    let conn = Connection::new(scripted).expect("connection");
    assert_eq!(conn.tuning(), INITIAL_TUNING);
    assert_eq!(conn.frame_max(), 65_536);
    assert!(!conn.frames_enqueued());
    assert!(!conn.data_in_buffer());
    assert!(conn.release_buffers_ok());
    assert_eq!(conn.rpc_reply(), &RpcReply::None);
}

#[rstest]
fn tune_updates_limits(scripted: ScriptedTransport) {
    let mut conn = Connection::new(scripted).expect("connection");
    conn.tune(Tuning {
        channel_max: 10,
        frame_max: 8192,
        heartbeat: 30,
    })
    .expect("tune");
    assert_eq!(
        (conn.channel_max(), conn.frame_max(), conn.heartbeat()),
        (10, 8192, 30)
    );
}

#[rstest]
#[traced_test]
fn login_negotiates_limits_and_sends_handshake(scripted: ScriptedTransport) {
    let mut transport = scripted;
    for chunk in server::login(2047, 4096, 60) {
        transport.push(chunk);
    }
    let mut conn = Connection::new(transport).expect("connection");
    let reply = conn.login(
        "/",
        Tuning::default(),
        AuthMechanism::Plain {
            user: "guest",
            password: "secret",
        },
    );

    assert!(reply.is_normal(), "{reply}");
    assert_eq!(conn.rpc_reply(), &reply);
    assert_eq!(
        conn.tuning(),
        Tuning {
            channel_max: 2047,
            frame_max: 4096,
            heartbeat: 0,
        }
    );
    assert!(logs_contain("negotiated connection limits"));

    let written = conn.transport_mut().take_written();
    assert!(written.starts_with(b"AMQP\x00\x00\x09\x01"));
    let frames = RawFrame::parse_all(&written);
    let ids: Vec<_> = frames.iter().filter_map(RawFrame::method).collect();
    assert_eq!(ids, vec![(10, 11), (10, 31), (10, 40)]);
    assert_eq!(
        frames[1].args(),
        ArgBuilder::new().short(2047).long(4096).short(0).finish()
    );

    let start_ok = Method::decode(
        MethodId::CONNECTION_START_OK,
        &Bytes::from(frames[0].payload.clone()),
        4,
    )
    .expect("start-ok decodes");
    let Method::ConnectionStartOk(ConnectionStartOk {
        client_properties,
        mechanism,
        response,
        locale,
    }) = start_ok
    else {
        panic!("expected connection.start-ok");
    };
    assert_eq!(mechanism, "PLAIN");
    assert_eq!(response.as_bytes(), b"\0guest\0secret");
    assert_eq!(locale, "en_US");
    assert_eq!(
        client_properties.get(b"product"),
        Some(&FieldValue::utf8(CLIENT_PRODUCT))
    );
}

#[rstest]
#[case::newer_start(server::connection_start(8, 0), 8, 0)]
#[case::greeting_reply(wire::protocol_header(1, 0, 0), 1, 0)]
fn login_rejects_other_protocol_versions(
    scripted: ScriptedTransport,
    #[case] reply: Vec<u8>,
    #[case] major: u8,
    #[case] minor: u8,
) {
    let mut transport = scripted;
    transport.push(reply);
    let mut conn = Connection::new(transport).expect("connection");
    let outcome = conn.login("/", Tuning::default(), AuthMechanism::Plain {
        user: "guest",
        password: "guest",
    });
    assert_eq!(
        outcome,
        RpcReply::LibraryException(AmqpError::IncompatibleVersion { major, minor }.code())
    );
    assert_eq!(outcome.describe(), "incompatible AMQP version");
}

#[rstest]
fn login_reports_closed_transport(scripted: ScriptedTransport) {
    let mut conn = Connection::new(scripted).expect("connection");
    let outcome = conn.login("/", Tuning::default(), AuthMechanism::Plain {
        user: "guest",
        password: "guest",
    });
    assert_eq!(outcome, RpcReply::LibraryException(ErrorCode::new(7)));
}

#[rstest]
fn login_reports_failed_write(scripted: ScriptedTransport) {
    let mut transport = scripted;
    transport.fail_writes();
    let mut conn = Connection::new(transport).expect("connection");
    let outcome = conn.login("/", Tuning::default(), AuthMechanism::Plain {
        user: "guest",
        password: "guest",
    });
    let RpcReply::LibraryException(code) = outcome else {
        panic!("expected a library exception, got {outcome:?}");
    };
    assert!(code.is_transport());
}

#[rstest]
fn queue_declare_returns_the_reply(mut connection: Connection<ScriptedTransport>) {
    connection
        .transport_mut()
        .push(server::queue_declare_ok(1, "jobs", 3, 1));
    let ok = connection.queue_declare(1, jobs()).expect("declare-ok");
    assert_eq!(
        ok,
        QueueDeclareOk {
            queue: "jobs".into(),
            message_count: 3,
            consumer_count: 1,
        }
    );
    assert!(connection.rpc_reply().is_normal());

    let frames = sent(&mut connection);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].channel, 1);
    assert_eq!(frames[0].method(), Some((50, 10)));
    assert_eq!(
        frames[0].args(),
        ArgBuilder::new()
            .short(0)
            .shortstr("jobs")
            .bit(false)
            .bit(true)
            .bit(false)
            .bit(false)
            .bit(false)
            .table(&[0, 0, 0, 0])
            .finish()
    );
}

#[rstest]
fn frames_before_the_reply_are_deferred_in_order(mut connection: Connection<ScriptedTransport>) {
    let mut script = server::basic_deliver(1, "ctag", 7);
    for frame in server::content(1, b"hello", 4088) {
        script.extend(frame);
    }
    script.extend(server::queue_declare_ok(1, "jobs", 0, 0));
    connection.transport_mut().push(script);

    assert!(connection.queue_declare(1, jobs()).is_some());
    assert!(connection.frames_enqueued());
    assert!(!connection.release_buffers_ok());

    let deliver = connection.simple_wait_frame().expect("deferred deliver");
    assert_eq!(deliver.method_id(), Some(MethodId::BASIC_DELIVER));
    let content = connection.read_content(1).expect("deferred content");
    assert_eq!(content.body, Bytes::from_static(b"hello"));
    assert_eq!(content.class_id, crate::method::CLASS_BASIC);
    assert!(!connection.frames_enqueued());
    assert!(connection.release_buffers_ok());
}

#[rstest]
#[traced_test]
fn deferred_reply_is_served_without_reading(mut connection: Connection<ScriptedTransport>) {
    let mut script = server::queue_declare_ok(1, "jobs", 0, 0);
    script.extend(server::basic_qos_ok(2));
    connection.transport_mut().push(script);

    assert!(connection.basic_qos(2, 0, 10, false).is_some());
    assert!(connection.frames_enqueued());
    let reads = connection.transport().reads();

    let ok = connection.queue_declare(1, jobs()).expect("declare-ok");
    assert_eq!(ok.queue, "jobs");
    assert_eq!(connection.transport().reads(), reads);
    assert!(!connection.frames_enqueued());
    assert!(logs_contain("reply served from deferred frames"));
}

#[rstest]
fn heartbeat_during_rpc_is_deferred(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(wire::heartbeat_frame());
    connection.transport_mut().push(server::channel_open_ok(1));

    assert!(connection.channel_open(1).is_some());
    let frame = connection.simple_wait_frame().expect("heartbeat");
    assert_eq!(frame.payload, FramePayload::Heartbeat);
}

#[rstest]
fn channel_close_is_a_server_exception(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(server::channel_close(
        1,
        404,
        "NOT_FOUND - no queue 'jobs'",
        50,
        10,
    ));

    assert!(connection.queue_declare(1, jobs()).is_none());
    let reply = connection.rpc_reply();
    assert!(matches!(
        reply,
        RpcReply::ServerException(Method::ChannelClose(ChannelClose { reply_code: 404, .. }))
    ));
    assert_eq!(
        reply.describe(),
        "server channel error 404, message: NOT_FOUND - no queue 'jobs'"
    );
}

#[rstest]
fn connection_close_on_channel_zero_ends_any_rpc(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(server::connection_close(
        320,
        "CONNECTION_FORCED",
        0,
        0,
    ));

    assert!(connection.channel_open(1).is_none());
    assert!(matches!(
        connection.rpc_reply(),
        RpcReply::ServerException(Method::ConnectionClose(ConnectionClose { reply_code: 320, .. }))
    ));
}

#[rstest]
fn close_on_another_channel_is_deferred(mut connection: Connection<ScriptedTransport>) {
    let mut script = server::channel_close(2, 406, "PRECONDITION_FAILED", 60, 80);
    script.extend(server::channel_open_ok(1));
    connection.transport_mut().push(script);

    assert!(connection.channel_open(1).is_some());
    let deferred = connection.simple_wait_frame().expect("deferred close");
    assert_eq!(deferred.channel, 2);
    assert_eq!(deferred.method_id(), Some(MethodId::CHANNEL_CLOSE));
}

#[rstest]
fn closed_transport_during_rpc_is_a_library_exception(
    mut connection: Connection<ScriptedTransport>,
) {
    assert!(connection.channel_open(1).is_none());
    assert_eq!(
        connection.rpc_reply(),
        &RpcReply::LibraryException(ErrorCode::new(7))
    );
}

#[rstest]
fn failed_write_during_rpc_is_a_transport_exception(
    mut connection: Connection<ScriptedTransport>,
) {
    connection.transport_mut().fail_writes();
    assert!(connection.tx_select(1).is_none());
    let RpcReply::LibraryException(code) = connection.rpc_reply() else {
        panic!("expected a library exception");
    };
    assert!(code.is_transport());
    assert_eq!(code.description(), "(unknown transport error)");
    assert_eq!(
        connection.rpc_reply().describe(),
        "(unknown transport error)"
    );
}

#[rstest]
fn simple_wait_method_rejects_other_methods(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(server::channel_open_ok(1));
    let err = connection
        .simple_wait_method(1, MethodId::BASIC_QOS_OK)
        .expect_err("mismatch");
    assert!(matches!(
        err,
        AmqpError::BadAmqpData(MalformedData::UnexpectedMethod {
            channel: 1,
            actual_channel: 1,
            ..
        })
    ));
}

#[rstest]
fn simple_wait_method_rejects_other_frame_types(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(wire::heartbeat_frame());
    let err = connection
        .simple_wait_method(0, MethodId::CONNECTION_CLOSE_OK)
        .expect_err("heartbeat is not a method");
    assert!(matches!(
        err,
        AmqpError::BadAmqpData(MalformedData::UnexpectedFrame {
            expected: "method",
            frame_type: 8,
            ..
        })
    ));
}

#[rstest]
#[case::single_frame(100, 4088)]
#[case::exact_fragments(4088 * 3, 4088)]
#[case::ragged_tail(10_000, 4088)]
#[case::tiny_fragments(1000, 7)]
#[case::empty(0, 4088)]
fn read_content_gathers_the_body(
    mut connection: Connection<ScriptedTransport>,
    #[case] len: usize,
    #[case] fragment: usize,
) {
    let body: Vec<u8> = (0..=250u8).cycle().take(len).collect();
    let mut script = Vec::new();
    for frame in server::content(3, &body, fragment) {
        script.extend(frame);
    }
    connection.transport_mut().push(script);

    let content = connection.read_content(3).expect("content");
    assert_eq!(content.body, body);
    assert_eq!(content.properties, Properties::from(BasicProperties::default()));
    assert!(connection.transport().is_drained());
}

#[rstest]
fn read_content_rejects_body_overrun(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(server::basic_header(1, 3));
    connection
        .transport_mut()
        .push(wire::body_frame(1, b"hello"));
    let err = connection.read_content(1).expect_err("overrun");
    assert!(matches!(
        err,
        AmqpError::BadAmqpData(MalformedData::BodyOverrun {
            announced: 3,
            received: 5,
        })
    ));
}

#[rstest]
fn read_content_does_not_allocate_the_announced_size(
    mut connection: Connection<ScriptedTransport>,
) {
    connection.transport_mut().push(server::basic_header(1, 1 << 30));
    connection.transport_mut().push(wire::body_frame(1, b"x"));
    let err = connection.read_content(1).expect_err("body never completes");
    assert!(matches!(err, AmqpError::ConnectionClosed));
    assert_eq!(connection.decoding_pool.large_block_count(), 0);
    assert!(connection.decoding_pool.page_count() <= 1);
}

#[rstest]
fn read_content_gathers_a_body_larger_than_a_page(
    mut connection: Connection<ScriptedTransport>,
) {
    let page = connection.decoding_pool.page_size();
    let body = vec![0x5A; page + 100];
    for chunk in server::content(1, &body, 1000) {
        connection.transport_mut().push(chunk);
    }
    let content = connection.read_content(1).expect("content");
    assert_eq!(content.body.as_ref(), body.as_slice());
    assert_eq!(connection.decoding_pool.large_block_count(), 0);
}

#[rstest]
fn read_content_rejects_interleaved_frames(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(server::basic_header(1, 10));
    connection.transport_mut().push(wire::body_frame(1, b"hello"));
    connection.transport_mut().push(server::channel_open_ok(2));
    let err = connection.read_content(1).expect_err("interleaved");
    assert!(matches!(
        err,
        AmqpError::BadAmqpData(MalformedData::UnexpectedFrame {
            channel: 1,
            expected: "content body",
            frame_type: 1,
        })
    ));
}

#[rstest]
fn read_content_requires_a_header_on_the_channel(mut connection: Connection<ScriptedTransport>) {
    connection.transport_mut().push(server::basic_header(2, 0));
    let err = connection.read_content(1).expect_err("wrong channel");
    assert!(matches!(
        err,
        AmqpError::BadAmqpData(MalformedData::UnexpectedFrame {
            expected: "content header",
            frame_type: 2,
            ..
        })
    ));
}

#[rstest]
fn basic_get_reports_a_message_or_empty(mut connection: Connection<ScriptedTransport>) {
    let mut script = server::basic_get_ok(1, 42, 0);
    for frame in server::content(1, b"job", 4088) {
        script.extend(frame);
    }
    script.extend(server::basic_get_empty(1));
    connection.transport_mut().push(script);

    let reply = connection.basic_get(1, "jobs", false);
    let ok = BasicGetOk::try_from(reply.into_normal().expect("normal reply")).expect("get-ok");
    assert_eq!((ok.delivery_tag, ok.routing_key.as_bytes()), (42, b"jobs".as_slice()));
    assert_eq!(connection.read_content(1).expect("content").body, b"job".as_slice());

    let reply = connection.basic_get(1, "jobs", false);
    assert_eq!(
        reply.method().map(Method::id),
        Some(MethodId::BASIC_GET_EMPTY)
    );
}

#[rstest]
#[case::empty(0, &[])]
#[case::one_frame(4088, &[4088])]
#[case::split(10_000, &[4088, 4088, 1824])]
fn publish_splits_the_body_at_frame_max(
    mut connection: Connection<ScriptedTransport>,
    #[case] len: usize,
    #[case] fragments: &[usize],
) {
    let body = vec![0xAB; len];
    connection
        .basic_publish(
            1,
            BasicPublish {
                routing_key: "jobs".into(),
                ..BasicPublish::default()
            },
            BasicProperties {
                content_type: Some("text/plain".into()),
                ..BasicProperties::default()
            },
            &body,
        )
        .expect("publish");

    let frames = sent(&mut connection);
    assert_eq!(frames[0].method(), Some((60, 40)));
    assert_eq!(frames[1].frame_type, wire::HEADER);
    assert_eq!(&frames[1].payload[4..12], (len as u64).to_be_bytes().as_slice());
    let sizes: Vec<_> = frames[2..].iter().map(|frame| frame.payload.len()).collect();
    assert_eq!(sizes, fragments);
    assert!(frames[2..].iter().all(|frame| frame.frame_type == wire::BODY));
    let joined: Vec<u8> = frames[2..].iter().flat_map(|f| f.payload.clone()).collect();
    assert_eq!(joined, body);
}

#[rstest]
fn oversized_body_frame_is_refused(mut connection: Connection<ScriptedTransport>) {
    let frame = Frame::new(1, FramePayload::Body(Bytes::from(vec![0; 4089])));
    let err = connection.send_frame(&frame).expect_err("too large");
    assert!(matches!(
        err,
        AmqpError::BadAmqpData(MalformedData::OversizedFrame {
            size: 4097,
            max: 4096,
        })
    ));
    assert!(connection.transport().written().is_empty());
}

#[rstest]
fn close_helpers_send_the_code_as_text(mut connection: Connection<ScriptedTransport>) {
    connection
        .transport_mut()
        .push(server::channel_close_ok(1));
    connection
        .transport_mut()
        .push(server::connection_close_ok());

    assert!(connection.channel_close(1, 200).is_normal());
    assert!(connection.connection_close(200).is_normal());

    let frames = sent(&mut connection);
    let expected = ArgBuilder::new()
        .short(200)
        .shortstr("200")
        .short(0)
        .short(0)
        .finish();
    assert_eq!(frames[0].method(), Some((20, 40)));
    assert_eq!(frames[0].args(), expected);
    assert_eq!(frames[1].method(), Some((10, 50)));
    assert_eq!((frames[1].channel, frames[1].args()), (0, expected.as_slice()));
}

#[rstest]
#[should_panic(expected = "deferred frames are queued")]
fn releasing_buffers_with_deferred_frames_panics(mut connection: Connection<ScriptedTransport>) {
    let mut script = wire::heartbeat_frame();
    script.extend(server::channel_open_ok(1));
    connection.transport_mut().push(script);
    assert!(connection.channel_open(1).is_some());
    connection.release_buffers();
}

#[test]
fn plain_response_carries_both_credentials() {
    let mut pool = Pool::new(NonZeroUsize::new(64).expect("non-zero"));
    let auth = AuthMechanism::Plain {
        user: "guest",
        password: "s3cret",
    };
    assert_eq!(auth.name(), "PLAIN");
    let response = auth.response(&mut pool).expect("response");
    assert_eq!(response.as_ref(), b"\0guest\0s3cret");
}
