//! Shared helpers for driving a connection against a scripted broker.

#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use amqp_wire::{AuthMechanism, Connection, RpcReply, Tuning};
use amqp_wire_testing::{ScriptedTransport, server};

/// Credentials accepted by the scripted broker.
pub const GUEST: AuthMechanism<'static> = AuthMechanism::Plain {
    user: "guest",
    password: "guest",
};

/// Queue the broker's half of a successful login proposing `frame_max`.
pub fn script_login(transport: &mut ScriptedTransport, frame_max: u32) {
    for chunk in server::login(2047, frame_max, 60) {
        transport.push(chunk);
    }
}

/// Log in over `transport` asking for `client` limits, returning the
/// connection and the login outcome.
pub fn log_in(
    transport: ScriptedTransport,
    client: Tuning,
) -> (Connection<ScriptedTransport>, RpcReply) {
    let mut conn = Connection::new(transport).expect("connection");
    let reply = conn.login("/", client, GUEST);
    (conn, reply)
}

/// A connection logged in with the broker proposing `frame_max`, with the
/// handshake output discarded.
pub fn logged_in(
    mut transport: ScriptedTransport,
    frame_max: u32,
) -> Connection<ScriptedTransport> {
    script_login(&mut transport, frame_max);
    let (mut conn, reply) = log_in(transport, Tuning::default());
    assert!(reply.is_normal(), "login failed: {reply}");
    conn.transport_mut().take_written();
    conn
}
