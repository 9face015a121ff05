//! Connection handshake.

use bytes::Bytes;
use tracing::debug;

use super::{Connection, expect_method};
use crate::{
    codec::{FieldValue, LongString, Table},
    config::{ConnectionInfo, Tuning},
    error::{AmqpError, MalformedData},
    frame::FramePayload,
    method::{
        ConnectionOpen,
        ConnectionStart,
        ConnectionStartOk,
        ConnectionTune,
        ConnectionTuneOk,
        Method,
        MethodId,
    },
    pool::Pool,
    reply::RpcReply,
    transport::Transport,
};

/// Product name announced in the client properties.
pub const CLIENT_PRODUCT: &str = env!("CARGO_PKG_NAME");

const LOCALE: &str = "en_US";

/// SASL mechanism and credentials used to log in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMechanism<'a> {
    /// `PLAIN`: the response is `\0user\0password`.
    Plain { user: &'a str, password: &'a str },
}

impl AuthMechanism<'_> {
    /// Mechanism name sent in `connection.start-ok`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "PLAIN",
        }
    }

    /// Build the mechanism's response in memory taken from `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the pool cannot serve the
    /// response.
    pub fn response(&self, pool: &mut Pool) -> Result<Bytes, AmqpError> {
        match self {
            Self::Plain { user, password } => {
                let mut response = pool.reserve(user.len() + password.len() + 2)?;
                response.extend_from_slice(&[0]);
                response.extend_from_slice(user.as_bytes());
                response.extend_from_slice(&[0]);
                response.extend_from_slice(password.as_bytes());
                Ok(response.freeze())
            }
        }
    }
}

impl<'a> From<&'a ConnectionInfo> for AuthMechanism<'a> {
    fn from(info: &'a ConnectionInfo) -> Self {
        Self::Plain {
            user: &info.user,
            password: &info.password,
        }
    }
}

impl<T: Transport> Connection<T> {
    /// Perform the opening handshake and open `vhost`.
    ///
    /// Sends the protocol greeting, authenticates with `auth`, settles the
    /// connection limits against the server's proposal (see
    /// [`Tuning::negotiate`]) and finally opens the virtual host. The outcome
    /// is also recorded as the most recent RPC result.
    ///
    /// A server speaking another protocol version answers the greeting with
    /// its own, which is reported as [`AmqpError::IncompatibleVersion`].
    pub fn login(&mut self, vhost: &str, tuning: Tuning, auth: AuthMechanism<'_>) -> RpcReply {
        self.most_recent = match self.handshake(tuning, auth) {
            Ok(()) => self.open_vhost(vhost),
            Err(error) => error.into(),
        };
        self.most_recent.clone()
    }

    fn handshake(&mut self, tuning: Tuning, auth: AuthMechanism<'_>) -> Result<(), AmqpError> {
        self.send_header()?;

        let frame = self.simple_wait_frame()?;
        if let FramePayload::ProtocolHeader(header) = &frame.payload {
            return Err(AmqpError::IncompatibleVersion {
                major: header.major,
                minor: header.minor,
            });
        }
        let start: ConnectionStart = downcast(
            expect_method(frame, 0, MethodId::CONNECTION_START)?,
            MethodId::CONNECTION_START,
        )?;
        if (start.version_major, start.version_minor) != (0, 9) {
            return Err(AmqpError::IncompatibleVersion {
                major: start.version_major,
                minor: start.version_minor,
            });
        }

        let response = auth.response(&mut self.decoding_pool)?;
        self.send_method(
            0,
            ConnectionStartOk {
                client_properties: client_properties(),
                mechanism: auth.name().into(),
                response: LongString::new(response),
                locale: LOCALE.into(),
            },
        )?;
        self.release_buffers();

        let proposal: ConnectionTune = downcast(
            self.simple_wait_method(0, MethodId::CONNECTION_TUNE)?,
            MethodId::CONNECTION_TUNE,
        )?;
        let negotiated = tuning.negotiate(Tuning {
            channel_max: proposal.channel_max,
            frame_max: proposal.frame_max,
            heartbeat: proposal.heartbeat,
        });
        debug!(
            server_frame_max = proposal.frame_max,
            frame_max = negotiated.frame_max,
            "negotiated connection limits"
        );
        self.tune(negotiated)?;
        self.send_method(
            0,
            ConnectionTuneOk {
                channel_max: negotiated.channel_max,
                frame_max: negotiated.frame_max,
                heartbeat: negotiated.heartbeat,
            },
        )?;
        self.release_buffers();
        Ok(())
    }

    fn open_vhost(&mut self, vhost: &str) -> RpcReply {
        let reply = self.simple_rpc(
            0,
            ConnectionOpen {
                virtual_host: vhost.into(),
                capabilities: "".into(),
                insist: true,
            },
            &[MethodId::CONNECTION_OPEN_OK],
        );
        if reply.is_normal() {
            self.maybe_release_buffers();
        }
        reply
    }
}

fn client_properties() -> Table {
    [
        ("product", FieldValue::utf8(CLIENT_PRODUCT)),
        (
            "information",
            FieldValue::utf8(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))),
        ),
    ]
    .into_iter()
    .collect()
}

fn downcast<M>(method: Method, expected: MethodId) -> Result<M, AmqpError>
where
    M: TryFrom<Method, Error = Method>,
{
    M::try_from(method).map_err(|other| {
        MalformedData::UnexpectedMethod {
            channel: 0,
            expected: expected.0,
            actual_channel: 0,
            actual: other.id().0,
        }
        .into()
    })
}
