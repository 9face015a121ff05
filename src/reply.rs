//! Outcome of a synchronous request.

use std::fmt;

use crate::{
    error::{AmqpError, ErrorCode},
    method::Method,
};

/// Result of [`Connection::simple_rpc`](crate::connection::Connection::simple_rpc)
/// and the helpers built on it.
///
/// Server-side refusals arrive as `channel.close` or `connection.close`
/// methods and are reported as [`RpcReply::ServerException`] rather than as
/// an error, since the connection itself is still intact.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RpcReply {
    /// No request has completed yet.
    #[default]
    None,
    /// The server replied with one of the expected methods.
    Normal(Method),
    /// The server closed the channel or connection instead of replying.
    ServerException(Method),
    /// The library failed to send the request or read the reply.
    LibraryException(ErrorCode),
}

impl RpcReply {
    /// Returns true for [`RpcReply::Normal`].
    #[must_use]
    pub const fn is_normal(&self) -> bool { matches!(self, Self::Normal(_)) }

    /// The method carried by a normal or server-exception reply.
    #[must_use]
    pub const fn method(&self) -> Option<&Method> {
        match self {
            Self::Normal(method) | Self::ServerException(method) => Some(method),
            Self::None | Self::LibraryException(_) => None,
        }
    }

    /// Consume the reply, returning the method of a normal reply.
    #[must_use]
    pub fn into_normal(self) -> Option<Method> {
        match self {
            Self::Normal(method) => Some(method),
            _ => None,
        }
    }

    /// Human-readable account of the reply.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqp_wire::{
    ///     RpcReply,
    ///     method::{ConnectionClose, Method},
    /// };
    ///
    /// let reply = RpcReply::ServerException(Method::from(ConnectionClose {
    ///     reply_code: 320,
    ///     reply_text: "CONNECTION_FORCED".into(),
    ///     ..ConnectionClose::default()
    /// }));
    /// assert_eq!(
    ///     reply.describe(),
    ///     "server connection error 320, message: CONNECTION_FORCED"
    /// );
    /// ```
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::None => "missing RPC reply type".to_owned(),
            Self::Normal(_) => "normal response".to_owned(),
            Self::LibraryException(code) => code.description(),
            Self::ServerException(Method::ConnectionClose(close)) => format!(
                "server connection error {}, message: {}",
                close.reply_code, close.reply_text
            ),
            Self::ServerException(Method::ChannelClose(close)) => format!(
                "server channel error {}, message: {}",
                close.reply_code, close.reply_text
            ),
            Self::ServerException(other) => {
                format!("unknown server error, method id {:#010X}", other.id().0)
            }
        }
    }
}

impl From<AmqpError> for RpcReply {
    fn from(error: AmqpError) -> Self { Self::LibraryException(error.code()) }
}

impl fmt::Display for RpcReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.describe()) }
}
