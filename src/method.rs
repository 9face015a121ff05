//! AMQP 0-9-1 methods and content properties.
//!
//! Each method is a struct whose fields are listed in wire order. The
//! `methods!` table below generates the structs, the [`Method`] sum type,
//! the [`MethodId`] constants and the argument codec from a single listing.

use std::fmt;

use bytes::Bytes;

use crate::{
    codec::{ArgField, ArgReader, ArgWriter, LongString, ShortString, Table, WireWriter},
    error::{AmqpError, MalformedData},
};

pub mod properties;

pub use properties::{BasicProperties, Properties};

/// Class id of the connection class.
pub const CLASS_CONNECTION: u16 = 10;
/// Class id of the channel class.
pub const CLASS_CHANNEL: u16 = 20;
/// Class id of the exchange class.
pub const CLASS_EXCHANGE: u16 = 40;
/// Class id of the queue class.
pub const CLASS_QUEUE: u16 = 50;
/// Class id of the basic class.
pub const CLASS_BASIC: u16 = 60;
/// Class id of the tx class.
pub const CLASS_TX: u16 = 90;

/// Method identifier: class id in the high 16 bits, method index in the low.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

impl MethodId {
    /// Combine a class id and method index.
    #[must_use]
    pub const fn new(class_id: u16, index: u16) -> Self {
        Self(((class_id as u32) << 16) | index as u32)
    }

    /// Class id part.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "the shift leaves 16 bits")]
    pub const fn class_id(self) -> u16 { (self.0 >> 16) as u16 }

    /// Method index within its class.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "the mask leaves 16 bits")]
    pub const fn index(self) -> u16 { (self.0 & 0xFFFF) as u16 }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#010x})", self.0),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

macro_rules! methods {
    ($(
        $(#[$meta:meta])*
        $variant:ident = ($class:expr, $index:literal), $konst:ident, $name:literal, content = $content:literal {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Debug, Default, PartialEq)]
            pub struct $variant {
                $( $(#[$fmeta])* pub $field: $ty, )*
            }

            impl $variant {
                /// Identifier of this method.
                pub const ID: MethodId = MethodId::new($class, $index);

                #[allow(unused_variables, reason = "methods without arguments ignore the reader")]
                fn read_args(reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> {
                    Ok(Self {
                        $( $field: <$ty as ArgField>::read_arg(reader)?, )*
                    })
                }

                #[allow(unused_variables, reason = "methods without arguments ignore the writer")]
                fn write_args(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
                    $( self.$field.write_arg(writer)?; )*
                    Ok(())
                }
            }

            impl From<$variant> for Method {
                fn from(method: $variant) -> Self { Self::$variant(method) }
            }

            impl TryFrom<Method> for $variant {
                type Error = Method;

                fn try_from(method: Method) -> Result<Self, Method> {
                    match method {
                        Method::$variant(method) => Ok(method),
                        other => Err(other),
                    }
                }
            }
        )*

        impl MethodId {
            $(
                #[doc = concat!("`", $name, "`")]
                pub const $konst: Self = Self::new($class, $index);
            )*

            /// Dotted protocol name, if the id is known.
            #[must_use]
            pub const fn name(self) -> Option<&'static str> {
                match self {
                    $( Self::$konst => Some($name), )*
                    _ => None,
                }
            }

            /// Returns true if the method is followed by content frames.
            #[must_use]
            pub const fn has_content(self) -> bool {
                match self {
                    $( Self::$konst => $content, )*
                    _ => false,
                }
            }
        }

        /// A decoded method of any known class.
        #[derive(Clone, Debug, PartialEq)]
        pub enum Method {
            $( $variant($variant), )*
        }

        impl Method {
            /// Identifier of the carried method.
            #[must_use]
            pub const fn id(&self) -> MethodId {
                match self {
                    $( Self::$variant(_) => MethodId::$konst, )*
                }
            }

            /// Decode the arguments of method `id` from `payload[offset..]`.
            ///
            /// # Errors
            ///
            /// Returns [`AmqpError::UnknownMethod`] for ids outside the
            /// catalogue and [`AmqpError::BadAmqpData`] for malformed
            /// arguments.
            pub fn decode(id: MethodId, payload: &Bytes, offset: usize) -> Result<Self, AmqpError> {
                let mut reader = ArgReader::new(payload, offset);
                let method = match id {
                    $( MethodId::$konst => Self::$variant($variant::read_args(&mut reader)?), )*
                    _ => return Err(AmqpError::UnknownMethod(id.0)),
                };
                Ok(method)
            }

            /// Encode the method's arguments, without its id.
            ///
            /// # Errors
            ///
            /// Returns [`MalformedData`] if the arguments do not fit or a
            /// string exceeds its length prefix.
            pub fn encode(&self, wire: &mut WireWriter<'_>) -> Result<(), MalformedData> {
                let mut writer = ArgWriter::new(wire);
                match self {
                    $( Self::$variant(method) => method.write_args(&mut writer)?, )*
                }
                writer.finish()
            }
        }
    };
}

methods! {
    /// Server greeting that opens connection negotiation.
    ConnectionStart = (CLASS_CONNECTION, 10), CONNECTION_START, "connection.start", content = false {
        version_major: u8,
        version_minor: u8,
        server_properties: Table,
        mechanisms: LongString,
        locales: LongString,
    }
    /// Client reply selecting a mechanism and carrying its response.
    ConnectionStartOk = (CLASS_CONNECTION, 11), CONNECTION_START_OK, "connection.start-ok", content = false {
        client_properties: Table,
        mechanism: ShortString,
        response: LongString,
        locale: ShortString,
    }
    ConnectionSecure = (CLASS_CONNECTION, 20), CONNECTION_SECURE, "connection.secure", content = false {
        challenge: LongString,
    }
    ConnectionSecureOk = (CLASS_CONNECTION, 21), CONNECTION_SECURE_OK, "connection.secure-ok", content = false {
        response: LongString,
    }
    /// Server proposal of connection limits.
    ConnectionTune = (CLASS_CONNECTION, 30), CONNECTION_TUNE, "connection.tune", content = false {
        channel_max: u16,
        frame_max: u32,
        heartbeat: u16,
    }
    /// Client acceptance of connection limits.
    ConnectionTuneOk = (CLASS_CONNECTION, 31), CONNECTION_TUNE_OK, "connection.tune-ok", content = false {
        channel_max: u16,
        frame_max: u32,
        heartbeat: u16,
    }
    ConnectionOpen = (CLASS_CONNECTION, 40), CONNECTION_OPEN, "connection.open", content = false {
        virtual_host: ShortString,
        capabilities: ShortString,
        insist: bool,
    }
    ConnectionOpenOk = (CLASS_CONNECTION, 41), CONNECTION_OPEN_OK, "connection.open-ok", content = false {
        known_hosts: ShortString,
    }
    /// Either peer requests connection shutdown.
    ConnectionClose = (CLASS_CONNECTION, 50), CONNECTION_CLOSE, "connection.close", content = false {
        reply_code: u16,
        reply_text: ShortString,
        class_id: u16,
        method_id: u16,
    }
    ConnectionCloseOk = (CLASS_CONNECTION, 51), CONNECTION_CLOSE_OK, "connection.close-ok", content = false {}

    ChannelOpen = (CLASS_CHANNEL, 10), CHANNEL_OPEN, "channel.open", content = false {
        out_of_band: ShortString,
    }
    ChannelOpenOk = (CLASS_CHANNEL, 11), CHANNEL_OPEN_OK, "channel.open-ok", content = false {
        channel_id: LongString,
    }
    ChannelFlow = (CLASS_CHANNEL, 20), CHANNEL_FLOW, "channel.flow", content = false {
        active: bool,
    }
    ChannelFlowOk = (CLASS_CHANNEL, 21), CHANNEL_FLOW_OK, "channel.flow-ok", content = false {
        active: bool,
    }
    /// Either peer requests channel shutdown.
    ChannelClose = (CLASS_CHANNEL, 40), CHANNEL_CLOSE, "channel.close", content = false {
        reply_code: u16,
        reply_text: ShortString,
        class_id: u16,
        method_id: u16,
    }
    ChannelCloseOk = (CLASS_CHANNEL, 41), CHANNEL_CLOSE_OK, "channel.close-ok", content = false {}

    ExchangeDeclare = (CLASS_EXCHANGE, 10), EXCHANGE_DECLARE, "exchange.declare", content = false {
        ticket: u16,
        exchange: ShortString,
        kind: ShortString,
        passive: bool,
        durable: bool,
        auto_delete: bool,
        internal: bool,
        nowait: bool,
        arguments: Table,
    }
    ExchangeDeclareOk = (CLASS_EXCHANGE, 11), EXCHANGE_DECLARE_OK, "exchange.declare-ok", content = false {}
    ExchangeDelete = (CLASS_EXCHANGE, 20), EXCHANGE_DELETE, "exchange.delete", content = false {
        ticket: u16,
        exchange: ShortString,
        if_unused: bool,
        nowait: bool,
    }
    ExchangeDeleteOk = (CLASS_EXCHANGE, 21), EXCHANGE_DELETE_OK, "exchange.delete-ok", content = false {}

    QueueDeclare = (CLASS_QUEUE, 10), QUEUE_DECLARE, "queue.declare", content = false {
        ticket: u16,
        queue: ShortString,
        passive: bool,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
        nowait: bool,
        arguments: Table,
    }
    QueueDeclareOk = (CLASS_QUEUE, 11), QUEUE_DECLARE_OK, "queue.declare-ok", content = false {
        queue: ShortString,
        message_count: u32,
        consumer_count: u32,
    }
    QueueBind = (CLASS_QUEUE, 20), QUEUE_BIND, "queue.bind", content = false {
        ticket: u16,
        queue: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
        nowait: bool,
        arguments: Table,
    }
    QueueBindOk = (CLASS_QUEUE, 21), QUEUE_BIND_OK, "queue.bind-ok", content = false {}
    QueuePurge = (CLASS_QUEUE, 30), QUEUE_PURGE, "queue.purge", content = false {
        ticket: u16,
        queue: ShortString,
        nowait: bool,
    }
    QueuePurgeOk = (CLASS_QUEUE, 31), QUEUE_PURGE_OK, "queue.purge-ok", content = false {
        message_count: u32,
    }
    QueueDelete = (CLASS_QUEUE, 40), QUEUE_DELETE, "queue.delete", content = false {
        ticket: u16,
        queue: ShortString,
        if_unused: bool,
        if_empty: bool,
        nowait: bool,
    }
    QueueDeleteOk = (CLASS_QUEUE, 41), QUEUE_DELETE_OK, "queue.delete-ok", content = false {
        message_count: u32,
    }
    QueueUnbind = (CLASS_QUEUE, 50), QUEUE_UNBIND, "queue.unbind", content = false {
        ticket: u16,
        queue: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
        arguments: Table,
    }
    QueueUnbindOk = (CLASS_QUEUE, 51), QUEUE_UNBIND_OK, "queue.unbind-ok", content = false {}

    BasicQos = (CLASS_BASIC, 10), BASIC_QOS, "basic.qos", content = false {
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    }
    BasicQosOk = (CLASS_BASIC, 11), BASIC_QOS_OK, "basic.qos-ok", content = false {}
    BasicConsume = (CLASS_BASIC, 20), BASIC_CONSUME, "basic.consume", content = false {
        ticket: u16,
        queue: ShortString,
        consumer_tag: ShortString,
        no_local: bool,
        no_ack: bool,
        exclusive: bool,
        nowait: bool,
        arguments: Table,
    }
    BasicConsumeOk = (CLASS_BASIC, 21), BASIC_CONSUME_OK, "basic.consume-ok", content = false {
        consumer_tag: ShortString,
    }
    BasicCancel = (CLASS_BASIC, 30), BASIC_CANCEL, "basic.cancel", content = false {
        consumer_tag: ShortString,
        nowait: bool,
    }
    BasicCancelOk = (CLASS_BASIC, 31), BASIC_CANCEL_OK, "basic.cancel-ok", content = false {
        consumer_tag: ShortString,
    }
    /// Publish a message; content frames follow.
    BasicPublish = (CLASS_BASIC, 40), BASIC_PUBLISH, "basic.publish", content = true {
        ticket: u16,
        exchange: ShortString,
        routing_key: ShortString,
        mandatory: bool,
        immediate: bool,
    }
    /// Server returns an unroutable message; content frames follow.
    BasicReturn = (CLASS_BASIC, 50), BASIC_RETURN, "basic.return", content = true {
        reply_code: u16,
        reply_text: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
    }
    /// Server pushes a message to a consumer; content frames follow.
    BasicDeliver = (CLASS_BASIC, 60), BASIC_DELIVER, "basic.deliver", content = true {
        consumer_tag: ShortString,
        delivery_tag: u64,
        redelivered: bool,
        exchange: ShortString,
        routing_key: ShortString,
    }
    BasicGet = (CLASS_BASIC, 70), BASIC_GET, "basic.get", content = false {
        ticket: u16,
        queue: ShortString,
        no_ack: bool,
    }
    /// Reply to `basic.get` with a message; content frames follow.
    BasicGetOk = (CLASS_BASIC, 71), BASIC_GET_OK, "basic.get-ok", content = true {
        delivery_tag: u64,
        redelivered: bool,
        exchange: ShortString,
        routing_key: ShortString,
        message_count: u32,
    }
    BasicGetEmpty = (CLASS_BASIC, 72), BASIC_GET_EMPTY, "basic.get-empty", content = false {
        cluster_id: ShortString,
    }
    BasicAck = (CLASS_BASIC, 80), BASIC_ACK, "basic.ack", content = false {
        delivery_tag: u64,
        multiple: bool,
    }
    BasicReject = (CLASS_BASIC, 90), BASIC_REJECT, "basic.reject", content = false {
        delivery_tag: u64,
        requeue: bool,
    }
    BasicRecoverAsync = (CLASS_BASIC, 100), BASIC_RECOVER_ASYNC, "basic.recover-async", content = false {
        requeue: bool,
    }
    BasicRecover = (CLASS_BASIC, 110), BASIC_RECOVER, "basic.recover", content = false {
        requeue: bool,
    }
    BasicRecoverOk = (CLASS_BASIC, 111), BASIC_RECOVER_OK, "basic.recover-ok", content = false {}

    TxSelect = (CLASS_TX, 10), TX_SELECT, "tx.select", content = false {}
    TxSelectOk = (CLASS_TX, 11), TX_SELECT_OK, "tx.select-ok", content = false {}
    TxCommit = (CLASS_TX, 20), TX_COMMIT, "tx.commit", content = false {}
    TxCommitOk = (CLASS_TX, 21), TX_COMMIT_OK, "tx.commit-ok", content = false {}
    TxRollback = (CLASS_TX, 30), TX_ROLLBACK, "tx.rollback", content = false {}
    TxRollbackOk = (CLASS_TX, 31), TX_ROLLBACK_OK, "tx.rollback-ok", content = false {}
}
