//! Convenience wrappers for the common channel, exchange, queue, basic and
//! tx methods.
//!
//! Synchronous wrappers send their request with `ticket = 0` and
//! `nowait = false`, wait for the matching `-ok` and return it. A `None`
//! return means the call failed; [`Connection::rpc_reply`] tells why.

use bytes::Bytes;

use super::Connection;
use crate::{
    codec::ShortString,
    error::AmqpError,
    frame::{ContentHeader, Frame, FramePayload, writer::FRAME_OVERHEAD},
    method::{
        BasicAck,
        BasicCancel,
        BasicCancelOk,
        BasicConsume,
        BasicConsumeOk,
        BasicGet,
        BasicProperties,
        BasicPublish,
        BasicQos,
        BasicQosOk,
        BasicRecover,
        BasicRecoverOk,
        BasicReject,
        CLASS_BASIC,
        ChannelClose,
        ChannelFlow,
        ChannelFlowOk,
        ChannelOpen,
        ChannelOpenOk,
        ConnectionClose,
        ExchangeDeclare,
        ExchangeDeclareOk,
        ExchangeDelete,
        ExchangeDeleteOk,
        Method,
        MethodId,
        QueueBind,
        QueueBindOk,
        QueueDeclare,
        QueueDeclareOk,
        QueueDelete,
        QueueDeleteOk,
        QueuePurge,
        QueuePurgeOk,
        QueueUnbind,
        QueueUnbindOk,
        TxCommit,
        TxCommitOk,
        TxRollback,
        TxRollbackOk,
        TxSelect,
        TxSelectOk,
    },
    reply::RpcReply,
    transport::Transport,
};

impl<T: Transport> Connection<T> {
    fn rpc<R>(&mut self, channel: u16, request: impl Into<Method>, reply: MethodId) -> Option<R>
    where
        R: TryFrom<Method>,
    {
        self.simple_rpc_decoded(channel, request, reply)?
            .try_into()
            .ok()
    }

    /// Open `channel`.
    pub fn channel_open(&mut self, channel: u16) -> Option<ChannelOpenOk> {
        self.rpc(channel, ChannelOpen::default(), ChannelOpenOk::ID)
    }

    /// Ask the server to pause or resume deliveries on `channel`.
    pub fn channel_flow(&mut self, channel: u16, active: bool) -> Option<ChannelFlowOk> {
        self.rpc(channel, ChannelFlow { active }, ChannelFlowOk::ID)
    }

    /// Close `channel` with reply `code`; the reply text is the code itself.
    pub fn channel_close(&mut self, channel: u16, code: u16) -> RpcReply {
        let request = ChannelClose {
            reply_code: code,
            reply_text: code.to_string().into(),
            class_id: 0,
            method_id: 0,
        };
        self.most_recent = self.simple_rpc(channel, request, &[MethodId::CHANNEL_CLOSE_OK]);
        self.most_recent.clone()
    }

    /// Close the connection with reply `code`.
    pub fn connection_close(&mut self, code: u16) -> RpcReply {
        let request = ConnectionClose {
            reply_code: code,
            reply_text: code.to_string().into(),
            class_id: 0,
            method_id: 0,
        };
        self.most_recent = self.simple_rpc(0, request, &[MethodId::CONNECTION_CLOSE_OK]);
        self.most_recent.clone()
    }

    /// Declare an exchange.
    pub fn exchange_declare(
        &mut self,
        channel: u16,
        request: ExchangeDeclare,
    ) -> Option<ExchangeDeclareOk> {
        let request = ExchangeDeclare {
            ticket: 0,
            nowait: false,
            ..request
        };
        self.rpc(channel, request, ExchangeDeclareOk::ID)
    }

    /// Delete `exchange`, optionally only while it has no bindings.
    pub fn exchange_delete(
        &mut self,
        channel: u16,
        exchange: impl Into<ShortString>,
        if_unused: bool,
    ) -> Option<ExchangeDeleteOk> {
        let request = ExchangeDelete {
            ticket: 0,
            exchange: exchange.into(),
            if_unused,
            nowait: false,
        };
        self.rpc(channel, request, ExchangeDeleteOk::ID)
    }

    /// Declare a queue. An empty name asks the server to generate one, which
    /// is returned in the reply.
    pub fn queue_declare(&mut self, channel: u16, request: QueueDeclare) -> Option<QueueDeclareOk> {
        let request = QueueDeclare {
            ticket: 0,
            nowait: false,
            ..request
        };
        self.rpc(channel, request, QueueDeclareOk::ID)
    }

    /// Bind a queue to an exchange.
    pub fn queue_bind(&mut self, channel: u16, request: QueueBind) -> Option<QueueBindOk> {
        let request = QueueBind {
            ticket: 0,
            nowait: false,
            ..request
        };
        self.rpc(channel, request, QueueBindOk::ID)
    }

    /// Remove a binding.
    pub fn queue_unbind(&mut self, channel: u16, request: QueueUnbind) -> Option<QueueUnbindOk> {
        let request = QueueUnbind {
            ticket: 0,
            ..request
        };
        self.rpc(channel, request, QueueUnbindOk::ID)
    }

    /// Drop every ready message from `queue`.
    pub fn queue_purge(
        &mut self,
        channel: u16,
        queue: impl Into<ShortString>,
    ) -> Option<QueuePurgeOk> {
        let request = QueuePurge {
            ticket: 0,
            queue: queue.into(),
            nowait: false,
        };
        self.rpc(channel, request, QueuePurgeOk::ID)
    }

    /// Delete `queue`, optionally only while it is unused or empty.
    pub fn queue_delete(
        &mut self,
        channel: u16,
        queue: impl Into<ShortString>,
        if_unused: bool,
        if_empty: bool,
    ) -> Option<QueueDeleteOk> {
        let request = QueueDelete {
            ticket: 0,
            queue: queue.into(),
            if_unused,
            if_empty,
            nowait: false,
        };
        self.rpc(channel, request, QueueDeleteOk::ID)
    }

    /// Limit unacknowledged deliveries.
    pub fn basic_qos(
        &mut self,
        channel: u16,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Option<BasicQosOk> {
        let request = BasicQos {
            prefetch_size,
            prefetch_count,
            global,
        };
        self.rpc(channel, request, BasicQosOk::ID)
    }

    /// Start a consumer. An empty tag asks the server to generate one.
    pub fn basic_consume(&mut self, channel: u16, request: BasicConsume) -> Option<BasicConsumeOk> {
        let request = BasicConsume {
            ticket: 0,
            nowait: false,
            ..request
        };
        self.rpc(channel, request, BasicConsumeOk::ID)
    }

    /// Cancel the consumer `consumer_tag`.
    pub fn basic_cancel(
        &mut self,
        channel: u16,
        consumer_tag: impl Into<ShortString>,
    ) -> Option<BasicCancelOk> {
        let request = BasicCancel {
            consumer_tag: consumer_tag.into(),
            nowait: false,
        };
        self.rpc(channel, request, BasicCancelOk::ID)
    }

    /// Redeliver unacknowledged messages.
    pub fn basic_recover(&mut self, channel: u16, requeue: bool) -> Option<BasicRecoverOk> {
        self.rpc(channel, BasicRecover { requeue }, BasicRecoverOk::ID)
    }

    /// Publish `body` with `properties`.
    ///
    /// Sends the method frame, a content header and as many body frames as
    /// the body needs, each carrying at most `frame_max - 8` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::Transport`] if a write fails and
    /// [`AmqpError::BadAmqpData`] if the method or header does not fit in a
    /// frame.
    pub fn basic_publish(
        &mut self,
        channel: u16,
        request: BasicPublish,
        properties: BasicProperties,
        body: &[u8],
    ) -> Result<(), AmqpError> {
        self.send_method(channel, BasicPublish { ticket: 0, ..request })?;
        self.send_frame(&Frame::new(
            channel,
            FramePayload::Header(ContentHeader {
                class_id: CLASS_BASIC,
                body_size: body.len() as u64,
                properties: properties.into(),
                raw: Bytes::new(),
            }),
        ))?;
        let usable = self.reader.frame_max() - FRAME_OVERHEAD;
        for fragment in body.chunks(usable) {
            self.send_body(channel, fragment)?;
        }
        Ok(())
    }

    /// Acknowledge `delivery_tag`, and every earlier tag if `multiple`.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::Transport`] if the write fails.
    pub fn basic_ack(
        &mut self,
        channel: u16,
        delivery_tag: u64,
        multiple: bool,
    ) -> Result<(), AmqpError> {
        self.send_method(
            channel,
            BasicAck {
                delivery_tag,
                multiple,
            },
        )
    }

    /// Reject `delivery_tag`, optionally requeueing it.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::Transport`] if the write fails.
    pub fn basic_reject(
        &mut self,
        channel: u16,
        delivery_tag: u64,
        requeue: bool,
    ) -> Result<(), AmqpError> {
        self.send_method(
            channel,
            BasicReject {
                delivery_tag,
                requeue,
            },
        )
    }

    /// Fetch one message from `queue`.
    ///
    /// A normal reply carries either `basic.get-ok`, whose content follows
    /// and can be read with [`Connection::read_content`], or
    /// `basic.get-empty`.
    pub fn basic_get(
        &mut self,
        channel: u16,
        queue: impl Into<ShortString>,
        no_ack: bool,
    ) -> RpcReply {
        let request = BasicGet {
            ticket: 0,
            queue: queue.into(),
            no_ack,
        };
        self.most_recent = self.simple_rpc(
            channel,
            request,
            &[MethodId::BASIC_GET_OK, MethodId::BASIC_GET_EMPTY],
        );
        self.most_recent.clone()
    }

    /// Put `channel` in transactional mode.
    pub fn tx_select(&mut self, channel: u16) -> Option<TxSelectOk> {
        self.rpc(channel, TxSelect {}, TxSelectOk::ID)
    }

    /// Commit the current transaction.
    pub fn tx_commit(&mut self, channel: u16) -> Option<TxCommitOk> {
        self.rpc(channel, TxCommit {}, TxCommitOk::ID)
    }

    /// Abandon the current transaction.
    pub fn tx_rollback(&mut self, channel: u16) -> Option<TxRollbackOk> {
        self.rpc(channel, TxRollback {}, TxRollbackOk::ID)
    }
}
