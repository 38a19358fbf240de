//! Typed method arguments for every class the client speaks
//!
//! One struct per method, grouped by class module; the [`Method`] enum is the
//! frame-payload view. The `declare_methods!` table below is the registry:
//! it pins each variant to its `(class-id, method-id)` pair, its qualified
//! name, and whether the method announces content frames.

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::registry::MethodInfo;

pub mod basic;
pub mod channel;
pub mod confirm;
pub mod connection;
pub mod exchange;
pub mod queue;
pub mod tx;

macro_rules! declare_methods {
    (
        $(
            $variant:ident($path:path) => ($class_id:literal, $method_id:literal, $name:literal, $content:literal)
        ),* $(,)?
    ) => {
        /// A decoded method-frame payload.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Method {
            $( $variant($path), )*
        }

        impl Method {
            pub fn class_id(&self) -> u16 {
                match self { $( Method::$variant(_) => $class_id, )* }
            }

            pub fn method_id(&self) -> u16 {
                match self { $( Method::$variant(_) => $method_id, )* }
            }

            /// The qualified protocol name, e.g. `"basic.deliver"`.
            pub fn name(&self) -> &'static str {
                match self { $( Method::$variant(_) => $name, )* }
            }

            /// Whether a content header and body frames follow this method.
            pub fn carries_content(&self) -> bool {
                match self { $( Method::$variant(_) => $content, )* }
            }

            /// Serialize class id, method id, and arguments.
            pub fn encode(&self, w: &mut Writer) -> Result<(), Error> {
                match self {
                    $(
                        Method::$variant(m) => {
                            w.write_short($class_id);
                            w.write_short($method_id);
                            m.encode_args(w)
                        }
                    )*
                }
            }

            /// Parse a method-frame payload.
            ///
            /// A pair absent from the registry yields
            /// [`Error::UnknownMethod`] after consuming the id words, so the
            /// caller still knows which frame to attribute the failure to.
            pub fn decode(payload: &[u8]) -> Result<Self, Error> {
                let mut r = Reader::new(payload);
                let class_id = r.read_short()?;
                let method_id = r.read_short()?;
                match (class_id, method_id) {
                    $(
                        ($class_id, $method_id) => {
                            Ok(Method::$variant(<$path>::decode_args(&mut r)?))
                        }
                    )*
                    _ => Err(Error::UnknownMethod { class_id, method_id }),
                }
            }
        }

        $(
            impl From<$path> for Method {
                fn from(m: $path) -> Self {
                    Method::$variant(m)
                }
            }
        )*

        #[doc(hidden)]
        pub fn registry_lookup(class_id: u16, method_id: u16) -> Option<&'static MethodInfo> {
            match (class_id, method_id) {
                $(
                    ($class_id, $method_id) => Some(&MethodInfo {
                        name: $name,
                        carries_content: $content,
                    }),
                )*
                _ => None,
            }
        }
    };
}

declare_methods! {
    ConnectionStart(connection::Start) => (10, 10, "connection.start", false),
    ConnectionStartOk(connection::StartOk) => (10, 11, "connection.start-ok", false),
    ConnectionSecure(connection::Secure) => (10, 20, "connection.secure", false),
    ConnectionSecureOk(connection::SecureOk) => (10, 21, "connection.secure-ok", false),
    ConnectionTune(connection::Tune) => (10, 30, "connection.tune", false),
    ConnectionTuneOk(connection::TuneOk) => (10, 31, "connection.tune-ok", false),
    ConnectionOpen(connection::Open) => (10, 40, "connection.open", false),
    ConnectionOpenOk(connection::OpenOk) => (10, 41, "connection.open-ok", false),
    ConnectionClose(connection::Close) => (10, 50, "connection.close", false),
    ConnectionCloseOk(connection::CloseOk) => (10, 51, "connection.close-ok", false),
    ConnectionBlocked(connection::Blocked) => (10, 60, "connection.blocked", false),
    ConnectionUnblocked(connection::Unblocked) => (10, 61, "connection.unblocked", false),

    ChannelOpen(channel::Open) => (20, 10, "channel.open", false),
    ChannelOpenOk(channel::OpenOk) => (20, 11, "channel.open-ok", false),
    ChannelFlow(channel::Flow) => (20, 20, "channel.flow", false),
    ChannelFlowOk(channel::FlowOk) => (20, 21, "channel.flow-ok", false),
    ChannelClose(channel::Close) => (20, 40, "channel.close", false),
    ChannelCloseOk(channel::CloseOk) => (20, 41, "channel.close-ok", false),

    ExchangeDeclare(exchange::Declare) => (40, 10, "exchange.declare", false),
    ExchangeDeclareOk(exchange::DeclareOk) => (40, 11, "exchange.declare-ok", false),
    ExchangeDelete(exchange::Delete) => (40, 20, "exchange.delete", false),
    ExchangeDeleteOk(exchange::DeleteOk) => (40, 21, "exchange.delete-ok", false),
    ExchangeBind(exchange::Bind) => (40, 30, "exchange.bind", false),
    ExchangeBindOk(exchange::BindOk) => (40, 31, "exchange.bind-ok", false),
    ExchangeUnbind(exchange::Unbind) => (40, 40, "exchange.unbind", false),
    ExchangeUnbindOk(exchange::UnbindOk) => (40, 51, "exchange.unbind-ok", false),

    QueueDeclare(queue::Declare) => (50, 10, "queue.declare", false),
    QueueDeclareOk(queue::DeclareOk) => (50, 11, "queue.declare-ok", false),
    QueueBind(queue::Bind) => (50, 20, "queue.bind", false),
    QueueBindOk(queue::BindOk) => (50, 21, "queue.bind-ok", false),
    QueuePurge(queue::Purge) => (50, 30, "queue.purge", false),
    QueuePurgeOk(queue::PurgeOk) => (50, 31, "queue.purge-ok", false),
    QueueDelete(queue::Delete) => (50, 40, "queue.delete", false),
    QueueDeleteOk(queue::DeleteOk) => (50, 41, "queue.delete-ok", false),
    QueueUnbind(queue::Unbind) => (50, 50, "queue.unbind", false),
    QueueUnbindOk(queue::UnbindOk) => (50, 51, "queue.unbind-ok", false),

    BasicQos(basic::Qos) => (60, 10, "basic.qos", false),
    BasicQosOk(basic::QosOk) => (60, 11, "basic.qos-ok", false),
    BasicConsume(basic::Consume) => (60, 20, "basic.consume", false),
    BasicConsumeOk(basic::ConsumeOk) => (60, 21, "basic.consume-ok", false),
    BasicCancel(basic::Cancel) => (60, 30, "basic.cancel", false),
    BasicCancelOk(basic::CancelOk) => (60, 31, "basic.cancel-ok", false),
    BasicPublish(basic::Publish) => (60, 40, "basic.publish", true),
    BasicReturn(basic::Return) => (60, 50, "basic.return", true),
    BasicDeliver(basic::Deliver) => (60, 60, "basic.deliver", true),
    BasicGet(basic::Get) => (60, 70, "basic.get", false),
    BasicGetOk(basic::GetOk) => (60, 71, "basic.get-ok", true),
    BasicGetEmpty(basic::GetEmpty) => (60, 72, "basic.get-empty", false),
    BasicAck(basic::Ack) => (60, 80, "basic.ack", false),
    BasicReject(basic::Reject) => (60, 90, "basic.reject", false),
    BasicRecoverAsync(basic::RecoverAsync) => (60, 100, "basic.recover-async", false),
    BasicRecover(basic::Recover) => (60, 110, "basic.recover", false),
    BasicRecoverOk(basic::RecoverOk) => (60, 111, "basic.recover-ok", false),
    BasicNack(basic::Nack) => (60, 120, "basic.nack", false),

    ConfirmSelect(confirm::Select) => (85, 10, "confirm.select", false),
    ConfirmSelectOk(confirm::SelectOk) => (85, 11, "confirm.select-ok", false),

    TxSelect(tx::Select) => (90, 10, "tx.select", false),
    TxSelectOk(tx::SelectOk) => (90, 11, "tx.select-ok", false),
    TxCommit(tx::Commit) => (90, 20, "tx.commit", false),
    TxCommitOk(tx::CommitOk) => (90, 21, "tx.commit-ok", false),
    TxRollback(tx::Rollback) => (90, 30, "tx.rollback", false),
    TxRollbackOk(tx::RollbackOk) => (90, 31, "tx.rollback-ok", false),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::WireDialect;
    use crate::table::FieldTable;

    fn round_trip(method: Method) {
        let mut w = Writer::new(WireDialect::Rabbit);
        method.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        assert_eq!(Method::decode(&buf).unwrap(), method);
    }

    #[test]
    fn method_ids_survive_encode() {
        let m = Method::from(basic::Ack {
            delivery_tag: 9,
            multiple: false,
        });
        let mut w = Writer::new(WireDialect::Rabbit);
        m.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        assert_eq!(&buf[..4], &[0, 60, 0, 80]);
    }

    #[test]
    fn bit_packed_arguments_round_trip() {
        round_trip(Method::from(queue::Declare {
            ticket: 0,
            queue: "work".into(),
            passive: false,
            durable: true,
            exclusive: false,
            auto_delete: true,
            nowait: false,
            arguments: FieldTable::new(),
        }));
        round_trip(Method::from(basic::Nack {
            delivery_tag: 42,
            multiple: true,
            requeue: false,
        }));
        round_trip(Method::from(basic::Deliver {
            consumer_tag: "ctag-1".into(),
            delivery_tag: 7,
            redelivered: true,
            exchange: "logs".into(),
            routing_key: "info".into(),
        }));
    }

    #[test]
    fn bits_resume_after_non_bit_argument() {
        // basic.consume packs four bits, then a table follows
        round_trip(Method::from(basic::Consume {
            ticket: 0,
            queue: "q".into(),
            consumer_tag: String::new(),
            no_local: true,
            no_ack: false,
            exclusive: true,
            nowait: false,
            arguments: FieldTable::new(),
        }));
    }

    #[test]
    fn unknown_pair_is_reported_with_ids() {
        let payload = [0u8, 42, 0, 99];
        assert_eq!(
            Method::decode(&payload),
            Err(Error::UnknownMethod {
                class_id: 42,
                method_id: 99
            })
        );
    }

    #[test]
    fn registry_knows_content_methods() {
        for (class_id, method_id, content) in [
            (60u16, 40u16, true),
            (60, 50, true),
            (60, 60, true),
            (60, 71, true),
            (60, 80, false),
            (10, 10, false),
        ] {
            let info = registry_lookup(class_id, method_id).unwrap();
            assert_eq!(info.carries_content, content, "{}", info.name);
        }
        assert!(registry_lookup(42, 99).is_none());
    }

    #[test]
    fn tune_encodes_its_three_words() {
        let m = Method::from(connection::TuneOk {
            channel_max: 2047,
            frame_max: 131072,
            heartbeat: 60,
        });
        let mut w = Writer::new(WireDialect::Rabbit);
        m.encode(&mut w).unwrap();
        assert_eq!(
            &w.into_bytes()[..],
            &[0, 10, 0, 31, 0x07, 0xff, 0x00, 0x02, 0x00, 0x00, 0x00, 0x3c]
        );
    }
}
