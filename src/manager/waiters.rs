//! Command/response correlation.
//!
//! Subscribe and unsubscribe commands carry a per-connection monotonic id;
//! the read loop routes response frames back to the waiting caller through a
//! one-shot channel registered before the command is sent. Entries time out
//! and self-evict so an unanswered command cannot leak its slot.

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::exchange::messages::{ErrorMsg, SubscribedMsg, WsEnvelope};

/// Parsed command response delivered to the waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Subscribed { sid: u64, channel: String },
    Unsubscribed,
    Ok,
    Error { code: u32, message: String },
}

#[derive(Default)]
pub(super) struct CommandWaiters {
    pending: DashMap<u64, oneshot::Sender<CommandReply>>,
}

impl CommandWaiters {
    /// Register a waiter; MUST happen before the command bytes hit the wire
    /// or a fast response races the map insert.
    pub(super) fn register(&self, cmd_id: u64) -> oneshot::Receiver<CommandReply> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(cmd_id, tx);
        rx
    }

    /// Remove a waiter that timed out or was abandoned.
    pub(super) fn evict(&self, cmd_id: u64) {
        self.pending.remove(&cmd_id);
    }

    /// Route a response envelope to its waiter. Returns false when no waiter
    /// was registered (late response after timeout eviction).
    pub(super) fn complete(&self, envelope: &WsEnvelope) -> bool {
        let Some(id) = envelope.id else {
            return false;
        };
        let Some((_, tx)) = self.pending.remove(&id) else {
            return false;
        };

        let reply = match envelope.kind.as_str() {
            "subscribed" => match serde_json::from_value::<SubscribedMsg>(envelope.msg.clone()) {
                Ok(msg) => CommandReply::Subscribed {
                    sid: msg.sid,
                    channel: msg.channel,
                },
                Err(_) => CommandReply::Error {
                    code: 0,
                    message: "malformed subscribed payload".into(),
                },
            },
            "unsubscribed" => CommandReply::Unsubscribed,
            "ok" => CommandReply::Ok,
            _ => {
                let msg: ErrorMsg =
                    serde_json::from_value(envelope.msg.clone()).unwrap_or(ErrorMsg {
                        code: 0,
                        msg: "unparseable error payload".into(),
                    });
                CommandReply::Error {
                    code: msg.code,
                    message: msg.msg,
                }
            }
        };

        tx.send(reply).is_ok()
    }

    /// Fail every pending waiter; called when the connection drops. Dropping
    /// the senders closes each one-shot, so callers observe the loss.
    pub(super) fn fail_all(&self) {
        self.pending.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> WsEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn subscribed_reply_reaches_waiter() {
        let waiters = CommandWaiters::default();
        let rx = waiters.register(1);

        let routed = waiters.complete(&envelope(
            r#"{"id":1,"type":"subscribed","msg":{"channel":"trade","sid":42}}"#,
        ));
        assert!(routed);
        assert_eq!(
            rx.await.unwrap(),
            CommandReply::Subscribed {
                sid: 42,
                channel: "trade".into()
            }
        );
    }

    #[tokio::test]
    async fn error_reply_carries_code_and_message() {
        let waiters = CommandWaiters::default();
        let rx = waiters.register(2);

        waiters.complete(&envelope(
            r#"{"id":2,"type":"error","msg":{"code":6,"msg":"unknown market"}}"#,
        ));
        assert_eq!(
            rx.await.unwrap(),
            CommandReply::Error {
                code: 6,
                message: "unknown market".into()
            }
        );
    }

    #[test]
    fn late_response_after_eviction_is_ignored() {
        let waiters = CommandWaiters::default();
        let _rx = waiters.register(3);
        waiters.evict(3);

        let routed = waiters.complete(&envelope(
            r#"{"id":3,"type":"subscribed","msg":{"channel":"trade","sid":1}}"#,
        ));
        assert!(!routed);
        assert_eq!(waiters.len(), 0);
    }

    #[test]
    fn fail_all_clears_pending() {
        let waiters = CommandWaiters::default();
        let mut rx = waiters.register(4);
        waiters.fail_all();
        assert_eq!(waiters.len(), 0);
        // Sender dropped: the waiter observes a closed channel.
        assert!(rx.try_recv().is_err());
    }
}
