//! Viewer fan-out.
//!
//! Every session owns one broadcast group. Any number of viewer transports
//! subscribe to it and receive the same JSON-serializable stream of state
//! change notifications. A session with zero viewers keeps broadcasting into
//! the void; sends never fail the session.

use crate::client::models::{Msg, User};
use serde::Serialize;
use tokio::sync::broadcast;

/// One state-change notification to all viewers of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Push {
    /// A network was added (sent before its handshake completes).
    Network { network: serde_json::Value },
    /// A message was appended to a channel. `chan` is absent for errors that
    /// have no target buffer, e.g. a refused connect request.
    Msg {
        #[serde(skip_serializing_if = "Option::is_none")]
        chan: Option<u64>,
        msg: Msg,
    },
    /// A backward history page, served on request.
    More { chan: u64, messages: Vec<Msg> },
    /// Membership snapshot for a channel.
    Names { chan: u64, users: Vec<User> },
    /// A channel came into existence (join or query auto-creation).
    Join { network: u64, chan: serde_json::Value },
    /// A channel was closed.
    Part { chan: u64 },
    /// A whole network was removed.
    Quit { network: u64 },
    /// Terminal marker: all viewer transports must drop their connection.
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct Fanout {
    tx: broadcast::Sender<Push>,
}

impl Fanout {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Push> {
        self.tx.subscribe()
    }

    pub fn send(&self, push: Push) {
        // No subscribers is not an error; state changes happen regardless of
        // whether anyone is watching.
        let _ = self.tx.send(push);
    }

    /// Tell every attached viewer transport to drop its connection.
    pub fn disconnect_all(&self) {
        let _ = self.tx.send(Push::Disconnect);
    }

    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::{Msg, MsgKind};

    #[test]
    fn subscribers_receive_pushes() {
        let fanout = Fanout::new(16);
        let mut rx = fanout.subscribe();
        fanout.send(Push::Msg {
            chan: Some(7),
            msg: Msg::new(1, MsgKind::System, "", "hello"),
        });
        match rx.try_recv().unwrap() {
            Push::Msg { chan, msg } => {
                assert_eq!(chan, Some(7));
                assert_eq!(msg.text, "hello");
            }
            other => panic!("unexpected push: {:?}", other),
        }
    }

    #[test]
    fn send_without_subscribers_is_fine() {
        let fanout = Fanout::new(16);
        fanout.send(Push::Part { chan: 1 });
        assert_eq!(fanout.viewer_count(), 0);
    }

    #[test]
    fn msg_without_chan_omits_the_field() {
        let push = Push::Msg {
            chan: None,
            msg: Msg::new(1, MsgKind::Error, "", "refused"),
        };
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["event"], "msg");
        assert!(json["data"].get("chan").is_none());
    }
}
