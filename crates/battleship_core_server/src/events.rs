use std::collections::HashMap;
use std::sync::Mutex;

use battleship_core_common::messages::OutboundEvent;
use battleship_core_common::{ConnId, MatchId, UserId};
use log::debug;
use tokio::sync::mpsc;

/// One live connection's outbound mailbox.
pub type Outbox = mpsc::UnboundedSender<OutboundEvent>;

/// The connection registry and typed egress abstraction of §4.10. Delivery is best-effort:
/// a send against a closed socket is logged and dropped rather than propagated, since by
/// the time an event fires the state change behind it is already durably committed.
#[derive(Default)]
pub struct EventBus {
    conns: Mutex<HashMap<ConnId, (UserId, MatchId, Outbox)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn_id: ConnId, user_id: UserId, match_id: MatchId, outbox: Outbox) {
        self.conns.lock().unwrap().insert(conn_id, (user_id, match_id, outbox));
    }

    pub fn unregister(&self, conn_id: ConnId) {
        self.conns.lock().unwrap().remove(&conn_id);
    }

    pub fn emit_to_connection(&self, conn_id: ConnId, event: OutboundEvent) {
        let guard = self.conns.lock().unwrap();
        if let Some((_, _, outbox)) = guard.get(&conn_id) {
            if outbox.send(event).is_err() {
                debug!("dropping event for closed connection {conn_id}");
            }
        }
    }

    pub fn emit_to_room(&self, match_id: MatchId, event: OutboundEvent) {
        let guard = self.conns.lock().unwrap();
        for (conn_id, (_, m, outbox)) in guard.iter() {
            if *m == match_id {
                if outbox.send(event.clone()).is_err() {
                    debug!("dropping room event for closed connection {conn_id}");
                }
            }
        }
    }

    pub fn emit_to_user(&self, user_id: UserId, event: OutboundEvent) {
        let guard = self.conns.lock().unwrap();
        for (conn_id, (u, _, outbox)) in guard.iter() {
            if *u == user_id {
                if outbox.send(event.clone()).is_err() {
                    debug!("dropping user event for closed connection {conn_id}");
                }
            }
        }
    }

    pub fn room_connections(&self, match_id: MatchId) -> Vec<ConnId> {
        self.conns.lock().unwrap().iter().filter(|(_, (_, m, _))| *m == match_id).map(|(c, _)| *c).collect()
    }

    pub fn room_is_empty(&self, match_id: MatchId) -> bool {
        self.room_connections(match_id).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_to_room_reaches_every_bound_connection_only() {
        let bus = EventBus::new();
        let match_a = MatchId::new_v4();
        let match_b = MatchId::new_v4();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.register(ConnId::new_v4(), 1, match_a, tx_a);
        bus.register(ConnId::new_v4(), 2, match_b, tx_b);

        bus.emit_to_room(match_a, OutboundEvent::Heartbeat);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn emit_to_closed_connection_does_not_panic() {
        let bus = EventBus::new();
        let conn = ConnId::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        bus.register(conn, 1, MatchId::new_v4(), tx);
        bus.emit_to_connection(conn, OutboundEvent::Heartbeat);
    }
}
