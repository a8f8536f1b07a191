use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use battleship_core_common::messages::OutboundEvent;
use battleship_core_common::{MatchId, UserId};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The timeout manager of §4.7. One in-process timer per match; the match actor owns the
/// resulting [`JoinHandle`]s and routes expiry notifications back onto its own command
/// queue via `on_expiry`, so the actual state transition still happens inside the
/// per-match serialization domain rather than inside the timer task itself.
pub struct TimeoutManager {
    duration: Duration,
    handles: Mutex<HashMap<MatchId, JoinHandle<()>>>,
}

/// Sent by an expired timer back to the owning match actor.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutFired {
    pub match_id: MatchId,
    pub expected_user_id: UserId,
}

impl TimeoutManager {
    pub fn new(duration: Duration) -> Self {
        TimeoutManager { duration, handles: Mutex::new(HashMap::new()) }
    }

    /// Starts (or restarts) the timer for `match_id`, expecting `expected_user_id` to act
    /// before it fires. Any existing timer for the match is cancelled first.
    pub fn start(&self, match_id: MatchId, expected_user_id: UserId, on_expiry: mpsc::UnboundedSender<TimeoutFired>) {
        self.cancel(match_id);
        let duration = self.duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = on_expiry.send(TimeoutFired { match_id, expected_user_id });
        });
        self.handles.lock().unwrap().insert(match_id, handle);
    }

    /// Stops the in-process timer without touching any stored state.
    pub fn cancel(&self, match_id: MatchId) {
        if let Some(handle) = self.handles.lock().unwrap().remove(&match_id) {
            handle.abort();
        }
    }
}

/// Handles one fired timer, per §4.7's expiry algorithm. Guards against acting on a stale
/// timer by re-checking the stored expected owner before doing anything.
pub async fn handle_expiry(
    fired: TimeoutFired,
    ephemeral: &dyn crate::ephemeral::EphemeralStore,
    max_missed_turns: u32,
    events: &crate::events::EventBus,
) -> TimeoutOutcome {
    let current = ephemeral.get_turn_timeout_owner(fired.match_id).await.ok().flatten();
    if current != Some(fired.expected_user_id) {
        return TimeoutOutcome::Stale;
    }

    let missed = match ephemeral.incr_missed(fired.match_id, fired.expected_user_id).await {
        Ok(n) => n,
        Err(e) => {
            warn!("failed to increment missed-turn counter: {e}");
            return TimeoutOutcome::Stale;
        }
    };

    if missed >= max_missed_turns {
        let _ = ephemeral.mark_abandoned(fired.match_id, fired.expected_user_id).await;
        info!("player {} abandoned match {} after {missed} missed turns", fired.expected_user_id, fired.match_id);
        events.emit_to_room(fired.match_id, OutboundEvent::PlayerEliminated { user_id: fired.expected_user_id });
        events.emit_to_user(fired.expected_user_id, OutboundEvent::PlayerKicked { reason: "too many missed turns".into() });
        TimeoutOutcome::Abandoned { user_id: fired.expected_user_id }
    } else {
        events.emit_to_room(fired.match_id, OutboundEvent::TurnTimeout { user_id: fired.expected_user_id });
        TimeoutOutcome::PassTurn { actor_user_id: fired.expected_user_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    Stale,
    PassTurn { actor_user_id: UserId },
    Abandoned { user_id: UserId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeral::memory_store::InMemoryEphemeralStore;

    #[tokio::test]
    async fn stale_timer_is_ignored() {
        let store = InMemoryEphemeralStore::new();
        let bus = crate::events::EventBus::new();
        let match_id = MatchId::new_v4();
        store.set_turn_timeout_owner(match_id, 1).await.unwrap();
        let outcome = handle_expiry(TimeoutFired { match_id, expected_user_id: 2 }, &store, 3, &bus).await;
        assert_eq!(outcome, TimeoutOutcome::Stale);
    }

    #[tokio::test]
    async fn three_misses_abandon_the_player() {
        let store = InMemoryEphemeralStore::new();
        let bus = crate::events::EventBus::new();
        let match_id = MatchId::new_v4();
        store.set_turn_timeout_owner(match_id, 1).await.unwrap();

        for _ in 0..2 {
            let outcome = handle_expiry(TimeoutFired { match_id, expected_user_id: 1 }, &store, 3, &bus).await;
            assert_eq!(outcome, TimeoutOutcome::PassTurn { actor_user_id: 1 });
        }
        let outcome = handle_expiry(TimeoutFired { match_id, expected_user_id: 1 }, &store, 3, &bus).await;
        assert_eq!(outcome, TimeoutOutcome::Abandoned { user_id: 1 });
        assert!(store.is_abandoned(match_id, 1).await.unwrap());
    }
}
