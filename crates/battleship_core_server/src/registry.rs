//! Tracks which matches currently have a live actor task (§2.1) and spawns one on first use.
//! A match with no connections and no pending commands is torn down by `reap`, called
//! periodically from `main` — actors are cheap but not free, and a server that never
//! restarts would otherwise accumulate one per match ever played.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use battleship_core_common::MatchId;
use log::info;

use crate::match_actor::{self, MatchActorHandle, Shared};
use crate::tasks::TaskControl;

#[derive(Default)]
pub struct MatchRegistry {
    actors: Mutex<HashMap<MatchId, (MatchActorHandle, Arc<Mutex<Option<TaskControl>>>)>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, match_id: MatchId) -> Option<MatchActorHandle> {
        self.actors.lock().unwrap().get(&match_id).map(|(h, _)| h.clone())
    }

    pub fn get_or_spawn(&self, match_id: MatchId, shared: &Arc<Shared>) -> Option<MatchActorHandle> {
        let mut guard = self.actors.lock().unwrap();
        if let Some((handle, _)) = guard.get(&match_id) {
            return Some(handle.clone());
        }
        let (handle, control) = match_actor::spawn(match_id, shared.clone());
        info!("spawned match actor for {match_id}");
        guard.insert(match_id, (handle.clone(), Arc::new(Mutex::new(Some(control)))));
        Some(handle)
    }

    /// Drops actors for matches with no bound connections left, per the EventBus's own
    /// room-membership bookkeeping. Best-effort: an actor that races a reap with an
    /// incoming command simply gets respawned next time `get_or_spawn` is called.
    pub async fn reap(&self, events: &crate::events::EventBus) {
        let stale: Vec<MatchId> = {
            let guard = self.actors.lock().unwrap();
            guard.keys().copied().filter(|id| events.room_is_empty(*id)).collect()
        };
        for match_id in stale {
            let control = {
                let mut guard = self.actors.lock().unwrap();
                guard.remove(&match_id).and_then(|(_, c)| c.lock().unwrap().take())
            };
            if let Some(control) = control {
                control.stop().await;
                info!("reaped idle match actor for {match_id}");
            }
        }
    }
}
