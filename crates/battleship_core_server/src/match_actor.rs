//! The per-match actor of §2.1/§5: one task per live match, draining a single-consumer
//! command queue so every state mutation for that match runs strictly one at a time, even
//! though many gateway connections feed it concurrently. Built on the same
//! stop-signal-plus-`JoinHandle` lifecycle the rest of this crate uses for background tasks.

use std::sync::Arc;

use battleship_core_common::board::ShotType;
use battleship_core_common::messages::JoinRole;
use battleship_core_common::{MatchId, UserId};
use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::ephemeral::EphemeralStore;
use crate::events::EventBus;
use crate::game::orchestrator;
use crate::game::timeout::{TimeoutFired, TimeoutManager, TimeoutOutcome};
use crate::handlers::{self, ConnCtx, HandlerCx};
use crate::persistence::Repositories;
use crate::tasks::TaskControl;

pub enum Command {
    Join { ctx: ConnCtx, role: JoinRole },
    Ready { ctx: ConnCtx },
    ChooseTeam { ctx: ConnCtx, team: i32 },
    CreatorTransfer { ctx: ConnCtx, target_user_id: UserId },
    Start { ctx: ConnCtx },
    Fire { ctx: ConnCtx, x: u8, y: u8, shot_type: ShotType, extra_targets: Vec<(u8, u8)> },
    Leave { ctx: ConnCtx },
    Disconnect { ctx: ConnCtx },
    Reconnect { ctx: ConnCtx },
    TimeoutFired(TimeoutFired),
}

/// The dependencies every match actor shares with every other one. Cheap to clone (it's all
/// `Arc`s), so the gateway hands out one `Shared` to every actor it spawns.
pub struct Shared {
    pub repos: Repositories,
    pub ephemeral: Arc<dyn EphemeralStore>,
    pub events: Arc<EventBus>,
    pub config: Arc<Config>,
    pub timeouts: Arc<TimeoutManager>,
}

#[derive(Clone)]
pub struct MatchActorHandle {
    match_id: MatchId,
    tx: mpsc::UnboundedSender<Command>,
}

impl MatchActorHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            warn!("match actor {} is gone, dropping command", self.match_id);
        }
    }
}

/// Spawns the actor task for `match_id` and returns a handle to feed it commands plus the
/// [`TaskControl`] the owner uses to shut it down.
pub fn spawn(match_id: MatchId, shared: Arc<Shared>) -> (MatchActorHandle, TaskControl) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let (timeout_tx, mut timeout_rx) = mpsc::unbounded_channel::<TimeoutFired>();

    let relay_tx = tx.clone();
    tokio::spawn(async move {
        // A fired timer is folded back onto the match's own queue rather than acted on
        // directly by the timer task, so it still takes its turn behind anything already
        // pending and the state change happens inside the match's serialization domain (§5).
        while let Some(fired) = timeout_rx.recv().await {
            if relay_tx.send(Command::TimeoutFired(fired)).is_err() {
                break;
            }
        }
    });

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => dispatch(match_id, cmd, &shared, &timeout_tx).await,
                        None => break,
                    }
                }
            }
        }
        info!("match actor {match_id} stopped");
    });

    (MatchActorHandle { match_id, tx }, TaskControl::new(stop_tx, handle))
}

async fn dispatch(match_id: MatchId, cmd: Command, shared: &Shared, timeout_tx: &mpsc::UnboundedSender<TimeoutFired>) {
    let cx = HandlerCx { repos: &shared.repos, ephemeral: &shared.ephemeral, events: &shared.events, config: &shared.config };

    match cmd {
        Command::Join { ctx, role } => handlers::handle_join(&cx, &ctx, match_id, role).await,
        Command::Ready { ctx } => handlers::handle_ready(&cx, &ctx, match_id).await,
        Command::ChooseTeam { ctx, team } => handlers::handle_choose_team(&cx, &ctx, match_id, team).await,
        Command::CreatorTransfer { ctx, target_user_id } => handlers::handle_creator_transfer(&cx, &ctx, match_id, target_user_id).await,
        Command::Start { ctx } => {
            handlers::handle_start(&cx, &ctx, match_id).await;
            arm_timeout(match_id, shared, timeout_tx).await;
        }
        Command::Fire { ctx, x, y, shot_type, extra_targets } => {
            handlers::handle_fire(&cx, &ctx, match_id, x, y, shot_type, &extra_targets).await;
            arm_timeout(match_id, shared, timeout_tx).await;
        }
        Command::Leave { ctx } => {
            handlers::handle_leave(&cx, &ctx, match_id).await;
            shared.timeouts.cancel(match_id);
        }
        Command::Disconnect { ctx } => handlers::handle_disconnect(&cx, &ctx, match_id).await,
        Command::Reconnect { ctx } => handlers::handle_reconnect(&cx, &ctx).await,
        Command::TimeoutFired(fired) => handle_timeout(match_id, fired, shared, timeout_tx).await,
    }
}

async fn arm_timeout(match_id: MatchId, shared: &Shared, timeout_tx: &mpsc::UnboundedSender<TimeoutFired>) {
    if let Ok(Some(owner)) = shared.ephemeral.get_turn(match_id).await {
        let _ = shared.ephemeral.set_turn_timeout_owner(match_id, owner).await;
        shared.timeouts.start(match_id, owner, timeout_tx.clone());
    } else {
        shared.timeouts.cancel(match_id);
    }
}

/// Runs one fired timer through §4.7's expiry handling and folds the result back into the
/// match's own turn/abandonment machinery, exactly as a `Fire`/`Leave` command would.
async fn handle_timeout(match_id: MatchId, fired: TimeoutFired, shared: &Shared, timeout_tx: &mpsc::UnboundedSender<TimeoutFired>) {
    let outcome = crate::game::timeout::handle_expiry(fired, shared.ephemeral.as_ref(), shared.config.max_missed_turns, &shared.events).await;
    match outcome {
        TimeoutOutcome::PassTurn { actor_user_id } => {
            orchestrator::pass_turn(match_id, actor_user_id, &shared.repos, &shared.ephemeral, &shared.events).await;
            arm_timeout(match_id, shared, timeout_tx).await;
        }
        TimeoutOutcome::Abandoned { user_id } => {
            let _ = shared.repos.players.mark_left(match_id, user_id).await;
            orchestrator::pass_turn(match_id, user_id, &shared.repos, &shared.ephemeral, &shared.events).await;
            arm_timeout(match_id, shared, timeout_tx).await;
        }
        TimeoutOutcome::Stale => {}
    }
}
