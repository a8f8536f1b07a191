use std::sync::Arc;

use battleship_core_common::messages::{GameMode, OutboundEvent};
use battleship_core_common::{MatchId, UserId};
use log::{debug, info, warn};

use crate::ephemeral::EphemeralStore;
use crate::events::EventBus;
use crate::persistence::models::MatchMode;
use crate::persistence::{MatchRepo, PlayerRepo, Repositories, StatsRepo, UserGlobalStatsRepo};

use super::{elimination, stats, turn};

/// `PassTurn` of §4.6. Composes the elimination detector, turn logic, and stats
/// calculator; terminates the match on victory/abandonment or advances the turn.
/// Every internal await here runs inside the caller's per-match serialization domain
/// (§5) — the match actor is the only thing that may call this.
pub async fn pass_turn(
    match_id: MatchId,
    actor_user_id: UserId,
    repos: &Repositories,
    ephemeral: &Arc<dyn EphemeralStore>,
    events: &EventBus,
) {
    let Ok(Some(mwp)) = repos.matches.find_by_id(match_id).await else {
        warn!("pass_turn: match {match_id} not found, skipping");
        return;
    };
    let Some(board) = mwp.m.board.clone() else {
        warn!("pass_turn: match {match_id} has no board, finalizing as abandoned");
        finalize_abandoned(match_id, &mwp.players.iter().map(|p| p.user_id).collect::<Vec<_>>(), repos, ephemeral, events).await;
        return;
    };

    let eliminated = match elimination::detect_and_mark(match_id, &mwp.players, &board, &repos.players).await {
        Ok(e) => e,
        Err(e) => {
            warn!("pass_turn: elimination detection failed for {match_id}: {e}");
            Vec::new()
        }
    };
    for user_id in &eliminated {
        events.emit_to_room(match_id, OutboundEvent::PlayerEliminated { user_id: *user_id });
    }

    let mut players = mwp.players.clone();
    for p in players.iter_mut() {
        if eliminated.contains(&p.user_id) {
            p.left_at = Some(chrono::Utc::now());
        }
    }
    let alive: Vec<UserId> = players.iter().filter(|p| p.is_active()).map(|p| p.user_id).collect();

    if alive.is_empty() {
        info!("match {match_id} abandoned: no players remain");
        finalize_abandoned(match_id, &players.iter().map(|p| p.user_id).collect::<Vec<_>>(), repos, ephemeral, events).await;
        return;
    }

    if mwp.m.mode == MatchMode::Individual && turn::is_last_one(&alive) {
        let winner = alive[0];
        finalize_victory(match_id, &players, &board, Some(winner), None, GameMode::Individual, repos, ephemeral, events).await;
        return;
    }

    if mwp.m.mode == MatchMode::Teams {
        if let Some(team) = turn::single_alive_team(&players) {
            finalize_victory(match_id, &players, &board, None, Some(team), GameMode::Teams, repos, ephemeral, events).await;
            return;
        }
    }

    let next = turn::next_user_id(&alive, actor_user_id);
    if let Err(e) = ephemeral.set_turn(match_id, next).await {
        warn!("pass_turn: failed to persist new turn owner for {match_id}: {e}");
    }
    debug!("match {match_id}: turn passes to {next}");
    events.emit_to_room(match_id, OutboundEvent::TurnChanged { user_id: next });
}

async fn finalize_victory(
    match_id: MatchId,
    players: &[crate::persistence::models::MatchPlayer],
    board: &battleship_core_common::Board,
    winner_user_id: Option<UserId>,
    winning_team: Option<i32>,
    mode: GameMode,
    repos: &Repositories,
    ephemeral: &Arc<dyn EphemeralStore>,
    events: &EventBus,
) {
    match (winner_user_id, winning_team) {
        (Some(uid), _) => {
            let _ = repos.players.mark_winner(match_id, uid).await;
        }
        (None, Some(team)) => {
            let _ = repos.players.mark_team_players_as_winners(match_id, team).await;
        }
        _ => {}
    }

    let mut final_players = players.to_vec();
    for p in final_players.iter_mut() {
        p.is_winner = match (winner_user_id, winning_team) {
            (Some(uid), _) => p.user_id == uid,
            (None, Some(team)) => p.team == Some(team),
            _ => false,
        };
    }

    let _ = repos.matches.mark_finished(match_id).await;
    let all_stats = stats::compute_stats(match_id, &final_players, board);
    if let Err(e) = repos.stats.save_many(match_id, all_stats.clone()).await {
        warn!("failed to save stats for {match_id}: {e}");
    }
    let now = chrono::Utc::now();
    for s in &all_stats {
        if let Err(e) = repos.user_global_stats.upsert_from_match_stats(s, now).await {
            warn!("failed to upsert global stats for user {}: {e}", s.user_id);
        }
    }

    let user_ids: Vec<UserId> = final_players.iter().map(|p| p.user_id).collect();
    let _ = ephemeral.clear_match(match_id, &user_ids).await;

    events.emit_to_room(match_id, OutboundEvent::GameEnded { mode, winner_user_id, winning_team });
}

async fn finalize_abandoned(
    match_id: MatchId,
    user_ids: &[UserId],
    repos: &Repositories,
    ephemeral: &Arc<dyn EphemeralStore>,
    events: &EventBus,
) {
    let _ = repos.matches.mark_finished(match_id).await;
    let _ = ephemeral.clear_match(match_id, user_ids).await;
    events.emit_to_room(match_id, OutboundEvent::GameAbandoned);
}
