//! The per-message handlers of §4.8. Each function assumes it runs inside the owning
//! match's serialization domain (the match actor never runs two of these concurrently for
//! the same match) and translates every failure into an emitted event rather than
//! propagating an error past itself (§7).

use std::sync::Arc;

use battleship_core_common::board::ShotType;
use battleship_core_common::error::{CoreError, CoreResult};
use battleship_core_common::messages::{Ack, GameMode, JoinRole, OutboundEvent};
use battleship_core_common::{ConnId, MatchId, UserId};
use log::{info, warn};
use rand::thread_rng;

use crate::board_view;
use crate::config::Config;
use crate::ephemeral::EphemeralStore;
use crate::events::EventBus;
use crate::game::{board_gen, orchestrator, shot_resolver};
use crate::persistence::models::{MatchMode, MatchStatus};
use crate::persistence::Repositories;

#[derive(Debug, Clone)]
pub struct ConnCtx {
    pub conn_id: ConnId,
    pub user_id: UserId,
    pub nickname: String,
    pub color: String,
}

pub struct HandlerCx<'a> {
    pub repos: &'a Repositories,
    pub ephemeral: &'a Arc<dyn EphemeralStore>,
    pub events: &'a EventBus,
    pub config: &'a Config,
}

pub async fn handle_join(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId, role: JoinRole) {
    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::JoinDenied { reason: "match not found".into() });
        return;
    };

    if cx.ephemeral.is_abandoned(match_id, ctx.user_id).await.unwrap_or(false) {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::JoinDenied { reason: "player is abandoned".into() });
        return;
    }

    match role {
        JoinRole::Player => {
            if mwp.player(ctx.user_id).is_some() {
                // Already a player in this match — treat as reconnect rather than re-joining
                // (spec.md:168), so we emit the same PLAYER_RECONNECTED/RECONNECT_ACK pair
                // `handle_reconnect` does instead of a second PLAYER_JOINED.
                reconnect_into_room(cx, ctx, match_id).await;
                return;
            }
            if mwp.m.status != MatchStatus::Waiting {
                cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::JoinDenied { reason: "match already started".into() });
                return;
            }
            if mwp.players.iter().filter(|p| p.is_active()).count() as u32 >= mwp.m.max_players {
                cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::JoinDenied { reason: "match is full".into() });
                return;
            }
            if let Err(e) = cx.repos.matches.add_player(match_id, ctx.user_id, None).await {
                warn!("join: failed to add player: {e}");
                cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::Error { code: e.code().into(), message: e.to_string() });
                return;
            }

            bind_connection(cx, ctx, match_id).await;
            cx.events.emit_to_room(match_id, OutboundEvent::PlayerJoined { user_id: ctx.user_id, nickname: ctx.nickname.clone(), role });
            cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::PlayerJoinedAck(Ack::ok()));

            if mwp.m.status == MatchStatus::InProgress {
                send_board_view(cx, ctx, match_id).await;
            }
        }
        JoinRole::Spectator => {
            if cx.repos.spectators.find_first(match_id, ctx.user_id).await.ok().flatten().is_none() {
                if let Err(e) = cx.repos.spectators.insert(match_id, ctx.user_id).await {
                    warn!("join: failed to insert spectator: {e}");
                }
            }
            bind_connection(cx, ctx, match_id).await;
            cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::SpectatorJoinedAck(Ack::ok()));
            if mwp.m.status == MatchStatus::InProgress {
                send_board_view(cx, ctx, match_id).await;
            }
        }
    }
}

async fn bind_connection(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    let _ = cx.ephemeral.save_conn(ctx.conn_id, ctx.user_id, match_id).await;
    let _ = cx.ephemeral.set_last_match_by_user(ctx.user_id, match_id).await;
}

pub async fn handle_ready(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    if let Err(e) = cx.ephemeral.mark_ready(match_id, ctx.conn_id).await {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::Error { code: e.code().into(), message: e.to_string() });
        return;
    }
    cx.events.emit_to_room(match_id, OutboundEvent::PlayerReadyNotify { user_id: ctx.user_id });
    cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::PlayerReadyAck(Ack::ok()));

    let expected = cx.events.room_connections(match_id);
    if cx.ephemeral.all_ready(match_id, &expected).await.unwrap_or(false) {
        cx.events.emit_to_room(match_id, OutboundEvent::AllReady);
    }
}

pub async fn handle_choose_team(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId, team: i32) {
    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::Error { code: "NOT_FOUND".into(), message: "match not found".into() });
        return;
    };
    if mwp.m.mode != MatchMode::Teams {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::Error { code: "VALIDATION_ERROR".into(), message: "match is not in teams mode".into() });
        return;
    }
    let team_count = mwp.m.team_count.unwrap_or(2) as i32;
    if team < 1 || team > team_count {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::Error { code: "VALIDATION_ERROR".into(), message: format!("team must be in 1..={team_count}") });
        return;
    }
    if let Err(e) = cx.ephemeral.set_team(match_id, ctx.conn_id, team).await {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::Error { code: e.code().into(), message: e.to_string() });
        return;
    }
    cx.events.emit_to_room(match_id, OutboundEvent::PlayerTeamAssigned { user_id: ctx.user_id, team });
}

pub async fn handle_creator_transfer(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId, target_user_id: UserId) {
    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::CreatorTransferAck(Ack::fail("match not found")));
        return;
    };
    if mwp.m.created_by_id != ctx.user_id {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::CreatorTransferAck(Ack::fail("only the creator can transfer")));
        return;
    }
    let target_connected = cx.events.room_connections(match_id).iter().any(|&c| {
        // best-effort: a disconnected target can't be looked up without a conn->user reverse
        // index, so this check is approximated by requiring the target to be an active player.
        let _ = c;
        mwp.player(target_user_id).map(|p| p.is_active()).unwrap_or(false)
    });
    if !target_connected {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::CreatorTransferAck(Ack::fail("target is not connected")));
        return;
    }
    if let Err(e) = cx.repos.matches.update_creator(match_id, target_user_id).await {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::CreatorTransferAck(Ack::fail(e.to_string())));
        return;
    }
    cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::CreatorTransferAck(Ack::ok()));
    cx.events.emit_to_room(match_id, OutboundEvent::CreatorChanged { new_creator_id: target_user_id });
}

pub async fn handle_start(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail("match not found")));
        return;
    };
    if mwp.m.created_by_id != ctx.user_id {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail("only the creator can start the match")));
        return;
    }
    let expected_conns = cx.events.room_connections(match_id);
    if !cx.ephemeral.all_ready(match_id, &expected_conns).await.unwrap_or(false) {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail("not every player is ready")));
        return;
    }

    let teams = cx.ephemeral.all_teams(match_id).await.unwrap_or_default();
    if mwp.m.mode == MatchMode::Teams {
        if expected_conns.iter().any(|c| !teams.iter().any(|(tc, _)| tc == c)) {
            cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail("every player must choose a team")));
            return;
        }
        let mut counts = std::collections::HashMap::new();
        for (_, t) in &teams {
            *counts.entry(*t).or_insert(0u32) += 1;
        }
        if !counts.values().any(|&n| n >= 2) {
            cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail("at least one team needs two members")));
            return;
        }
    }

    let player_ids: Vec<UserId> = mwp.players.iter().filter(|p| p.is_active()).map(|p| p.user_id).collect();
    let mut rng = thread_rng();
    let mut board = match board_gen::generate_board(
        &player_ids,
        mwp.m.difficulty,
        mwp.m.mode,
        cx.config.max_board_size,
        cx.config.max_placement_attempts,
        &mut rng,
    ) {
        Ok(b) => b,
        Err(e) => {
            cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail(e.to_string())));
            return;
        }
    };

    if mwp.m.mode == MatchMode::Teams {
        let conn_user: std::collections::HashMap<ConnId, UserId> = {
            // derive conn->user by intersecting the room's connections against player list;
            // acceptable because only players (not spectators) hold teams.
            let mut map = std::collections::HashMap::new();
            for (conn_id, _) in &teams {
                if let Ok(Some((uid, _))) = cx.ephemeral.get_conn(*conn_id).await {
                    map.insert(*conn_id, uid);
                }
            }
            map
        };
        let user_team: std::collections::HashMap<UserId, i32> =
            teams.iter().filter_map(|(c, t)| conn_user.get(c).map(|u| (*u, *t))).collect();
        board_gen::apply_team_tags(&mut board, |uid| user_team.get(&uid).copied());
    }

    let board_size = board.size;
    if let Err(e) = cx.repos.matches.update_start_board(match_id, board).await {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::fail(e.to_string())));
        return;
    }

    if let Err(e) = cx.ephemeral.set_turn(match_id, mwp.m.created_by_id).await {
        warn!("start: failed to persist initial turn owner: {e}");
    }

    let mode = match mwp.m.mode {
        MatchMode::Individual => GameMode::Individual,
        MatchMode::Teams => GameMode::Teams,
    };
    cx.events.emit_to_room(match_id, OutboundEvent::TurnChanged { user_id: mwp.m.created_by_id });
    cx.events.emit_to_room(match_id, OutboundEvent::GameStarted { mode, board_size });
    cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::GameStartAck(Ack::ok()));

    for conn_id in cx.events.room_connections(match_id) {
        if let Ok(Some((uid, _))) = cx.ephemeral.get_conn(conn_id).await {
            send_board_view_to(cx, conn_id, uid, match_id).await;
        }
    }

    info!("match {match_id} started with board size {board_size}");
}

pub async fn handle_fire(
    cx: &HandlerCx<'_>,
    ctx: &ConnCtx,
    match_id: MatchId,
    x: u8,
    y: u8,
    shot_type: ShotType,
    extra_targets: &[(u8, u8)],
) {
    let ack_fail = |reason: String| {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::PlayerFireAck(Ack::fail(reason)));
    };

    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else {
        ack_fail("match not found".into());
        return;
    };
    if mwp.m.status != MatchStatus::InProgress {
        ack_fail("match is not in progress".into());
        return;
    }
    let Some(turn_owner) = cx.ephemeral.get_turn(match_id).await.ok().flatten() else {
        ack_fail("no active turn".into());
        return;
    };
    if turn_owner != ctx.user_id {
        ack_fail("it is not your turn".into());
        return;
    }
    let Some(mut board) = mwp.m.board.clone() else {
        ack_fail("match has no board".into());
        return;
    };

    if shot_type == ShotType::Nuclear {
        let available = cx.ephemeral.has_nuclear_available(match_id, ctx.user_id).await.unwrap_or(false);
        let used = cx.ephemeral.has_nuclear_used(match_id, ctx.user_id).await.unwrap_or(true);
        if !available || used {
            ack_fail("nuclear weapon is not available".into());
            return;
        }
    }

    let resolved = match shot_resolver::resolve_shot(&mut board, ctx.user_id, shot_type, (x, y), extra_targets) {
        Ok(r) => r,
        Err(e) => {
            ack_fail(e.to_string());
            return;
        }
    };

    if let Err(e) = cx.repos.matches.update_board(match_id, board.clone()).await {
        warn!("fire: failed to persist board for {match_id}: {e}");
    }
    for rec in &resolved.records {
        let _ = cx
            .repos
            .shots
            .register(match_id, ctx.user_id, rec.shot_type, rec.target, rec.hit, rec.sunk_ship_id)
            .await;
    }

    cx.events.emit_to_room(
        match_id,
        OutboundEvent::PlayerFired { shooter_id: ctx.user_id, x, y, shot_type, hit: resolved.hit, sunk_ship_id: resolved.sunk_ship_id },
    );

    // Elimination is detected and announced once, by `pass_turn` below, which always runs
    // right after a shot and re-reads the just-persisted board.

    if shot_type == ShotType::Simple {
        if resolved.hit {
            let progress = cx.ephemeral.incr_nuclear_progress(match_id, ctx.user_id).await.unwrap_or(0);
            if progress >= cx.config.nuclear_progress_threshold {
                let _ = cx.ephemeral.unlock_nuclear(match_id, ctx.user_id).await;
            }
            let has_nuclear = cx.ephemeral.has_nuclear_available(match_id, ctx.user_id).await.unwrap_or(false);
            let used = cx.ephemeral.has_nuclear_used(match_id, ctx.user_id).await.unwrap_or(false);
            cx.events.emit_to_user(ctx.user_id, OutboundEvent::NuclearStatus { progress, has_nuclear, used });
        } else {
            let _ = cx.ephemeral.reset_nuclear_progress(match_id, ctx.user_id).await;
        }
    }
    if shot_type == ShotType::Nuclear {
        let _ = cx.ephemeral.mark_nuclear_used(match_id, ctx.user_id).await;
    }

    cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::PlayerFireAck(Ack::ok()));

    let _ = cx.ephemeral.clear_turn_timeout_owner(match_id).await;
    orchestrator::pass_turn(match_id, ctx.user_id, cx.repos, cx.ephemeral, cx.events).await;
}

pub async fn handle_leave(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    let _ = cx.repos.players.mark_left(match_id, ctx.user_id).await;
    let _ = cx.ephemeral.delete_conn(ctx.conn_id).await;
    cx.events.unregister(ctx.conn_id);
    cx.events.emit_to_room(match_id, OutboundEvent::PlayerLeft { user_id: ctx.user_id });
    finalize_room_change(cx, match_id, ctx.user_id).await;
}

pub async fn handle_disconnect(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    let _ = cx.ephemeral.delete_conn(ctx.conn_id).await;
    cx.events.unregister(ctx.conn_id);
    cx.events.emit_to_room(match_id, OutboundEvent::PlayerLeft { user_id: ctx.user_id });
    finalize_room_change(cx, match_id, ctx.user_id).await;
}

async fn finalize_room_change(cx: &HandlerCx<'_>, match_id: MatchId, departed_user_id: UserId) {
    if cx.events.room_is_empty(match_id) {
        if let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await {
            let user_ids: Vec<UserId> = mwp.players.iter().map(|p| p.user_id).collect();
            let _ = cx.ephemeral.clear_match(match_id, &user_ids).await;
        }
        if let Err(e) = cx.repos.matches.remove_abandoned(match_id).await {
            warn!("failed to cascade-delete abandoned match {match_id}: {e}");
        }
        cx.events.emit_to_room(match_id, OutboundEvent::GameAbandoned);
        return;
    }

    if let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await {
        if mwp.m.created_by_id == departed_user_id {
            if let Some(next_conn) = cx.events.room_connections(match_id).first().copied() {
                if let Ok(Some((new_creator, _))) = cx.ephemeral.get_conn(next_conn).await {
                    if cx.repos.matches.update_creator(match_id, new_creator).await.is_ok() {
                        cx.events.emit_to_room(match_id, OutboundEvent::CreatorChanged { new_creator_id: new_creator });
                    }
                }
            }
        }
    }
}

pub async fn handle_reconnect(cx: &HandlerCx<'_>, ctx: &ConnCtx) {
    let Ok(Some(match_id)) = cx.ephemeral.get_last_match_by_user(ctx.user_id).await else {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::ReconnectFailed { reason: "no previous match".into() });
        return;
    };
    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::ReconnectFailed { reason: "match not found".into() });
        return;
    };
    if mwp.player(ctx.user_id).is_none() {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::ReconnectFailed { reason: "not a player in that match".into() });
        return;
    }
    if cx.ephemeral.is_abandoned(match_id, ctx.user_id).await.unwrap_or(false) {
        cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::ReconnectFailed { reason: "player is abandoned".into() });
        return;
    }

    reconnect_into_room(cx, ctx, match_id).await;
}

async fn reconnect_into_room(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    bind_connection(cx, ctx, match_id).await;
    cx.events.emit_to_room(match_id, OutboundEvent::PlayerReconnected { user_id: ctx.user_id });
    cx.events.emit_to_connection(ctx.conn_id, OutboundEvent::ReconnectAck(Ack::ok()));
    send_board_view(cx, ctx, match_id).await;
}

async fn send_board_view(cx: &HandlerCx<'_>, ctx: &ConnCtx, match_id: MatchId) {
    send_board_view_to(cx, ctx.conn_id, ctx.user_id, match_id).await;
}

async fn send_board_view_to(cx: &HandlerCx<'_>, conn_id: ConnId, user_id: UserId, match_id: MatchId) {
    let Ok(Some(mwp)) = cx.repos.matches.find_by_id(match_id).await else { return };
    let Some(board) = mwp.m.board.as_ref() else { return };
    let view = board_view::project(board, user_id, mwp.m.mode, &mwp.users);
    cx.events.emit_to_connection(conn_id, OutboundEvent::BoardUpdate(view));
}

/// Maps an internal [`CoreError`] to an `ERROR` event, per §7's propagation policy: handlers
/// never let a raw error cross the actor boundary, every call site that can fail
/// degrades into an event instead.
pub fn emit_error(events: &EventBus, conn_id: ConnId, err: &CoreError) {
    events.emit_to_connection(conn_id, OutboundEvent::Error { code: err.code().into(), message: err.to_string() });
}

pub type HandlerResult = CoreResult<()>;
