//! The session gateway of §1/§6.2.1: terminates the WebSocket upgrade, decodes/encodes JSON
//! frames, and forwards each inbound message to the right match actor's command queue.
//! Authentication itself is out of scope (§1) — the identity arrives as connection metadata,
//! here modeled as query parameters set by whatever terminates auth in front of this process.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use battleship_core_common::messages::{InboundMessage, OutboundEvent};
use battleship_core_common::{ConnId, MatchId, UserId};
use futures::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::sync::mpsc;

use crate::handlers::ConnCtx;
use crate::match_actor::{Command, Shared};
use crate::registry::MatchRegistry;

pub struct GatewayState {
    pub shared: Arc<Shared>,
    pub registry: Arc<MatchRegistry>,
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

#[derive(Debug, serde::Deserialize)]
struct Identity {
    user_id: UserId,
    nickname: String,
    #[serde(default = "default_color")]
    color: String,
}

fn default_color() -> String {
    "#ffffff".to_string()
}

async fn ws_handler(ws: WebSocketUpgrade, Query(identity): Query<Identity>, State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

async fn handle_socket(socket: WebSocket, identity: Identity, state: Arc<GatewayState>) {
    let conn_id = ConnId::new_v4();
    let ctx = ConnCtx { conn_id, user_id: identity.user_id, nickname: identity.nickname, color: identity.color };
    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<OutboundEvent>();

    // The connection isn't bound to a room (and therefore not in the `EventBus`) until the
    // first `PLAYER_JOIN`/reconnect succeeds; until then it can only send and receive directly.
    let mut bound_match = try_reconnect(&state, &ctx, &outbox_tx).await;

    let heartbeat_tx = outbox_tx.clone();
    let heartbeat_interval = state.shared.config.heartbeat_interval;
    let heartbeat_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        loop {
            ticker.tick().await;
            if heartbeat_tx.send(OutboundEvent::Heartbeat).is_err() {
                break;
            }
        }
    });

    let writer_task = tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else { continue };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };

        let inbound: InboundMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                debug!("conn {conn_id} sent malformed frame: {e}");
                let _ = outbox_tx.send(OutboundEvent::Error { code: "BAD_REQUEST".into(), message: e.to_string() });
                continue;
            }
        };

        route_inbound(&state, &ctx, conn_id, &outbox_tx, &mut bound_match, inbound).await;
    }

    heartbeat_task.abort();
    writer_task.abort();

    state.shared.events.unregister(conn_id);
    let _ = state.shared.ephemeral.delete_conn(conn_id).await;
    if let Some(match_id) = bound_match {
        if let Some(handle) = state.registry.get(match_id) {
            handle.send(Command::Disconnect { ctx: ctx.clone() });
        }
    }
    info!("connection {conn_id} closed");
}

async fn route_inbound(
    state: &Arc<GatewayState>,
    ctx: &ConnCtx,
    conn_id: ConnId,
    outbox_tx: &mpsc::UnboundedSender<OutboundEvent>,
    bound_match: &mut Option<MatchId>,
    inbound: InboundMessage,
) {
    let match_id = match &inbound {
        InboundMessage::PlayerJoin { match_id, .. }
        | InboundMessage::PlayerReady { match_id }
        | InboundMessage::PlayerChooseTeam { match_id, .. }
        | InboundMessage::PlayerLeave { match_id }
        | InboundMessage::CreatorTransfer { match_id, .. }
        | InboundMessage::GameStart { match_id }
        | InboundMessage::PlayerFire { match_id, .. } => *match_id,
    };

    if matches!(inbound, InboundMessage::PlayerJoin { .. }) && bound_match.is_none() {
        state.shared.events.register(conn_id, ctx.user_id, match_id, outbox_tx.clone());
        *bound_match = Some(match_id);
    }

    let Some(handle) = state.registry.get_or_spawn(match_id, &state.shared) else {
        let _ = outbox_tx.send(OutboundEvent::JoinDenied { reason: "match not found".into() });
        return;
    };

    let cmd = match inbound {
        InboundMessage::PlayerJoin { role, .. } => Command::Join { ctx: ctx.clone(), role },
        InboundMessage::PlayerReady { .. } => Command::Ready { ctx: ctx.clone() },
        InboundMessage::PlayerChooseTeam { team, .. } => Command::ChooseTeam { ctx: ctx.clone(), team },
        InboundMessage::PlayerLeave { .. } => Command::Leave { ctx: ctx.clone() },
        InboundMessage::CreatorTransfer { target_user_id, .. } => Command::CreatorTransfer { ctx: ctx.clone(), target_user_id },
        InboundMessage::GameStart { .. } => Command::Start { ctx: ctx.clone() },
        InboundMessage::PlayerFire { x, y, shot_type, extra_targets, .. } => {
            Command::Fire { ctx: ctx.clone(), x, y, shot_type, extra_targets }
        }
    };
    handle.send(cmd);
}

/// Runs on connect, before the socket loop ever sees a frame: if the user has a live match
/// from a previous session, rejoin it and replay board state, per §4.8 "Connect".
async fn try_reconnect(state: &Arc<GatewayState>, ctx: &ConnCtx, outbox_tx: &mpsc::UnboundedSender<OutboundEvent>) -> Option<MatchId> {
    let last_match = state.shared.ephemeral.get_last_match_by_user(ctx.user_id).await.ok().flatten()?;
    let handle = state.registry.get_or_spawn(last_match, &state.shared)?;
    state.shared.events.register(ctx.conn_id, ctx.user_id, last_match, outbox_tx.clone());
    handle.send(Command::Reconnect { ctx: ctx.clone() });
    Some(last_match)
}
