//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchHandle, PlayerEvent, PlayerInput, PlayerSlot};
use crate::http::routes::AppError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Match to join, otherwise the player is placed automatically
    pub match_id: Option<Uuid>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if let Some(id) = query.match_id {
        if state.match_registry.get(&id).is_none() {
            return Err(AppError::NotFound(format!("Match {id} not found")));
        }
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, query.match_id, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, match_id: Option<Uuid>, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    let (handle, player) = match state.match_registry.join(match_id) {
        Ok(joined) => joined,
        Err(e) => {
            warn!(error = %e, "Could not place player");
            let _ = send_msg(&mut ws_sink, &ServerMsg::error(e.code(), e.to_string())).await;
            let _ = ws_sink.close().await;
            return;
        }
    };

    info!(match_id = %handle.id, ?player, "New WebSocket connection");

    // subscribe before announcing so the joiner sees its own join
    let snapshot_rx = handle.subscribe();

    let welcome = ServerMsg::Welcome {
        player,
        match_id: handle.id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(match_id = %handle.id, ?player, error = %e, "Failed to send welcome");
        handle.release_slot(player);
        return;
    }

    let joined = PlayerInput {
        player,
        event: PlayerEvent::Joined,
        received_at: unix_millis(),
    };
    if handle.input_tx.send(joined).await.is_err() {
        let _ = send_msg(
            &mut ws_sink,
            &ServerMsg::error("match_closed", "Match is no longer running"),
        )
        .await;
        handle.release_slot(player);
        return;
    }

    let rate_limiter = PlayerRateLimiter::new(state.config.pose_rate_limit);
    run_session(player, &handle, ws_sink, ws_stream, snapshot_rx, rate_limiter).await;

    handle.release_slot(player);
    info!(match_id = %handle.id, ?player, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player: PlayerSlot,
    handle: &MatchHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    rate_limiter: PlayerRateLimiter,
) {
    let match_id = handle.id;
    let input_tx = handle.input_tx.clone();

    // Replies meant for this connection only
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: broadcast + direct messages -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(msg) = direct_rx.recv() => msg,
                result = snapshot_rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            ?player,
                            lagged_count = n,
                            "Client lagged, skipping {} messages", n
                        );
                        // Continue - don't disconnect for lag
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(?player, "Match channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(?player, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(%match_id, ?player, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                match client_msg {
                    ClientMsg::Ping { t } => {
                        let _ = direct_tx.send(ServerMsg::Pong { t }).await;
                        continue;
                    }
                    ClientMsg::Pose { .. } | ClientMsg::Landmarks { .. }
                        if !rate_limiter.check_pose() =>
                    {
                        warn!(%match_id, ?player, "Rate limited pose message");
                        continue;
                    }
                    _ => {}
                }

                let leaving = matches!(client_msg, ClientMsg::LeaveMatch);
                let input = PlayerInput {
                    player,
                    event: PlayerEvent::Message(client_msg),
                    received_at: unix_millis(),
                };

                if input_tx.send(input).await.is_err() {
                    debug!(%match_id, ?player, "Input channel closed");
                    break;
                }
                if leaving {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(%match_id, ?player, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(%match_id, ?player, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(%match_id, ?player, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to match loop
    let _ = input_tx
        .send(PlayerInput {
            player,
            event: PlayerEvent::Left,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
