use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::{
    app_state::AppState, models::identity::Identity, models::websocket::ServerEvent,
    websocket::session::Session,
};

/// Upgrades an authenticated request. The auth middleware has already
/// rejected bad tokens with 401, so the upgrade only happens for a
/// resolved identity.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state, identity))
}

async fn handle_websocket(socket: WebSocket, state: AppState, identity: Identity) {
    let ping_every = state.config.heartbeat_interval;
    let idle_timeout = state.config.heartbeat_timeout;

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();

    // outgoing events and heartbeat pings
    let mut outgoing_task = tokio::spawn(async move {
        let mut pings = interval(ping_every);
        pings.set_missed_tick_behavior(MissedTickBehavior::Delay);
        pings.tick().await;
        loop {
            let frame = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            tracing::warn!(error = %e, "could not serialize outgoing event");
                            continue;
                        }
                    },
                    None => break,
                },
                _ = pings.tick() => Message::Ping(Default::default()),
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let session = Session::open(state, identity, tx).await;
    let mut last_seen = Instant::now();
    let mut idle_check = interval(idle_check_period(idle_timeout));

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    session.handle_text(text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(connection = %session.connection(), "client closed connection");
                    break;
                }
                Some(Ok(_)) => last_seen = Instant::now(),
                Some(Err(e)) => {
                    tracing::debug!(connection = %session.connection(), error = %e, "websocket receive failed");
                    break;
                }
            },
            _ = idle_check.tick() => {
                if last_seen.elapsed() >= idle_timeout {
                    tracing::info!(
                        connection = %session.connection(),
                        user = %session.identity().user_id,
                        "heartbeat timeout"
                    );
                    break;
                }
            }
            _ = &mut outgoing_task => break,
        }
    }

    session.close().await;
    outgoing_task.abort();
}

fn idle_check_period(timeout: Duration) -> Duration {
    (timeout / 4).max(Duration::from_secs(1))
}
