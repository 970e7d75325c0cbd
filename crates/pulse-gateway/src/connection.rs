use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use pulse_db::Database;
use pulse_types::events::{GatewayCommand, PartnerEvent};

use crate::registry::PartnerRegistry;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single WebSocket connection: Identify handshake, then a Ready
/// event and the forward loop. The connection only receives; every business
/// mutation goes through the REST API. The socket exists so the partner's
/// events arrive in realtime.
pub async fn handle_connection(
    socket: WebSocket,
    registry: PartnerRegistry,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    // Step 2: Resolve the user and their couple
    let user = {
        let db = db.clone();
        let uid = user_id.to_string();
        match tokio::task::spawn_blocking(move || db.get_user_by_id(&uid)).await {
            Ok(Ok(Some(user))) => user,
            Ok(Ok(None)) => {
                warn!("WebSocket identify for unknown user {}", user_id);
                return;
            }
            Ok(Err(e)) => {
                warn!("WebSocket user lookup failed for {}: {}", user_id, e);
                return;
            }
            Err(e) => {
                warn!("spawn_blocking join error: {}", e);
                return;
            }
        }
    };
    let couple_id = user
        .couple_id
        .as_deref()
        .and_then(|id| id.parse::<Uuid>().ok());

    info!("{} ({}) connected to gateway", user.name, user_id);

    // Step 3: Send Ready event
    let ready = PartnerEvent::Ready {
        user_id,
        name: user.name.clone(),
    };
    match serde_json::to_string(&ready) {
        Ok(text) => {
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        Err(_) => return,
    }

    // Step 4: Register and forward partner events until either side drops
    let (conn_id, mut events_rx) = registry.connect(user_id, couple_id).await;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward partner events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = events_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize partner event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Drain client frames: pongs feed the heartbeat, everything else is noise
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.disconnect(user_id, conn_id).await;
    info!("{} ({}) disconnected from gateway", user.name, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Uuid> {
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use pulse_types::api::Claims;

    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
