use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use pedlar_gateway::{ChannelSubscriber, Subscriber};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::presentation::rest::AppState;
use crate::proxy::Connect;
use crate::relay::TickView;

/// GET /ws/ticker - pushes `{"bid": .., "ask": ..}` on every tick
pub async fn ws_ticker<C: Connect>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<C>>>,
) -> Response {
    // Subscribe before the upgrade so no tick after the handshake is missed
    let ticks = state.ticks.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, ticks))
}

async fn handle_socket(socket: WebSocket, mut ticks: ChannelSubscriber<TickView>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("Ticker session opened");

    loop {
        tokio::select! {
            tick = ticks.next() => {
                let Ok(tick) = tick else {
                    debug!("Tick stream closed");
                    break;
                };
                let json = match serde_json::to_string(&tick) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode tick: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Clients have nothing to say on this stream
                Some(Ok(_)) => {}
            }
        }
    }

    debug!("Ticker session closed");
}
