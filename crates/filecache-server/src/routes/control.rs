use crate::state::SharedState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::{debug, info, warn};

/// GET /control
/// Upgrades to a WebSocket carrying JSON-RPC control calls.
pub async fn upgrade(State(state): State<SharedState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve(state, socket))
}

/// Answer requests one at a time until the peer goes away
async fn serve(state: SharedState, mut socket: WebSocket) {
    info!("Control client connected");

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "Control socket error");
                break;
            }
        };

        let reply = state.control.dispatch(text.as_str()).await;
        if let Err(e) = socket.send(Message::Text(reply.into())).await {
            debug!(error = %e, "Control client went away before the reply");
            break;
        }
    }

    info!("Control client disconnected");
}
