//! Per-connection task: decode inbound frames into the gateway, write
//! queued events back out.

use std::sync::Arc;

use pighouse_protocol::{ClientMessage, Codec, PlayerId};
use pighouse_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::PighouseError;
use crate::server::ServerState;

/// Drop guard that tells the gateway the connection is gone.
///
/// `Drop` is synchronous, so the locked call runs on a spawned task.
struct ConnectionGuard<C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.gateway.lock().await.disconnect(player_id);
        });
    }
}

/// Handles a single connection from accept to close.
///
/// The gateway lock is held only while an intent is processed; sending
/// happens after it is released.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PighouseError> {
    let conn_id = conn.id();
    let player_id = PlayerId(conn_id.into_inner());
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.gateway.lock().await.connect(player_id, tx)?;
    let _guard = ConnectionGuard {
        player_id,
        state: Arc::clone(&state),
    };
    tracing::debug!(%conn_id, %player_id, peer = %conn.peer_addr(), "client connected");

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::debug!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                };
                let decoded = state.codec.decode::<ClientMessage>(&data);
                let mut gateway = state.gateway.lock().await;
                match decoded {
                    Ok(msg) => gateway.handle(player_id, msg),
                    Err(e) => gateway.reject_frame(player_id, &e),
                }
            }
            outbound = rx.recv() => {
                let Some(msg) = outbound else {
                    tracing::debug!(%player_id, "outbound closed by server");
                    break;
                };
                let bytes = state.codec.encode(&msg)?;
                conn.send(&bytes).await?;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%player_id, error = %e, "close failed");
    }
    Ok(())
}
