//! Network services for atc24-relay
//!
//!  Subscriber fanout over WebSocket plus the HTTP polling endpoints.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::protocol::Update;
use crate::roster::{self, SharedStore};
use crate::upstream::FeedHandle;

pub async fn run_servers(
    config: Config,
    store: SharedStore,
    feed: FeedHandle,
    updates: broadcast::Sender<Update>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fanout_listener = TcpListener::bind(format!("0.0.0.0:{}", config.ws_port)).await?;
    info!("Fanout server listening on port {}", config.ws_port);

    let http_listener = TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    info!("HTTP server listening on port {}", config.http_port);

    let fanout_handle = {
        let store = Arc::clone(&store);
        let tx = updates.clone();
        tokio::spawn(async move {
            run_fanout_server(fanout_listener, store, tx).await;
        })
    };

    let http_handle = {
        let store = Arc::clone(&store);
        let feed = feed.clone();
        let demo = config.demo;
        tokio::spawn(async move {
            run_http_server(http_listener, store, feed, demo).await;
        })
    };

    tokio::select! {
        _ = fanout_handle => {}
        _ = http_handle => {}
    }

    Ok(())
}

async fn run_fanout_server(
    listener: TcpListener,
    store: SharedStore,
    tx: broadcast::Sender<Update>,
) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Fanout accept error: {}", e);
                continue;
            }
        };
        debug!("Subscriber connected: {}", addr);

        let store = Arc::clone(&store);
        let rx = tx.subscribe();

        tokio::spawn(async move {
            if let Err(e) = serve_subscriber(socket, store, rx).await {
                debug!("Subscriber error: {}", e);
            }
            debug!("Subscriber disconnected: {}", addr);
        });
    }
}

/// One subscriber connection: a full roster snapshot on join, then
/// incremental updates until the socket closes or a send fails. A dead
/// subscriber only ends its own task.
async fn serve_subscriber(
    socket: TcpStream,
    store: SharedStore,
    mut rx: broadcast::Receiver<Update>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws = accept_async(socket).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    // subscribers never request an initial sync, they get one on join
    let snapshot = Update::Aircraft(store.read().all());
    ws_tx
        .send(Message::text(serde_json::to_string(&snapshot)?))
        .await?;

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => {
                    let json = serde_json::to_string(&update)?;
                    if ws_tx.send(Message::text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Subscriber lagging, skipped {} updates", skipped);
                    continue;
                }
                Err(_) => break,
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Ping(payload))) => {
                    if ws_tx.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // the hop is push-only, inbound payloads are ignored
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    Ok(())
}

async fn run_http_server(listener: TcpListener, store: SharedStore, feed: FeedHandle, demo: bool) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("HTTP accept error: {}", e);
                continue;
            }
        };
        debug!("HTTP client connected: {}", addr);

        let store = Arc::clone(&store);
        let feed = feed.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_http_request(socket, store, feed, demo).await {
                debug!("HTTP error: {}", e);
            }
        });
    }
}

async fn handle_http_request(
    mut socket: TcpStream,
    store: SharedStore,
    feed: FeedHandle,
    demo: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buffer = vec![0u8; 8192];
    let n = socket.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();

    if parts.len() < 2 {
        return Ok(());
    }

    let url = parts[1];

    let http_version = if first_line.contains("HTTP/1.1") { 11 } else { 10 };

    let keepalive = if http_version == 10 {
        request.to_lowercase().contains("connection: keep-alive")
    } else {
        !request.to_lowercase().contains("connection: close")
    };

    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let (status, body) = route_request(path, query, &store, &feed, demo)?;

    let header = format!(
        "HTTP/1.1 {}\r\n\
         Server: atc24-relay\r\n\
         Content-Type: application/json;charset=utf-8\r\n\
         Connection: {}\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         \r\n",
        status,
        if keepalive { "keep-alive" } else { "close" },
        body.len()
    );

    socket.write_all(header.as_bytes()).await?;
    socket.write_all(body.as_bytes()).await?;

    Ok(())
}

/// Map a path to a status line and JSON body. Lookup misses become 404
/// here rather than errors.
fn route_request(
    path: &str,
    query: &str,
    store: &SharedStore,
    feed: &FeedHandle,
    demo: bool,
) -> Result<(&'static str, String), serde_json::Error> {
    if path == "/api/aircraft" {
        let mut aircraft = store.read().all();
        if aircraft.is_empty() || demo || query_flag(query, "demo") {
            aircraft = roster::demo_roster();
        }
        return Ok(("200 OK", serde_json::to_string(&aircraft)?));
    }

    if let Some(callsign) = path.strip_prefix("/api/aircraft/") {
        return match store.read().get(callsign) {
            Some(aircraft) => Ok(("200 OK", serde_json::to_string(&aircraft)?)),
            None => Ok((
                "404 Not Found",
                r#"{"message":"Aircraft not found"}"#.to_string(),
            )),
        };
    }

    match path {
        "/api/controllers" => {
            let controllers = store.read().controllers();
            Ok(("200 OK", serde_json::to_string(&controllers)?))
        }
        "/api/status" => {
            let (aircraft_count, controller_count) = {
                let store = store.read();
                (store.len(), store.controller_count())
            };
            let status = serde_json::json!({
                "connected": feed.is_connected(),
                "aircraftCount": aircraft_count,
                "controllersCount": controller_count,
                "lastUpdate": roster::epoch_millis(),
            });
            Ok(("200 OK", status.to_string()))
        }
        _ => Ok(("404 Not Found", r#"{"message":"Not found"}"#.to_string())),
    }
}

fn query_flag(query: &str, name: &str) -> bool {
    query
        .split('&')
        .any(|pair| pair == format!("{}=true", name))
}
