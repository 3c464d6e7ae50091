use log::{debug, info, warn};
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tungstenite::{Error, Message, WebSocket, accept};

use crate::live::{FeedMessage, LiveFeed};

fn lock(feed: &Mutex<LiveFeed>) -> MutexGuard<'_, LiveFeed> {
    feed.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn websocket_thread(server: TcpListener, feed: Arc<Mutex<LiveFeed>>, update_rate: Duration) {
    for stream in server.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Connection error: {}", e);
                continue;
            }
        };

        let feed = Arc::clone(&feed);
        thread::spawn(move || {
            let mut websocket = match accept(stream) {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error: {}", e);
                    return;
                }
            };

            info!("New WebSocket client connected");
            serve_client(&mut websocket, &feed, update_rate);
            info!("WebSocket client disconnected");
        });
    }
}

fn serve_client(websocket: &mut WebSocket<TcpStream>, feed: &Mutex<LiveFeed>, update_rate: Duration) {
    // reads wait at most one update period, so an idle feed still notices a gone client
    let pace = update_rate.max(Duration::from_millis(1));
    if let Err(e) = websocket.get_ref().set_read_timeout(Some(pace)) {
        warn!("WebSocket setup error: {}", e);
        return;
    }

    // whole window first, then only what arrived since
    let (json, mut next_seq) = {
        let feed = lock(feed);
        (serde_json::to_string(&feed.window_message()), feed.next_seq())
    };
    if !send_json(websocket, json) {
        return;
    }

    loop {
        if !poll_client(websocket) {
            return;
        }

        let json = {
            let feed = lock(feed);
            let points = feed.since(next_seq);
            next_seq = feed.next_seq();
            if points.is_empty() {
                continue;
            }
            serde_json::to_string(&FeedMessage::Points { points })
        };

        if !send_json(websocket, json) {
            return;
        }
    }
}

/// Waits up to the read timeout for a client frame. Pings are answered by
/// tungstenite itself; returns false once the client is gone.
fn poll_client(websocket: &mut WebSocket<TcpStream>) -> bool {
    match websocket.read() {
        Ok(Message::Close(_)) => {
            // best effort, the client may already be gone
            let _ = websocket.flush();
            false
        }
        Ok(_) => true,
        Err(Error::Io(e)) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => true,
        Err(e) => {
            debug!("WebSocket read: {}", e);
            false
        }
    }
}

fn send_json(websocket: &mut WebSocket<TcpStream>, json: serde_json::Result<String>) -> bool {
    match json {
        Ok(json) => websocket.send(Message::Text(json)).is_ok(),
        Err(e) => {
            warn!("JSON serialization error: {}", e);
            true
        }
    }
}
