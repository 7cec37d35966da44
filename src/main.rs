//! Brick Rally entry point
//!
//! Runs the room server against a JSON-lines harness on stdin/stdout so the
//! simulation can be play-tested without a network transport. One command
//! per input line:
//!
//! ```text
//! {"op":"configure","room":"r1","config":{"variant":"duel","winningScore":3}}
//! {"op":"join","room":"r1","token":"alice"}
//! {"op":"send","room":"r1","user":"alice","message":{"type":1,"direction":{"x":1,"y":0}}}
//! {"op":"leave","room":"r1","user":"alice"}
//! ```
//!
//! Every transport operation is written to stdout as one JSON line. Logs go
//! to stderr (`RUST_LOG=debug` for detail).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use brick_rally::Settings;
use brick_rally::gateway::local::{ChannelTransport, DevTokenVerifier, LoggingLobby, Outbound};
use brick_rally::gateway::Gateway;
use brick_rally::lobby::InitialConfig;
use brick_rally::server::Server;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Command {
    Configure {
        room: String,
        #[serde(default)]
        config: InitialConfig,
    },
    Join {
        room: String,
        token: String,
    },
    Send {
        room: String,
        user: String,
        message: Value,
    },
    Leave {
        room: String,
        user: String,
    },
}

fn handle_line(gateway: &Gateway, line: &str) {
    let command: Command = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(e) => {
            log::warn!("Ignoring bad command: {}", e);
            return;
        }
    };
    match command {
        Command::Configure { room, config } => {
            if let Err(e) = gateway.configure_room(&room, &config) {
                log::warn!("{}", e);
            }
        }
        Command::Join { room, token } => {
            let Some(user) = gateway.authenticate(&token) else {
                log::warn!("Rejected token for room {}", room);
                return;
            };
            if let Ok(seat) = gateway.subscribe_user(&room, &user) {
                log::info!("{} joined {} in seat {}", user, room, seat);
            }
        }
        Command::Send {
            room,
            user,
            message,
        } => match serde_json::to_vec(&message) {
            Ok(data) => gateway.on_message(&room, &user, &data),
            Err(e) => log::warn!("Ignoring unencodable message: {}", e),
        },
        Command::Leave { room, user } => {
            gateway.unsubscribe_user(&room, &user);
        }
    }
}

fn render(op: Outbound) -> Value {
    fn payload(data: &[u8]) -> Value {
        serde_json::from_slice(data).unwrap_or(Value::Null)
    }
    match op {
        Outbound::Send {
            room_id,
            user_id,
            data,
        } => json!({ "op": "send", "room": room_id, "user": user_id, "message": payload(&data) }),
        Outbound::Broadcast { room_id, data } => {
            json!({ "op": "broadcast", "room": room_id, "message": payload(&data) })
        }
        Outbound::Close { room_id, user_id } => {
            json!({ "op": "close", "room": room_id, "user": user_id })
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    log::info!("Brick Rally starting...");

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    let (transport, mut outbound) = ChannelTransport::channel();
    let server = Server::start(
        settings,
        Arc::new(DevTokenVerifier),
        Arc::new(transport),
        Arc::new(LoggingLobby::default()),
    );
    let gateway = server.gateway().clone();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(op) = outbound.recv().await {
            let mut line = render(op).to_string();
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                log::error!("stdout closed: {}", e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => handle_line(&gateway, &line),
            Ok(None) => break,
            Err(e) => {
                log::error!("stdin error: {}", e);
                break;
            }
        }
    }

    log::info!("Input closed, shutting down");
    drop(gateway);
    server.shutdown().await;
    if let Err(e) = writer.await {
        log::debug!("Writer task ended abnormally: {}", e);
    }
}
