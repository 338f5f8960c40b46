//! Discord local IPC transport.
//!
//! The desktop client listens on `discord-ipc-{0..9}`: a Unix socket in the
//! runtime/temp directory, or a named pipe on Windows. We try each slot in
//! order and keep the first one that answers the handshake.

use std::io::{Read, Write};
use std::path::PathBuf;

use serde_json::{json, Value};

use super::activity::Activity;
use super::ipc::{read_frame, write_frame, Opcode};
use super::{PresenceConnection, PresenceConnector, PresenceError};

const IPC_SLOTS: u8 = 10;
const SET_ACTIVITY: &str = "SET_ACTIVITY";

/// Anything we can speak the frame protocol over
pub trait IpcStream: Read + Write {}
impl<T: Read + Write> IpcStream for T {}

pub struct DiscordIpc {
    client_id: String,
}

impl DiscordIpc {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
        }
    }
}

impl PresenceConnector for DiscordIpc {
    type Connection = IpcConnection;

    fn connect(&self) -> Result<IpcConnection, PresenceError> {
        for path in endpoint_candidates() {
            match open_endpoint(&path) {
                Ok(stream) => {
                    tracing::debug!("[Presence] Found IPC endpoint {}", path.display());
                    return IpcConnection::handshake(stream, &self.client_id);
                }
                Err(_) => continue,
            }
        }
        Err(PresenceError::NoEndpoint)
    }
}

/// Directories that may hold the IPC socket, in lookup order
#[cfg(unix)]
fn socket_dirs(lookup: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for var in ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"] {
        if let Some(dir) = lookup(var).filter(|d| !d.is_empty()) {
            let dir = PathBuf::from(dir);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    let fallback = PathBuf::from("/tmp");
    if !dirs.contains(&fallback) {
        dirs.push(fallback);
    }
    dirs
}

#[cfg(unix)]
fn endpoint_candidates() -> Vec<PathBuf> {
    socket_dirs(|var| std::env::var(var).ok())
        .into_iter()
        .flat_map(|dir| (0..IPC_SLOTS).map(move |slot| dir.join(format!("discord-ipc-{slot}"))))
        .collect()
}

#[cfg(windows)]
fn endpoint_candidates() -> Vec<PathBuf> {
    (0..IPC_SLOTS)
        .map(|slot| PathBuf::from(format!(r"\\.\pipe\discord-ipc-{slot}")))
        .collect()
}

#[cfg(unix)]
fn open_endpoint(path: &std::path::Path) -> std::io::Result<Box<dyn IpcStream>> {
    let stream = std::os::unix::net::UnixStream::connect(path)?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
fn open_endpoint(path: &std::path::Path) -> std::io::Result<Box<dyn IpcStream>> {
    let pipe = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
    Ok(Box::new(pipe))
}

fn rejection(payload: &Value) -> PresenceError {
    // CLOSE frames carry code/message at the top level, ERROR events under `data`
    let source = if payload.get("data").is_some() { &payload["data"] } else { payload };
    PresenceError::Rejected {
        code: source["code"].as_i64().unwrap_or_default(),
        message: source["message"].as_str().unwrap_or("unknown").to_string(),
    }
}

/// An open, handshaken IPC session
pub struct IpcConnection {
    stream: Box<dyn IpcStream>,
    pid: u32,
}

impl IpcConnection {
    pub fn handshake(mut stream: Box<dyn IpcStream>, client_id: &str) -> Result<Self, PresenceError> {
        write_frame(&mut stream, Opcode::Handshake, &json!({ "v": 1, "client_id": client_id }))?;

        let (opcode, payload) = read_frame(&mut stream)?;
        match opcode {
            Opcode::Frame if payload["evt"] == "READY" => Ok(Self {
                stream,
                pid: std::process::id(),
            }),
            Opcode::Close => Err(rejection(&payload)),
            other => Err(PresenceError::Protocol(format!(
                "unexpected handshake reply {:?}",
                other
            ))),
        }
    }
}

impl PresenceConnection for IpcConnection {
    fn set_activity(&mut self, activity: &Activity) -> Result<(), PresenceError> {
        let request = json!({
            "cmd": SET_ACTIVITY,
            "args": { "pid": self.pid, "activity": activity },
            "nonce": uuid::Uuid::new_v4().to_string(),
        });
        write_frame(&mut self.stream, Opcode::Frame, &request)?;

        loop {
            let (opcode, payload) = read_frame(&mut self.stream)?;
            match opcode {
                Opcode::Ping => write_frame(&mut self.stream, Opcode::Pong, &payload)?,
                Opcode::Close => {
                    let message = payload["message"].as_str().unwrap_or("closed by peer");
                    return Err(PresenceError::ConnectionClosed(message.to_string()));
                }
                Opcode::Frame if payload["evt"] == "ERROR" => return Err(rejection(&payload)),
                Opcode::Frame if payload["cmd"] == SET_ACTIVITY => return Ok(()),
                // Unrelated dispatches, keep waiting for our reply
                Opcode::Frame | Opcode::Pong => continue,
                Opcode::Handshake => {
                    return Err(PresenceError::Protocol("handshake opcode after READY".to_string()))
                }
            }
        }
    }

    fn close(mut self) -> Result<(), PresenceError> {
        write_frame(&mut self.stream, Opcode::Close, &json!({}))
    }
}
