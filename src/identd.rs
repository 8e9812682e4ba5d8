//! Minimal ident (RFC 1413) responder.
//!
//! Some networks look up the connecting username over ident before letting
//! a connection register. We answer every well-formed query with the
//! username of the most recently opened connection, which is the one the
//! lookup is about in practice.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Default)]
pub struct IdentRegistry {
    current: Arc<Mutex<Option<String>>>,
}

impl IdentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, username: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(username.to_string());
        }
    }

    /// Build the reply line for one query line ("lport , rport").
    pub fn respond(&self, query: &str) -> String {
        let mut ports = query.trim().split(',').map(str::trim);
        let lport: u16 = ports.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let rport: u16 = ports.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        if lport == 0 || rport == 0 {
            return format!("{lport}, {rport} : ERROR : INVALID-PORT");
        }
        let user = self.current.lock().ok().and_then(|c| c.clone());
        match user {
            Some(user) => format!("{lport}, {rport} : USERID : UNIX : {user}"),
            None => format!("{lport}, {rport} : ERROR : NO-USER"),
        }
    }
}

pub async fn run(bind: String, registry: IdentRegistry) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "identd listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "ident query");
        let registry = registry.clone();
        tokio::spawn(async move {
            let _ = serve(stream, registry).await;
        });
    }
}

async fn serve(stream: TcpStream, registry: IdentRegistry) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    if let Some(line) = lines.next_line().await? {
        let reply = registry.respond(&line);
        write.write_all(reply.as_bytes()).await?;
        write.write_all(b"\r\n").await?;
    }
    Ok(())
}
