use crate::client::event::{ClientEvent, NetworkId};
use anyhow::Result;
use futures::StreamExt;
use irc::client::prelude::*;
use tokio::sync::mpsc;

pub struct IrcConnection {
    pub network_id: NetworkId,
    pub sender: irc::client::Sender,
}

#[allow(clippy::too_many_arguments)]
pub async fn spawn_connection(
    network_id: NetworkId,
    host: String,
    port: u16,
    tls: bool,
    nickname: String,
    username: String,
    realname: String,
    password: Option<String>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
) -> Result<IrcConnection> {
    let config = Config {
        server: Some(host),
        port: Some(port),
        use_tls: Some(tls),
        nickname: Some(nickname),
        username: Some(username),
        realname: Some(realname),
        password,
        ..Config::default()
    };

    let mut client = Client::from_config(config).await?;
    let sender = client.sender();
    // Take the stream before identifying so nothing the server sends during
    // registration is lost.
    let mut stream = client.stream()?;
    client.identify()?;

    let event_tx_clone = event_tx.clone();
    let _ = event_tx.send(ClientEvent::Connected {
        network: network_id,
    });

    tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(message) => {
                    if event_tx_clone
                        .send(ClientEvent::Irc {
                            network: network_id,
                            message,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    let _ = event_tx_clone.send(ClientEvent::Disconnected {
                        network: network_id,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
        let _ = event_tx_clone.send(ClientEvent::Disconnected {
            network: network_id,
            reason: String::new(),
        });
    });

    Ok(IrcConnection { network_id, sender })
}
