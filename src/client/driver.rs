//! Session driver task.
//!
//! Owns everything stateful about one session's I/O: the live connections,
//! the timers, and the config store handle. Events arrive on a single
//! channel and are folded into the session one at a time; the actions each
//! fold returns are performed here. Nothing else ever touches the session.

use super::event::{Action, ClientEvent, NetworkId};
use super::{handler, Client};
use crate::config::{ConfigStore, UserPatch};
use crate::identd::IdentRegistry;
use crate::irc::connection::spawn_connection;
use crate::irc::manager::IrcManager;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub async fn run(
    mut client: Client,
    mut rx: mpsc::UnboundedReceiver<ClientEvent>,
    tx: mpsc::UnboundedSender<ClientEvent>,
    store: ConfigStore,
    ident: IdentRegistry,
) {
    let mut connections = IrcManager::new();
    tracing::info!(user = %client.name, "session started");

    while let Some(event) = rx.recv().await {
        let event = match event {
            // Password changes write through the store, which the pure
            // handlers never touch.
            ClientEvent::SetPassword { hash } => {
                client.set_password(&store, &hash);
                continue;
            }
            other => other,
        };
        let quitting = matches!(event, ClientEvent::Quit);
        let actions = handler::handle_event(&mut client, event);
        for action in actions {
            perform(&mut client, &mut connections, &store, &ident, &tx, action).await;
        }
        if quitting {
            break;
        }
    }
    tracing::info!(user = %client.name, "session ended");
}

async fn perform(
    client: &mut Client,
    connections: &mut IrcManager,
    store: &ConfigStore,
    ident: &IdentRegistry,
    tx: &mpsc::UnboundedSender<ClientEvent>,
    action: Action,
) {
    match action {
        Action::OpenConnection { network } => {
            let Some(ni) = client.network_index(network) else {
                return;
            };
            let n = &client.networks[ni];
            ident.register(&n.username);
            let result = spawn_connection(
                network,
                n.host.clone(),
                n.port,
                n.tls,
                n.nick.clone(),
                n.username.clone(),
                n.realname.clone(),
                n.password.clone(),
                tx.clone(),
            )
            .await;
            match result {
                Ok(conn) => connections.insert(conn),
                Err(e) => {
                    let _ = tx.send(ClientEvent::ConnectionFailed {
                        network,
                        error: e.to_string(),
                    });
                }
            }
        }

        Action::SendPrivmsg {
            network,
            target,
            text,
        } => report(client, network, connections.send_privmsg(network, &target, &text)),
        Action::SendAction {
            network,
            target,
            text,
        } => report(client, network, connections.send_action(network, &target, &text)),
        Action::SendNotice {
            network,
            target,
            text,
        } => report(client, network, connections.send_notice(network, &target, &text)),
        Action::SendJoin { network, channels } => {
            report(client, network, connections.send_join(network, &channels))
        }
        Action::SendPart {
            network,
            channel,
            reason,
        } => report(
            client,
            network,
            connections.send_part(network, &channel, reason.as_deref()),
        ),
        Action::SendNick { network, nick } => {
            report(client, network, connections.send_nick(network, &nick))
        }
        Action::SendTopic {
            network,
            channel,
            text,
        } => report(client, network, connections.send_topic(network, &channel, &text)),
        Action::SendKick {
            network,
            channel,
            user,
        } => report(client, network, connections.send_kick(network, &channel, &user)),
        Action::SendInvite {
            network,
            nick,
            channel,
        } => report(client, network, connections.send_invite(network, &nick, &channel)),
        Action::SendWhois { network, nick } => {
            report(client, network, connections.send_whois(network, &nick))
        }
        Action::SendMode {
            network,
            target,
            modes,
        } => report(client, network, connections.send_mode(network, &target, &modes)),
        Action::SendNames { network, channel } => {
            report(client, network, connections.send_names(network, &channel))
        }
        Action::SendRaw { network, line } => {
            report(client, network, connections.send_raw(network, &line))
        }
        Action::SendPing { network, token } => {
            report(client, network, connections.send_ping(network, &token))
        }

        Action::QuitNetwork { network, message } => {
            connections.quit(network, message.as_deref());
        }
        Action::CloseConnection { network } => connections.close(network),

        Action::ScheduleCommand {
            network,
            delay,
            text,
        } => {
            let tx = tx.clone();
            tokio::spawn(async move {
                sleep(delay).await;
                let _ = tx.send(ClientEvent::CommandDue { network, text });
            });
        }
        Action::ScheduleProbe { network, delay } => {
            let tx = tx.clone();
            tokio::spawn(async move {
                sleep(delay).await;
                let _ = tx.send(ClientEvent::ProbeDue { network });
            });
        }
        Action::ScheduleSave { epoch } => {
            let tx = tx.clone();
            tokio::spawn(async move {
                sleep(std::time::Duration::from_secs(1)).await;
                let _ = tx.send(ClientEvent::SaveDue { epoch });
            });
        }
        Action::SaveNow => {
            let patch = UserPatch {
                password: None,
                networks: Some(client.export_networks()),
            };
            if let Err(e) = store.update_user(&client.name, &patch) {
                tracing::error!(user = %client.name, error = %e, "save failed");
            }
        }
    }
}

fn report(client: &mut Client, network: NetworkId, result: anyhow::Result<()>) {
    if let Err(e) = result {
        tracing::warn!(network, error = %e, "send failed");
        if let Some(ni) = client.network_index(network) {
            client.lobby_error(ni, "Could not send to the network.");
        }
    }
}
