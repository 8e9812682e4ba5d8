//! Top-level session event dispatch.
//!
//! The single entry point the driver calls for every event on a session's
//! stream. Pure: all I/O the event requires comes back as actions.

use super::event::{Action, ClientEvent};
use super::models::RegPhase;
use super::{commands, events, Client};

pub fn handle_event(client: &mut Client, event: ClientEvent) -> Vec<Action> {
    match event {
        ClientEvent::Irc { network, message } => events::handle(client, network, message),
        ClientEvent::Connected { network } => {
            if let Some(ni) = client.network_index(network) {
                client.lobby_system(ni, "Connected to the network.");
            }
            Vec::new()
        }
        ClientEvent::ConnectionFailed { network, error } => {
            tracing::warn!(network, %error, "connection failed");
            if let Some(ni) = client.network_index(network) {
                client.lobby_error(ni, "Connection error.");
            }
            Vec::new()
        }
        ClientEvent::Disconnected { network, reason } => {
            if let Some(ni) = client.network_index(network) {
                client.networks[ni].connected = false;
                client.networks[ni].phase = RegPhase::Connecting;
                let text = if reason.is_empty() {
                    "Disconnected from the network.".to_string()
                } else {
                    format!("Disconnected from the network ({reason}).")
                };
                client.lobby_error(ni, &text);
            }
            Vec::new()
        }
        ClientEvent::Connect(args) => client.connect(args),
        ClientEvent::Input { target, text } => commands::input(client, target, &text),
        ClientEvent::More {
            target,
            already_have,
        } => {
            client.more(target, already_have);
            Vec::new()
        }
        ClientEvent::Open { target } => {
            client.open(target);
            Vec::new()
        }
        ClientEvent::Sort(req) => {
            client.sort(req);
            Vec::new()
        }
        ClientEvent::Names { target } => {
            client.names(target);
            Vec::new()
        }
        // Consumed by the driver before dispatch.
        ClientEvent::SetPassword { .. } => Vec::new(),
        ClientEvent::CommandDue { network, text } => {
            // Scripted commands run as if typed into the network's lobby.
            match client.network_index(network) {
                Some(ni) => {
                    let lobby = client.networks[ni].lobby_id();
                    commands::input(client, lobby, &text)
                }
                None => Vec::new(),
            }
        }
        ClientEvent::ProbeDue { network } => {
            let Some(ni) = client.network_index(network) else {
                return Vec::new();
            };
            if client.networks[ni].phase != RegPhase::Registered {
                return Vec::new();
            }
            client.networks[ni].phase = RegPhase::Probed;
            let token = client.networks[ni].host.clone();
            vec![Action::SendPing { network, token }]
        }
        ClientEvent::SaveDue { epoch } => {
            // Only the most recent debounce timer wins.
            if epoch == client.save_epoch {
                vec![Action::SaveNow]
            } else {
                Vec::new()
            }
        }
        ClientEvent::Quit => client.quit(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::client::models::MsgKind;

    #[test]
    fn disconnect_resets_the_registration_pipeline() {
        let mut client = client();
        let nid = add_network(&mut client, "amy", &[]);
        client.networks[0].phase = RegPhase::Ready;

        handle_event(
            &mut client,
            ClientEvent::Disconnected {
                network: nid,
                reason: "ping timeout".into(),
            },
        );
        assert!(!client.networks[0].connected);
        assert_eq!(client.networks[0].phase, RegPhase::Connecting);
        let lobby = &client.networks[0].channels[0];
        assert_eq!(lobby.messages.last().unwrap().kind, MsgKind::Error);
    }

    #[test]
    fn probe_timer_sends_a_ping_once() {
        let mut client = client();
        let nid = add_network(&mut client, "amy", &[]);
        client.networks[0].phase = RegPhase::Registered;

        let actions = handle_event(&mut client, ClientEvent::ProbeDue { network: nid });
        assert_eq!(
            actions,
            vec![Action::SendPing {
                network: nid,
                token: "irc.example.org".into(),
            }]
        );
        assert_eq!(client.networks[0].phase, RegPhase::Probed);

        // A duplicate timer finds the wrong phase and does nothing.
        let again = handle_event(&mut client, ClientEvent::ProbeDue { network: nid });
        assert!(again.is_empty());
    }

    #[test]
    fn stale_save_timers_are_ignored() {
        let mut client = client();
        client.save(false);
        client.save(false);
        assert!(handle_event(&mut client, ClientEvent::SaveDue { epoch: 1 }).is_empty());
        assert_eq!(
            handle_event(&mut client, ClientEvent::SaveDue { epoch: 2 }),
            vec![Action::SaveNow]
        );
    }

    #[test]
    fn scripted_commands_run_in_the_lobby() {
        let mut client = client();
        let nid = add_network(&mut client, "amy", &[]);
        let actions = handle_event(
            &mut client,
            ClientEvent::CommandDue {
                network: nid,
                text: "/msg NickServ identify hunter2".into(),
            },
        );
        assert_eq!(
            actions,
            vec![Action::SendPrivmsg {
                network: nid,
                target: "NickServ".into(),
                text: "identify hunter2".into(),
            }]
        );
    }
}
