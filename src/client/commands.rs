//! Input command router.
//!
//! Every line a viewer types into a channel lands here. Lines that do not
//! start with a slash (and lines starting with a doubled slash) are message
//! sends; everything else is dispatched by command word over a closed alias
//! table. Unknown commands pass through to the server verbatim.

use super::event::Action;
use super::models::{ChanKind, Msg, MsgKind};
use super::Client;
use crate::fanout::Push;

pub fn input(client: &mut Client, target: u64, text: &str) -> Vec<Action> {
    let Some((ni, ci)) = client.find(target) else {
        return Vec::new();
    };
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    // "hello" and "//hello" both mean "say"; only a single leading slash
    // introduces a command.
    let line = if let Some(rest) = text.strip_prefix('/') {
        if let Some(escaped) = rest.strip_prefix('/') {
            format!("say /{escaped}")
        } else {
            rest.to_string()
        }
    } else {
        format!("say {text}")
    };

    let mut args: Vec<&str> = line.split(' ').collect();
    let cmd = args.remove(0).to_lowercase();

    let network = client.networks[ni].id;
    let chan_name = client.networks[ni].channels[ci].name.clone();
    let chan_kind = client.networks[ni].channels[ci].kind;

    match cmd.as_str() {
        "say" => {
            if args.is_empty() {
                return Vec::new();
            }
            if chan_kind == ChanKind::Lobby {
                client.lobby_error(ni, "You can not send messages to this window.");
                return Vec::new();
            }
            let body = args.join(" ");
            echo(client, ni, ci, MsgKind::Message, &body);
            vec![Action::SendPrivmsg {
                network,
                target: chan_name,
                text: body,
            }]
        }
        "msg" => {
            if args.len() < 2 {
                return Vec::new();
            }
            let to = args.remove(0).to_string();
            let body = args.join(" ");
            // Echo only lands somewhere if we have a buffer for the target.
            if let Some(eci) = client.networks[ni].find_chan(&to) {
                echo(client, ni, eci, MsgKind::Message, &body);
            }
            vec![Action::SendPrivmsg {
                network,
                target: to,
                text: body,
            }]
        }
        "me" | "slap" => {
            let body = if cmd == "slap" {
                let Some(victim) = args.first() else {
                    return Vec::new();
                };
                format!("slaps {victim} around a bit with a large trout")
            } else {
                if args.is_empty() {
                    return Vec::new();
                }
                args.join(" ")
            };
            if chan_kind == ChanKind::Lobby {
                client.lobby_error(ni, "You can not send messages to this window.");
                return Vec::new();
            }
            echo(client, ni, ci, MsgKind::Action, &body);
            vec![Action::SendAction {
                network,
                target: chan_name,
                text: body,
            }]
        }
        "notice" => {
            if args.len() < 2 {
                return Vec::new();
            }
            let to = args.remove(0).to_string();
            let body = args.join(" ");
            if let Some(eci) = client.networks[ni].find_chan(&to) {
                echo(client, ni, eci, MsgKind::Notice, &body);
            }
            vec![Action::SendNotice {
                network,
                target: to,
                text: body,
            }]
        }
        "part" | "leave" | "close" => match chan_kind {
            // The lobby lives exactly as long as its network.
            ChanKind::Lobby => Vec::new(),
            ChanKind::Query => {
                client.close_chan(ni, ci);
                client.save(false)
            }
            ChanKind::Channel => {
                let reason = if args.is_empty() {
                    None
                } else {
                    Some(args.join(" "))
                };
                client.close_chan(ni, ci);
                let mut actions = vec![Action::SendPart {
                    network,
                    channel: chan_name,
                    reason,
                }];
                actions.extend(client.save(false));
                actions
            }
        },
        "connect" | "server" => {
            let Some(host) = args.first() else {
                return Vec::new();
            };
            let connect_args = super::event::ConnectArgs {
                host: host.to_string(),
                port: args.get(1).and_then(|p| p.parse().ok()),
                ..Default::default()
            };
            let mut actions = client.connect(connect_args);
            if !actions.is_empty() {
                actions.extend(client.save(false));
            }
            actions
        }
        "join" => {
            if args.is_empty() {
                return Vec::new();
            }
            vec![Action::SendJoin {
                network,
                channels: args.join(","),
            }]
        }
        "nick" => {
            // The rename only takes effect when the server echoes it back.
            match args.first() {
                Some(nick) => vec![Action::SendNick {
                    network,
                    nick: nick.to_string(),
                }],
                None => Vec::new(),
            }
        }
        "topic" => vec![Action::SendTopic {
            network,
            channel: chan_name,
            text: args.join(" "),
        }],
        "kick" => match args.first() {
            Some(user) => vec![Action::SendKick {
                network,
                channel: chan_name,
                user: user.to_string(),
            }],
            None => Vec::new(),
        },
        "invite" => {
            let Some(nick) = args.first() else {
                return Vec::new();
            };
            let channel = args
                .get(1)
                .map(|s| s.to_string())
                .unwrap_or(chan_name);
            vec![Action::SendInvite {
                network,
                nick: nick.to_string(),
                channel,
            }]
        }
        "mode" | "op" | "deop" | "voice" | "devoice" => {
            if args.is_empty() {
                return Vec::new();
            }
            if cmd == "mode" {
                let target = args.remove(0).to_string();
                vec![Action::SendMode {
                    network,
                    target,
                    modes: args.join(" "),
                }]
            } else {
                let flag = match cmd.as_str() {
                    "op" => "+o",
                    "deop" => "-o",
                    "voice" => "+v",
                    _ => "-v",
                };
                args.iter()
                    .map(|nick| Action::SendMode {
                        network,
                        target: chan_name.clone(),
                        modes: format!("{flag} {nick}"),
                    })
                    .collect()
            }
        }
        "whois" => match args.first() {
            Some(nick) => vec![Action::SendWhois {
                network,
                nick: nick.to_string(),
            }],
            None => Vec::new(),
        },
        "quit" | "disconnect" => {
            let connected = client.networks[ni].connected;
            let message = if args.is_empty() {
                None
            } else {
                Some(args.join(" "))
            };
            let removed = client.networks.remove(ni);
            if removed
                .channels
                .iter()
                .any(|c| client.active_channel == Some(c.id))
            {
                client.active_channel = None;
            }
            client.fanout.send(Push::Quit { network });
            let mut actions = if connected {
                vec![Action::QuitNetwork { network, message }]
            } else {
                vec![Action::CloseConnection { network }]
            };
            actions.extend(client.save(false));
            actions
        }
        "raw" | "send" | "quote" => {
            if args.is_empty() {
                return Vec::new();
            }
            vec![Action::SendRaw {
                network,
                line: args.join(" "),
            }]
        }
        _ => {
            // Anything we do not understand goes to the server untouched.
            vec![Action::SendRaw { network, line }]
        }
    }
}

/// Local echo of an outbound message, stamped with our own nick and current
/// mode prefix. Never counts as unread.
fn echo(client: &mut Client, ni: usize, ci: usize, kind: MsgKind, text: &str) {
    let nick = client.networks[ni].nick.clone();
    let mode = client.networks[ni].channels[ci].get_mode(&nick);
    let mut msg = Msg::new(client.ids.next(), kind, nick, text);
    msg.mode = mode;
    msg.self_ = true;
    client.deliver(ni, ci, msg, false);
}
