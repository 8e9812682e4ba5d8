//! Inbound protocol event router.
//!
//! Folds decoded server messages into session state and emits the follow-up
//! actions each one requires. Like the command router this is a pure fold:
//! no I/O happens here.

use super::event::{Action, NetworkId};
use super::models::{Chan, ChanKind, ListEntry, Msg, MsgKind, RegPhase, User};
use super::Client;
use crate::fanout::Push;
use irc::proto::{Command, Message, Prefix, Response};
use std::time::Duration;

pub fn handle(client: &mut Client, network: NetworkId, message: Message) -> Vec<Action> {
    let Some(ni) = client.network_index(network) else {
        return Vec::new();
    };
    let from = match &message.prefix {
        Some(Prefix::Nickname(nick, _, _)) => nick.clone(),
        Some(Prefix::ServerName(name)) => name.clone(),
        None => String::new(),
    };

    match message.command {
        Command::PRIVMSG(target, text) => privmsg(client, ni, &from, &target, &text),
        Command::NOTICE(target, text) => notice(client, ni, &from, &target, &text),
        Command::JOIN(chanlist, _, _) => join(client, ni, &from, &chanlist),
        Command::PART(chanlist, comment) => part(client, ni, &from, &chanlist, comment),
        Command::KICK(channel, user, comment) => kick(client, ni, &from, &channel, &user, comment),
        Command::QUIT(comment) => quit(client, ni, &from, comment),
        Command::NICK(new_nick) => nick_change(client, ni, &from, &new_nick),
        Command::TOPIC(channel, new_topic) => topic(client, ni, &from, &channel, new_topic),
        Command::INVITE(_, channel) => {
            let msg = Msg::new(
                client.ids.next(),
                MsgKind::Invite,
                from,
                format!("invited you to {channel}"),
            );
            client.deliver(ni, 0, msg, false);
            Vec::new()
        }
        Command::PONG(_, _) => pong(client, ni),
        Command::ERROR(text) => {
            client.lobby_error(ni, &text);
            Vec::new()
        }
        Command::ChannelMODE(channel, modes) => {
            let rendered = modes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let network = client.networks[ni].id;
            if let Some(ci) = client.networks[ni].find_chan(&channel) {
                let msg = Msg::new(
                    client.ids.next(),
                    MsgKind::Mode,
                    from,
                    format!("{channel} {rendered}"),
                );
                client.deliver(ni, ci, msg, false);
                // Prefixes may have changed; ask for a fresh membership list.
                return vec![Action::SendNames { network, channel }];
            }
            Vec::new()
        }
        Command::Response(code, args) => response(client, ni, code, args),
        _ => Vec::new(),
    }
}

/// CTCP payload of a message, if it is one.
fn ctcp(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('\u{1}')?;
    Some(inner.strip_suffix('\u{1}').unwrap_or(inner))
}

fn privmsg(client: &mut Client, ni: usize, from: &str, target: &str, text: &str) -> Vec<Action> {
    if let Some(body) = ctcp(text) {
        if let Some(action) = body.strip_prefix("ACTION ") {
            return fold_message(client, ni, from, target, action, MsgKind::Action);
        }
        // Other CTCP requests are only surfaced, never answered.
        let msg = Msg::new(
            client.ids.next(),
            MsgKind::System,
            from,
            format!("CTCP request: {body}"),
        );
        client.deliver(ni, 0, msg, false);
        return Vec::new();
    }
    fold_message(client, ni, from, target, text, MsgKind::Message)
}

fn notice(client: &mut Client, ni: usize, from: &str, target: &str, text: &str) -> Vec<Action> {
    if let Some(body) = ctcp(text) {
        let msg = Msg::new(
            client.ids.next(),
            MsgKind::System,
            from,
            format!("CTCP reply: {body}"),
        );
        client.deliver(ni, 0, msg, false);
        return Vec::new();
    }
    fold_message(client, ni, from, target, text, MsgKind::Notice)
}

/// Shared message fold: resolve the destination buffer, stamp self and
/// highlight flags, and deliver.
fn fold_message(
    client: &mut Client,
    ni: usize,
    from: &str,
    target: &str,
    text: &str,
    kind: MsgKind,
) -> Vec<Action> {
    let own = client.networks[ni].nick.clone();
    let self_ = from.eq_ignore_ascii_case(&own);

    // Resolve the destination buffer: the target's channel if we have one,
    // else the sender's query window, else a fresh query window. A message
    // addressed to our own nick never matches a channel, so it falls through
    // to the sender.
    let ci = match client.networks[ni].find_chan(target) {
        Some(ci) => ci,
        None => match client.networks[ni].find_chan(from) {
            Some(ci) => ci,
            None => client.new_query(ni, from),
        },
    };

    let mut msg = Msg::new(client.ids.next(), kind, from, text);
    msg.mode = client.networks[ni].channels[ci].get_mode(from);
    msg.self_ = self_;
    msg.highlight = !self_ && highlights(&own, text);
    client.deliver(ni, ci, msg, true);
    Vec::new()
}

/// Whether a message text mentions our nick: any whitespace-separated word,
/// with a leading "@" stripped, that starts with the nick (so "amy:" and
/// "amy's" still count).
fn highlights(own_nick: &str, text: &str) -> bool {
    let own = own_nick.to_lowercase();
    text.split_whitespace()
        .any(|w| w.strip_prefix('@').unwrap_or(w).to_lowercase().starts_with(&own))
}

fn join(client: &mut Client, ni: usize, from: &str, chan_name: &str) -> Vec<Action> {
    let own = client.networks[ni].nick.clone();
    if from.eq_ignore_ascii_case(&own) {
        if client.networks[ni].find_chan(chan_name).is_none() {
            let chan = Chan::new(client.ids.next(), ChanKind::Channel, chan_name);
            client.fanout.send(Push::Join {
                network: client.networks[ni].id,
                chan: serde_json::to_value(&chan).unwrap_or_default(),
            });
            client.networks[ni].channels.push(chan);
        }
        return client.save(false);
    }
    if let Some(ci) = client.networks[ni].find_chan(chan_name) {
        client.networks[ni].channels[ci].add_user(from, "");
        client.networks[ni].channels[ci].sort_users();
        let msg = Msg::new(client.ids.next(), MsgKind::Join, from, "joined the channel");
        client.deliver(ni, ci, msg, false);
        push_names(client, ni, ci);
    }
    Vec::new()
}

fn part(
    client: &mut Client,
    ni: usize,
    from: &str,
    chan_name: &str,
    comment: Option<String>,
) -> Vec<Action> {
    let own = client.networks[ni].nick.clone();
    let Some(ci) = client.networks[ni].find_chan(chan_name) else {
        return Vec::new();
    };
    if from.eq_ignore_ascii_case(&own) {
        // Confirmed part, possibly issued from another client of ours.
        client.close_chan(ni, ci);
        return client.save(false);
    }
    client.networks[ni].channels[ci].remove_user(from);
    let text = match comment {
        Some(reason) if !reason.is_empty() => format!("left the channel ({reason})"),
        _ => "left the channel".to_string(),
    };
    let msg = Msg::new(client.ids.next(), MsgKind::Part, from, text);
    client.deliver(ni, ci, msg, false);
    push_names(client, ni, ci);
    Vec::new()
}

fn kick(
    client: &mut Client,
    ni: usize,
    from: &str,
    channel: &str,
    user: &str,
    comment: Option<String>,
) -> Vec<Action> {
    let own = client.networks[ni].nick.clone();
    let Some(ci) = client.networks[ni].find_chan(channel) else {
        return Vec::new();
    };
    let text = match comment {
        Some(reason) if !reason.is_empty() => format!("{user} ({reason})"),
        _ => user.to_string(),
    };
    if user.eq_ignore_ascii_case(&own) {
        // We keep the window but it is no longer live.
        client.networks[ni].channels[ci].users.clear();
    } else {
        client.networks[ni].channels[ci].remove_user(user);
    }
    let msg = Msg::new(client.ids.next(), MsgKind::Kick, from, text);
    client.deliver(ni, ci, msg, true);
    push_names(client, ni, ci);
    Vec::new()
}

fn quit(client: &mut Client, ni: usize, from: &str, comment: Option<String>) -> Vec<Action> {
    let text = match comment {
        Some(reason) if !reason.is_empty() => format!("has quit ({reason})"),
        _ => "has quit".to_string(),
    };
    let members: Vec<usize> = client.networks[ni]
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.has_user(from))
        .map(|(ci, _)| ci)
        .collect();
    for ci in members {
        client.networks[ni].channels[ci].remove_user(from);
        let msg = Msg::new(client.ids.next(), MsgKind::Quit, from, text.clone());
        client.deliver(ni, ci, msg, false);
        push_names(client, ni, ci);
    }
    Vec::new()
}

fn nick_change(client: &mut Client, ni: usize, from: &str, new_nick: &str) -> Vec<Action> {
    let own = client.networks[ni].nick.clone();
    if from.eq_ignore_ascii_case(&own) {
        client.networks[ni].nick = new_nick.to_string();
        client.lobby_system(ni, &format!("You are now known as {new_nick}"));
    }
    let members: Vec<usize> = client.networks[ni]
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.has_user(from))
        .map(|(ci, _)| ci)
        .collect();
    for ci in members {
        let chan = &mut client.networks[ni].channels[ci];
        let mode = chan.get_mode(from);
        chan.remove_user(from);
        chan.add_user(new_nick, mode);
        chan.sort_users();
        let msg = Msg::new(client.ids.next(), MsgKind::Nick, from, new_nick);
        client.deliver(ni, ci, msg, false);
        push_names(client, ni, ci);
    }
    Vec::new()
}

fn topic(
    client: &mut Client,
    ni: usize,
    from: &str,
    channel: &str,
    topic: Option<String>,
) -> Vec<Action> {
    if let Some(ci) = client.networks[ni].find_chan(channel) {
        let text = topic.unwrap_or_default();
        client.networks[ni].channels[ci].topic = text.clone();
        let msg = Msg::new(client.ids.next(), MsgKind::Topic, from, text);
        client.deliver(ni, ci, msg, false);
    }
    Vec::new()
}

/// A probe PONG completes the registration pipeline: the connection is
/// confirmed live and autojoin fires, exactly once.
fn pong(client: &mut Client, ni: usize) -> Vec<Action> {
    if client.networks[ni].phase != RegPhase::Probed {
        return Vec::new();
    }
    client.networks[ni].phase = RegPhase::Ready;
    let channels = client.networks[ni]
        .autojoin
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if channels.is_empty() {
        return Vec::new();
    }
    vec![Action::SendJoin {
        network: client.networks[ni].id,
        channels,
    }]
}

fn response(client: &mut Client, ni: usize, code: Response, args: Vec<String>) -> Vec<Action> {
    match code {
        Response::RPL_WELCOME => welcome(client, ni, args),
        Response::RPL_MOTDSTART | Response::RPL_MOTD | Response::RPL_ENDOFMOTD => {
            let text = args.last().cloned().unwrap_or_default();
            let msg = Msg::new(client.ids.next(), MsgKind::Motd, "", text);
            client.deliver(ni, 0, msg, false);
            Vec::new()
        }
        Response::RPL_TOPIC => {
            if args.len() >= 3 {
                if let Some(ci) = client.networks[ni].find_chan(&args[1]) {
                    client.networks[ni].channels[ci].topic = args[2].clone();
                    let msg = Msg::new(client.ids.next(), MsgKind::Topic, "", args[2].clone());
                    client.deliver(ni, ci, msg, false);
                }
            }
            Vec::new()
        }
        Response::RPL_NAMREPLY => {
            // args: [us, symbol, channel, "nick @nick +nick ..."]
            if args.len() >= 4 {
                if let Some(ci) = client.networks[ni].find_chan(&args[2]) {
                    let chan = &mut client.networks[ni].channels[ci];
                    for name in args[3].split_whitespace() {
                        let (mode, nick) = match name.chars().next() {
                            Some(c @ ('~' | '&' | '@' | '%' | '+')) => {
                                (c.to_string(), &name[1..])
                            }
                            _ => (String::new(), name),
                        };
                        // Replace, not merge: a refresh must pick up mode
                        // changes for nicks we already know.
                        chan.remove_user(nick);
                        chan.users.push(User {
                            name: nick.to_string(),
                            mode,
                        });
                    }
                }
            }
            Vec::new()
        }
        Response::RPL_ENDOFNAMES => {
            if args.len() >= 2 {
                if let Some(ci) = client.networks[ni].find_chan(&args[1]) {
                    client.networks[ni].channels[ci].sort_users();
                    push_names(client, ni, ci);
                }
            }
            Vec::new()
        }
        Response::RPL_LISTSTART => {
            client.networks[ni].list_cache.clear();
            let ci = list_chan(client, ni);
            let msg = Msg::new(
                client.ids.next(),
                MsgKind::ChannelList,
                "",
                "Loading channel list, please wait...",
            );
            client.deliver(ni, ci, msg, false);
            Vec::new()
        }
        Response::RPL_LIST => {
            // args: [us, channel, user count, topic]
            if args.len() >= 3 {
                let entry = ListEntry {
                    name: args[1].clone(),
                    users: args[2].parse().unwrap_or(0),
                    topic: args.get(3).cloned().unwrap_or_default(),
                };
                client.networks[ni].list_cache.push(entry);
            }
            Vec::new()
        }
        Response::RPL_LISTEND => {
            let entries = std::mem::take(&mut client.networks[ni].list_cache);
            let ci = list_chan(client, ni);
            let mut msg = Msg::new(
                client.ids.next(),
                MsgKind::ChannelList,
                "",
                format!("{} channels", entries.len()),
            );
            msg.channels = entries;
            client.deliver(ni, ci, msg, false);
            Vec::new()
        }
        Response::RPL_WHOISUSER
        | Response::RPL_WHOISSERVER
        | Response::RPL_WHOISIDLE
        | Response::RPL_WHOISCHANNELS
        | Response::RPL_ENDOFWHOIS => whois(client, ni, code, args),
        other => {
            // Everything else lands in the lobby so nothing the server says
            // is silently dropped.
            let text = if args.len() > 1 {
                args[1..].join(" ")
            } else {
                args.join(" ")
            };
            if text.is_empty() {
                return Vec::new();
            }
            if other.is_error() {
                client.lobby_error(ni, &text);
            } else {
                client.lobby_system(ni, &text);
            }
            Vec::new()
        }
    }
}

/// First welcome on a connection starts the post-connect pipeline: scripted
/// commands spaced one second apart, then a liveness probe. A repeated
/// welcome on the same connection does nothing.
fn welcome(client: &mut Client, ni: usize, args: Vec<String>) -> Vec<Action> {
    if client.networks[ni].phase != RegPhase::Connecting {
        return Vec::new();
    }
    client.networks[ni].phase = RegPhase::Registered;
    client.networks[ni].connected = true;
    if let Some(nick) = args.first() {
        // The server has the final say on what our nick is.
        client.networks[ni].nick = nick.clone();
    }
    if let Some(text) = args.get(1) {
        let msg = Msg::new(client.ids.next(), MsgKind::Motd, "", text.clone());
        client.deliver(ni, 0, msg, false);
    }

    let network = client.networks[ni].id;
    let commands = client.networks[ni].commands.clone();
    let mut actions = Vec::with_capacity(commands.len() + 1);
    for (i, text) in commands.iter().enumerate() {
        actions.push(Action::ScheduleCommand {
            network,
            delay: Duration::from_secs(i as u64 + 1),
            text: text.clone(),
        });
    }
    actions.push(Action::ScheduleProbe {
        network,
        delay: Duration::from_secs(commands.len() as u64 + 1),
    });
    actions
}

fn whois(client: &mut Client, ni: usize, code: Response, args: Vec<String>) -> Vec<Action> {
    let Some(nick) = args.get(1).cloned() else {
        return Vec::new();
    };
    let text = match code {
        Response::RPL_WHOISUSER => {
            let user = args.get(2).map(String::as_str).unwrap_or("?");
            let host = args.get(3).map(String::as_str).unwrap_or("?");
            let real = args.get(5).map(String::as_str).unwrap_or("");
            format!("{nick} is {user}@{host} ({real})")
        }
        Response::RPL_WHOISSERVER => {
            let server = args.get(2).map(String::as_str).unwrap_or("?");
            let info = args.get(3).map(String::as_str).unwrap_or("");
            format!("{nick} is connected to {server} ({info})")
        }
        Response::RPL_WHOISIDLE => {
            let idle = args.get(2).map(String::as_str).unwrap_or("?");
            format!("{nick} has been idle for {idle} seconds")
        }
        Response::RPL_WHOISCHANNELS => {
            let channels = args.get(2).map(String::as_str).unwrap_or("");
            format!("{nick} is on {channels}")
        }
        _ => format!("End of /WHOIS for {nick}"),
    };
    let ci = match client.networks[ni].find_chan(&nick) {
        Some(ci) => ci,
        None => client.new_query(ni, &nick),
    };
    let msg = Msg::new(client.ids.next(), MsgKind::Whois, "", text);
    client.deliver(ni, ci, msg, false);
    Vec::new()
}

/// The synthetic listing channel, looked up by name each time so a user
/// closing it mid-listing just gets a fresh one.
fn list_chan(client: &mut Client, ni: usize) -> usize {
    match client.networks[ni].find_chan("Channel list") {
        Some(ci) => ci,
        None => client.new_query(ni, "Channel list"),
    }
}

fn push_names(client: &Client, ni: usize, ci: usize) {
    let chan = &client.networks[ni].channels[ci];
    client.fanout.send(Push::Names {
        chan: chan.id,
        users: chan.users.clone(),
    });
}
