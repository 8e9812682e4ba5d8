//! Per-session registry of live connections and their typed send surface.

use crate::client::event::NetworkId;
use crate::irc::connection::IrcConnection;
use anyhow::Result;
use std::collections::HashMap;

pub struct IrcManager {
    connections: HashMap<NetworkId, IrcConnection>,
}

impl IrcManager {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    pub fn insert(&mut self, conn: IrcConnection) {
        self.connections.insert(conn.network_id, conn);
    }

    fn get_sender(&self, network_id: NetworkId) -> Option<&irc::client::Sender> {
        self.connections.get(&network_id).map(|c| &c.sender)
    }

    pub fn send_privmsg(&self, network_id: NetworkId, target: &str, text: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            // No CTCP injection in outbound messages.
            let clean = text.replace('\x01', "");
            sender.send_privmsg(target, &clean)?;
        }
        Ok(())
    }

    pub fn send_action(&self, network_id: NetworkId, target: &str, text: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            let clean = text.replace('\x01', "");
            let ctcp = format!("\x01ACTION {}\x01", clean);
            sender.send_privmsg(target, &ctcp)?;
        }
        Ok(())
    }

    pub fn send_notice(&self, network_id: NetworkId, target: &str, text: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::NOTICE(
                target.to_string(),
                text.replace('\x01', ""),
            ))?;
        }
        Ok(())
    }

    pub fn send_join(&self, network_id: NetworkId, channels: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send_join(channels)?;
        }
        Ok(())
    }

    pub fn send_part(
        &self,
        network_id: NetworkId,
        channel: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::PART(
                channel.to_string(),
                reason.map(|r| r.to_string()),
            ))?;
        }
        Ok(())
    }

    pub fn send_nick(&self, network_id: NetworkId, nick: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::NICK(nick.to_string()))?;
        }
        Ok(())
    }

    pub fn send_topic(&self, network_id: NetworkId, channel: &str, text: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::TOPIC(
                channel.to_string(),
                Some(text.to_string()),
            ))?;
        }
        Ok(())
    }

    pub fn send_kick(&self, network_id: NetworkId, channel: &str, user: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::KICK(
                channel.to_string(),
                user.to_string(),
                None,
            ))?;
        }
        Ok(())
    }

    pub fn send_invite(&self, network_id: NetworkId, nick: &str, channel: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::INVITE(
                nick.to_string(),
                channel.to_string(),
            ))?;
        }
        Ok(())
    }

    pub fn send_whois(&self, network_id: NetworkId, nick: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::WHOIS(None, nick.to_string()))?;
        }
        Ok(())
    }

    pub fn send_mode(&self, network_id: NetworkId, target: &str, modes: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            // Raw MODE since the irc crate splits typed ChannelMODE/UserMODE.
            let raw = format!("MODE {} {}", target, modes);
            sender.send(irc::client::prelude::Command::Raw(raw, vec![]))?;
        }
        Ok(())
    }

    pub fn send_names(&self, network_id: NetworkId, channel: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::NAMES(
                Some(channel.to_string()),
                None,
            ))?;
        }
        Ok(())
    }

    pub fn send_ping(&self, network_id: NetworkId, token: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::PING(token.to_string(), None))?;
        }
        Ok(())
    }

    pub fn send_raw(&self, network_id: NetworkId, line: &str) -> Result<()> {
        if let Some(sender) = self.get_sender(network_id) {
            sender.send(irc::client::prelude::Command::Raw(line.to_string(), vec![]))?;
        }
        Ok(())
    }

    /// Graceful quit: send QUIT and drop the sender.
    pub fn quit(&mut self, network_id: NetworkId, message: Option<&str>) {
        if let Some(conn) = self.connections.get(&network_id) {
            let _ = conn.sender.send_quit(message.unwrap_or("Leaving"));
        }
        self.connections.remove(&network_id);
    }

    /// Force-close: dropping the sender tears the connection down.
    pub fn close(&mut self, network_id: NetworkId) {
        self.connections.remove(&network_id);
    }
}

impl Default for IrcManager {
    fn default() -> Self {
        Self::new()
    }
}
