//! Fake IRC server that the bot connects to.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use wetfish_chanserv::proto::Message;

pub const SERVER_NAME: &str = "irc.wetfish.test";

/// Listening side, bound to an ephemeral port.
pub struct TestNetwork {
    listener: TcpListener,
}

impl TestNetwork {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Wait for the bot to connect.
    pub async fn accept(&self) -> anyhow::Result<BotLink> {
        let (stream, _) = timeout(Duration::from_secs(10), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(BotLink {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

/// The server's end of one bot connection.
pub struct BotLink {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl BotLink {
    /// Send a raw line to the bot.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single message from the bot.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        let read = timeout(dur, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("bot closed the connection");
        }
        line.trim_end()
            .parse::<Message>()
            .map_err(|e| anyhow::anyhow!("Parse error: {}", e))
    }

    /// Receive messages until `predicate` matches; returns all of them.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = predicate(&msg);
            messages.push(msg);
            if done {
                return Ok(messages);
            }
        }
    }

    /// Run the registration handshake and oper the bot up.
    ///
    /// Returns once the bot has asked for the service nick.
    pub async fn welcome(&mut self, nick: &str) -> anyhow::Result<()> {
        self.recv_until(|m| m.command == "USER").await?;
        self.send_raw(&format!(":{SERVER_NAME} 001 {nick} :Welcome to Wetfish {nick}"))
            .await?;
        self.recv_until(|m| m.command == "OPER").await?;
        self.send_raw(&format!(":{SERVER_NAME} 381 {nick} :You are now an IRC operator"))
            .await?;
        self.recv_until(|m| m.command == "SANICK").await?;
        Ok(())
    }

    /// Deliver a PRIVMSG from `nick` to `target`.
    pub async fn privmsg_from(&mut self, nick: &str, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_raw(&format!(
            ":{nick}!{nick}@{nick}.users.wetfish PRIVMSG {target} :{text}"
        ))
        .await
    }

    /// Answer the bot's next WHOIS with the given user modes.
    pub async fn answer_whois(&mut self, me: &str, modes: &str) -> anyhow::Result<String> {
        let whois = self.recv_until(|m| m.command == "WHOIS").await?;
        let nick = whois
            .last()
            .and_then(|m| m.params.first().cloned())
            .ok_or_else(|| anyhow::anyhow!("WHOIS without a target"))?;
        self.send_raw(&format!(":{SERVER_NAME} 311 {me} {nick} {nick} {nick}.users.wetfish * :{nick}"))
            .await?;
        self.send_raw(&format!(":{SERVER_NAME} 379 {me} {nick} :is using modes +{modes}"))
            .await?;
        self.send_raw(&format!(":{SERVER_NAME} 318 {me} {nick} :End of /WHOIS list."))
            .await?;
        Ok(nick)
    }
}
