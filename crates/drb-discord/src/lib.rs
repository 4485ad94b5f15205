//! Discord adapter (REST).
//!
//! This crate implements the `drb-core` ChatPort over the Discord HTTP API,
//! authenticating each request with a raw account token.

use async_trait::async_trait;
use serde::Deserialize;

use drb_core::{
    chat::{
        port::ChatPort,
        types::{BotIdentity, ChannelInfo, Message},
    },
    domain::{ChannelId, MessageId, UserId},
    errors::Error,
    Result,
};

const DISCORD_API: &str = "https://discord.com/api/v9";

#[derive(Clone, Debug)]
pub struct DiscordClient {
    token: String,
    http: reqwest::Client,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        Self {
            token: token.into(),
            http,
        }
    }

    async fn fetch_channel(&self, channel: &ChannelId) -> Result<WireChannel> {
        let resp = self
            .http
            .get(format!("{DISCORD_API}/channels/{}", channel.0))
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(request_err)?;
        let resp = require_success(resp, "channel lookup").await?;
        resp.json::<WireChannel>().await.map_err(json_err)
    }
}

#[async_trait]
impl ChatPort for DiscordClient {
    async fn fetch_self(&self) -> Result<BotIdentity> {
        let resp = self
            .http
            .get(format!("{DISCORD_API}/users/@me"))
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(request_err)?;
        let resp = require_success(resp, "identity lookup").await?;
        let me: WireIdentity = resp.json().await.map_err(json_err)?;

        Ok(BotIdentity {
            id: UserId(me.id),
            username: me.username,
            discriminator: me.discriminator,
        })
    }

    async fn fetch_channel_info(&self, channel: &ChannelId) -> Result<ChannelInfo> {
        let data = self.fetch_channel(channel).await?;
        let name = data.name.unwrap_or_else(|| "Unknown Channel".to_string());

        let server_name = match data.guild_id {
            Some(guild_id) => {
                let resp = self
                    .http
                    .get(format!("{DISCORD_API}/guilds/{guild_id}"))
                    .header("Authorization", &self.token)
                    .send()
                    .await
                    .map_err(request_err)?;
                let resp = require_success(resp, "guild lookup").await?;
                let guild: WireGuild = resp.json().await.map_err(json_err)?;
                guild.name.unwrap_or_else(|| "Unknown Server".to_string())
            }
            None => "Direct Message".to_string(),
        };

        Ok(ChannelInfo { name, server_name })
    }

    async fn fetch_latest_message(&self, channel: &ChannelId) -> Result<Option<Message>> {
        let resp = self
            .http
            .get(format!("{DISCORD_API}/channels/{}/messages", channel.0))
            .query(&[("limit", "1")])
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(request_err)?;
        let resp = require_success(resp, "message fetch").await?;
        let messages: Vec<WireMessage> = resp.json().await.map_err(json_err)?;

        Ok(messages.into_iter().next().map(WireMessage::into_message))
    }

    async fn fetch_slow_mode_delay(&self, channel: &ChannelId) -> Result<u64> {
        let data = self.fetch_channel(channel).await?;
        Ok(data.rate_limit_per_user.unwrap_or(0))
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        text: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageId> {
        let resp = self
            .http
            .post(format!("{DISCORD_API}/channels/{}/messages", channel.0))
            .header("Authorization", &self.token)
            .json(&message_payload(text, reply_to))
            .send()
            .await
            .map_err(request_err)?;
        let resp = require_success(resp, "message send").await?;
        let sent: WireSent = resp.json().await.map_err(json_err)?;

        Ok(MessageId(sent.id))
    }

    async fn delete_message(&self, channel: &ChannelId, message: &MessageId) -> Result<()> {
        let resp = self
            .http
            .delete(format!(
                "{DISCORD_API}/channels/{}/messages/{}",
                channel.0, message.0
            ))
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(request_err)?;
        require_success(resp, "message delete").await?;
        Ok(())
    }
}

fn message_payload(text: &str, reply_to: Option<&MessageId>) -> serde_json::Value {
    let mut payload = serde_json::json!({ "content": text });
    if let Some(id) = reply_to {
        payload["message_reference"] = serde_json::json!({ "message_id": id.0 });
    }
    payload
}

fn request_err(e: reqwest::Error) -> Error {
    Error::Transport(format!("discord request error: {e}"))
}

fn json_err(e: reqwest::Error) -> Error {
    Error::Transport(format!("discord json error: {e}"))
}

async fn require_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Transport(format!(
        "discord {what} failed: {status} {}",
        body.chars().take(200).collect::<String>()
    )))
}

#[derive(Debug, Deserialize)]
struct WireIdentity {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    rate_limit_per_user: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireGuild {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    id: String,
}

/// A `referenced_message` is null when the original was deleted, and its
/// author can be missing on partial payloads; both collapse to "unresolved".
#[derive(Debug, Deserialize)]
struct WireReference {
    #[serde(default)]
    author: Option<WireAuthor>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    author: WireAuthor,
    #[serde(rename = "type", default)]
    kind: u8,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachments: Vec<serde_json::Value>,
    #[serde(default)]
    mentions: Vec<WireAuthor>,
    #[serde(default)]
    referenced_message: Option<WireReference>,
    #[serde(default)]
    message_reference: Option<serde_json::Value>,
}

impl WireMessage {
    fn into_message(self) -> Message {
        let referenced_author = self
            .referenced_message
            .and_then(|r| r.author)
            .map(|a| UserId(a.id));

        Message {
            id: MessageId(self.id),
            author_id: UserId(self.author.id),
            kind: self.kind,
            content: self.content,
            attachment_count: self.attachments.len(),
            mentions: self.mentions.into_iter().map(|a| UserId(a.id)).collect(),
            referenced_author,
            has_reference_pointer: self.message_reference.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSent {
    id: String,
}
