use async_trait::async_trait;

use crate::{
    chat::types::{BotIdentity, ChannelInfo, Message},
    domain::{ChannelId, MessageId},
    Result,
};

/// Chat-platform port.
///
/// Discord REST is the first implementation; the worker only ever talks to
/// this trait so tests can drive it with fakes.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn fetch_self(&self) -> Result<BotIdentity>;

    async fn fetch_channel_info(&self, channel: &ChannelId) -> Result<ChannelInfo>;

    /// The most recent message in the channel, if there is one.
    async fn fetch_latest_message(&self, channel: &ChannelId) -> Result<Option<Message>>;

    /// The channel's slow-mode delay in seconds (0 when slow mode is off).
    async fn fetch_slow_mode_delay(&self, channel: &ChannelId) -> Result<u64>;

    /// Post `text`, optionally as a threaded reply. Returns the id of the
    /// posted message.
    async fn send_message(
        &self,
        channel: &ChannelId,
        text: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageId>;

    async fn delete_message(&self, channel: &ChannelId, message: &MessageId) -> Result<()>;
}
