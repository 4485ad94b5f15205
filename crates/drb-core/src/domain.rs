use serde::Deserialize;

/// Discord user id (snowflake, decimal string on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct UserId(pub String);

/// Discord channel id (snowflake, decimal string on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChannelId(pub String);

/// Discord message id (snowflake, decimal string on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct MessageId(pub String);

/// Generation API key. Opaque everywhere except the generation adapter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Credential(pub String);

/// Conversation memory is keyed per user per channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub user_id: UserId,
    pub channel_id: ChannelId,
}

/// What to do with our own reply after it has been posted.
///
/// In the channels file: `"delete": "immediate"` or
/// `"delete": {"after_secs": 300}`. Absent means keep the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    Immediate,
    AfterSecs(u64),
}

/// Per-channel behavior, loaded from the channels file at startup and
/// never mutated afterwards.
#[derive(Clone, Debug, Deserialize)]
pub struct ChannelSettings {
    pub channel_id: ChannelId,
    /// Reply language code. `id` and `en` are supported; anything else is
    /// rejected at generation time.
    pub language: String,
    /// Generate replies with the model backend. When false the channel is
    /// write-only: lines from the static pool are posted on an interval.
    #[serde(default)]
    pub use_generation: bool,
    #[serde(default = "default_read_delay_secs")]
    pub read_delay_secs: u64,
    #[serde(default = "default_delay_interval_secs")]
    pub delay_interval_secs: u64,
    /// Honor the channel's slow-mode delay before posting.
    #[serde(default)]
    pub use_slow_mode: bool,
    /// Post as a threaded reply to the message being answered.
    #[serde(default)]
    pub use_reply: bool,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub delete: Option<DeletePolicy>,
}

fn default_read_delay_secs() -> u64 {
    10
}

fn default_delay_interval_secs() -> u64 {
    10
}
