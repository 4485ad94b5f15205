use crate::domain::{MessageId, UserId};

/// Wire message type that marks a system notification (member join and the
/// like). Such messages are skipped without being marked processed.
pub const SYSTEM_MESSAGE_KIND: u8 = 8;

/// A channel message, normalized from the platform payload down to the
/// fields the filter and worker need.
#[derive(Clone, Debug)]
pub struct Message {
    pub id: MessageId,
    pub author_id: UserId,
    /// Platform message type; see [`SYSTEM_MESSAGE_KIND`].
    pub kind: u8,
    pub content: String,
    pub attachment_count: usize,
    /// Users listed in the structured mentions array.
    pub mentions: Vec<UserId>,
    /// Author of the message this one replies to, when the payload carries
    /// the full referenced message.
    pub referenced_author: Option<UserId>,
    /// True when the payload carries a reply pointer, whether or not the
    /// referenced message itself was resolvable.
    pub has_reference_pointer: bool,
}

/// Who we are on this account.
#[derive(Clone, Debug)]
pub struct BotIdentity {
    pub id: UserId,
    pub username: String,
    pub discriminator: String,
}

/// Channel metadata for startup logs.
#[derive(Clone, Debug)]
pub struct ChannelInfo {
    pub name: String,
    pub server_name: String,
}
