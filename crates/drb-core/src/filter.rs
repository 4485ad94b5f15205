use regex::Regex;

use crate::{chat::types::Message, domain::UserId};

/// Unicode ranges treated as emoji when deciding whether a message is
/// mostly pictographic. The last block is a wide catch-all covering
/// enclosed alphanumerics up through enclosed ideographs.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F), // emoticons
    (0x1F300, 0x1F5FF), // symbols & pictographs
    (0x1F680, 0x1F6FF), // transport & map symbols
    (0x1F700, 0x1F77F), // alchemical symbols
    (0x1F780, 0x1F7FF), // geometric shapes extended
    (0x1F800, 0x1F8FF), // supplemental arrows-C
    (0x1F900, 0x1F9FF), // supplemental symbols and pictographs
    (0x1FA00, 0x1FA6F), // chess symbols
    (0x1FA70, 0x1FAFF), // symbols and pictographs extended-A
    (0x2702, 0x27B0),   // dingbats
    (0x24C2, 0x1F251),
];

/// Maximum fraction of emoji characters before a message is dropped.
const EMOJI_FRACTION_LIMIT: f64 = 0.3;

/// Pure message-screening predicates.
///
/// Two independent gates: `should_process` decides whether a message is
/// addressed to us at all (authorship, reply target, mentions), and
/// `is_eligible_text` decides whether its content is worth answering
/// (plain conversational text, not links or emoji spam).
pub struct MessageFilter {
    url: Regex,
    mention: Regex,
    custom_emoji: Regex,
    word_run: Regex,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self {
            url: Regex::new(r"https?://\S+|www\.\S+").expect("valid regex"),
            mention: Regex::new(r"<@!?([0-9]+)>").expect("valid regex"),
            custom_emoji: Regex::new(r"<a?:[a-zA-Z0-9_]+:[0-9]+>").expect("valid regex"),
            word_run: Regex::new(r"[a-zA-Z0-9]{3,}").expect("valid regex"),
        }
    }

    /// Is this message addressed to us?
    ///
    /// - our own messages: never
    /// - replies: only when the replied-to author is us; a reply pointer
    ///   whose target we cannot resolve fails closed
    /// - mentions (inline tokens first, then the structured list): only a
    ///   single mention naming us
    /// - standalone messages: always
    pub fn should_process(&self, msg: &Message, self_id: &UserId) -> bool {
        if msg.author_id == *self_id {
            return false;
        }

        if let Some(author) = &msg.referenced_author {
            return author == self_id;
        }
        if msg.has_reference_pointer {
            // Reply to a message we cannot see; skip to be safe.
            return false;
        }

        let inline: Vec<&str> = self
            .mention
            .captures_iter(&msg.content)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
            .collect();
        if !inline.is_empty() {
            if inline.len() > 1 {
                return false;
            }
            return inline[0] == self_id.0;
        }

        if !msg.mentions.is_empty() {
            if msg.mentions.len() == 1 && msg.mentions[0] == *self_id {
                return true;
            }
            return false;
        }

        true
    }

    /// Is this content plain conversational text?
    ///
    /// Rejects empty/whitespace messages, links, mostly-emoji messages,
    /// custom emoji tokens, and content without a run of at least three
    /// alphanumerics.
    pub fn is_eligible_text(&self, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }

        if self.url.is_match(content) {
            return false;
        }

        let total = content.chars().count();
        let emoji = content.chars().filter(|c| is_emoji_char(*c)).count();
        if total > 0 && emoji as f64 / total as f64 > EMOJI_FRACTION_LIMIT {
            return false;
        }

        if self.custom_emoji.is_match(content) {
            return false;
        }

        if !self.word_run.is_match(content) {
            return false;
        }

        true
    }
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_emoji_char(c: char) -> bool {
    let cp = c as u32;
    EMOJI_RANGES.iter().any(|(lo, hi)| cp >= *lo && cp <= *hi)
}
