use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task::JoinHandle;

use crate::domain::ConversationKey;

/// One question/answer pair in a conversation.
#[derive(Clone, Debug)]
pub struct Exchange {
    pub user_text: String,
    pub bot_text: String,
    pub at: Instant,
}

#[derive(Debug)]
struct Conversation {
    exchanges: Vec<Exchange>,
    last_activity: Instant,
}

/// In-memory conversation history, keyed per user per channel.
///
/// Bounded to `max_exchanges` entries per conversation (oldest dropped
/// first) and expired after `expiry` of inactivity. Expiry is enforced
/// lazily on read; [`spawn_cleanup_task`] additionally purges stale
/// conversations in bulk so abandoned ones do not pile up.
pub struct ConversationStore {
    max_exchanges: usize,
    expiry: Duration,
    state: tokio::sync::Mutex<HashMap<ConversationKey, Conversation>>,
}

impl ConversationStore {
    pub fn new(max_exchanges: usize, expiry: Duration) -> Self {
        Self {
            max_exchanges,
            expiry,
            state: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn record_exchange(&self, key: &ConversationKey, user_text: &str, bot_text: &str) {
        self.record_exchange_at(key, user_text, bot_text, Instant::now())
            .await;
    }

    pub async fn record_exchange_at(
        &self,
        key: &ConversationKey,
        user_text: &str,
        bot_text: &str,
        now: Instant,
    ) {
        let mut state = self.state.lock().await;
        let conversation = state.entry(key.clone()).or_insert_with(|| Conversation {
            exchanges: Vec::new(),
            last_activity: now,
        });

        conversation.exchanges.push(Exchange {
            user_text: user_text.to_string(),
            bot_text: bot_text.to_string(),
            at: now,
        });
        conversation.last_activity = now;

        let overflow = conversation
            .exchanges
            .len()
            .saturating_sub(self.max_exchanges);
        if overflow > 0 {
            conversation.exchanges.drain(..overflow);
        }
    }

    /// The conversation for `key`, oldest exchange first. An expired
    /// conversation is deleted here and reported as empty.
    pub async fn history(&self, key: &ConversationKey) -> Vec<Exchange> {
        self.history_at(key, Instant::now()).await
    }

    pub async fn history_at(&self, key: &ConversationKey, now: Instant) -> Vec<Exchange> {
        let mut state = self.state.lock().await;
        let Some(conversation) = state.get(key) else {
            return Vec::new();
        };

        if now.duration_since(conversation.last_activity) > self.expiry {
            state.remove(key);
            tracing::debug!(
                user = %key.user_id.0,
                channel = %key.channel_id.0,
                "expired conversation removed"
            );
            return Vec::new();
        }

        conversation.exchanges.clone()
    }

    /// Drop every expired conversation, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now()).await
    }

    pub async fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut state = self.state.lock().await;
        let before = state.len();
        state.retain(|_, c| now.duration_since(c.last_activity) <= self.expiry);
        before - state.len()
    }
}

/// Purge expired conversations every `period`, forever.
pub fn spawn_cleanup_task(store: Arc<ConversationStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.tick().await; // the first tick completes immediately
        loop {
            tick.tick().await;
            let removed = store.cleanup_expired().await;
            if removed > 0 {
                tracing::info!(removed, "expired conversations cleaned up");
            }
        }
    })
}
