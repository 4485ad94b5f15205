use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::time::sleep;

use crate::{
    chat::{port::ChatPort, types::SYSTEM_MESSAGE_KIND},
    conversation::ConversationStore,
    domain::{ChannelSettings, ConversationKey, DeletePolicy, MessageId, UserId},
    filter::MessageFilter,
    generator::{ReplyGenerator, ReplyRequest},
};

/// Applied when the slow-mode lookup fails.
const DEFAULT_SLOW_MODE_SECS: u64 = 5;

/// Posted when the backend produced nothing usable.
const EMPTY_REPLY_FALLBACK: &str = "Maaf, tidak dapat membalas pesan.";

/// Message ids already looked at, shared by every worker.
///
/// Grows for the lifetime of the process; there is no persistence and no
/// eviction.
#[derive(Default)]
pub struct ProcessedSet {
    inner: tokio::sync::Mutex<HashSet<MessageId>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, id: &MessageId) -> bool {
        self.inner.lock().await.contains(id)
    }

    pub async fn insert(&self, id: MessageId) {
        self.inner.lock().await.insert(id);
    }
}

/// Drives one configured channel on one account.
///
/// A reading channel polls the newest message each iteration and answers
/// it when it qualifies; a write-only channel posts lines from the static
/// pool on an interval. Failures are logged and the loop moves on; nothing
/// stops a worker.
pub struct ChannelWorker {
    chat: Arc<dyn ChatPort>,
    generator: Arc<ReplyGenerator>,
    conversations: Arc<ConversationStore>,
    filter: Arc<MessageFilter>,
    processed: Arc<ProcessedSet>,
    settings: ChannelSettings,
    self_id: UserId,
}

impl ChannelWorker {
    pub fn new(
        chat: Arc<dyn ChatPort>,
        generator: Arc<ReplyGenerator>,
        conversations: Arc<ConversationStore>,
        filter: Arc<MessageFilter>,
        processed: Arc<ProcessedSet>,
        settings: ChannelSettings,
        self_id: UserId,
    ) -> Self {
        Self {
            chat,
            generator,
            conversations,
            filter,
            processed,
            settings,
            self_id,
        }
    }

    /// Drive the channel forever.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.settings.delay_interval_secs);

        if !self.settings.use_generation {
            loop {
                sleep(interval).await;
                self.run_pool_cycle().await;
            }
        }

        let read_delay = Duration::from_secs(self.settings.read_delay_secs);
        loop {
            sleep(read_delay).await;
            self.run_cycle().await;
            sleep(interval).await;
        }
    }

    /// One polling iteration: look at the newest message and answer it if
    /// it qualifies. Split out from [`run`] so tests can drive the loop.
    pub async fn run_cycle(&self) {
        let channel = &self.settings.channel_id;

        let message = match self.chat.fetch_latest_message(channel).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!(channel = %channel.0, "no messages in channel");
                return;
            }
            Err(err) => {
                tracing::warn!(channel = %channel.0, error = %err, "failed to fetch messages");
                return;
            }
        };

        if self.processed.contains(&message.id).await {
            tracing::debug!(channel = %channel.0, "newest message already handled");
            return;
        }
        if message.kind == SYSTEM_MESSAGE_KIND {
            tracing::debug!(channel = %channel.0, "newest message is a system notification");
            return;
        }

        if !self.filter.should_process(&message, &self.self_id) {
            tracing::debug!(channel = %channel.0, message = %message.id.0, "message not addressed to us");
            self.processed.insert(message.id.clone()).await;
            return;
        }

        let text = message.content.trim().to_string();
        if message.attachment_count > 0 || !self.filter.is_eligible_text(&text) {
            tracing::debug!(channel = %channel.0, message = %message.id.0, "message content not answerable");
            self.processed.insert(message.id.clone()).await;
            return;
        }

        tracing::info!(channel = %channel.0, text = %text, "received message");

        if self.settings.use_slow_mode {
            let delay = match self.chat.fetch_slow_mode_delay(channel).await {
                Ok(secs) => secs,
                Err(err) => {
                    tracing::warn!(channel = %channel.0, error = %err, "failed to fetch slow mode delay");
                    DEFAULT_SLOW_MODE_SECS
                }
            };
            if delay > 0 {
                tracing::info!(channel = %channel.0, delay_secs = delay, "slow mode active, waiting");
                sleep(Duration::from_secs(delay)).await;
            }
        }

        self.processed.insert(message.id.clone()).await;

        let key = ConversationKey {
            user_id: message.author_id.clone(),
            channel_id: channel.clone(),
        };
        let history = self.conversations.history(&key).await;

        let request = ReplyRequest {
            text: text.clone(),
            language: self.settings.language.clone(),
            use_generation: true,
            persona: self.settings.persona.clone(),
            history,
        };
        let reply = match self.generator.generate(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(channel = %channel.0, error = %err, "skipping message");
                return;
            }
        };
        let reply = if reply.is_empty() {
            EMPTY_REPLY_FALLBACK.to_string()
        } else {
            reply
        };

        if reply.trim().to_lowercase() == text.to_lowercase() {
            tracing::warn!(channel = %channel.0, "reply would echo the message, not sending");
            return;
        }

        let reply_to = self.settings.use_reply.then_some(&message.id);
        match self.chat.send_message(channel, &reply, reply_to).await {
            Ok(sent) => {
                tracing::info!(channel = %channel.0, reply = %reply, "reply sent");
                self.schedule_delete(sent);
                self.conversations.record_exchange(&key, &text, &reply).await;
            }
            Err(err) => {
                tracing::warn!(channel = %channel.0, error = %err, "failed to send reply");
            }
        }
    }

    /// One write-only iteration: post a line from the static pool.
    pub async fn run_pool_cycle(&self) {
        let channel = &self.settings.channel_id;

        let request = ReplyRequest {
            text: String::new(),
            language: self.settings.language.clone(),
            use_generation: false,
            persona: None,
            history: Vec::new(),
        };
        let line = match self.generator.generate(&request).await {
            Ok(line) => line,
            Err(err) => {
                // Pool requests cannot fail, but the loop has to survive anything.
                tracing::warn!(channel = %channel.0, error = %err, "no pool line available");
                return;
            }
        };

        match self.chat.send_message(channel, &line, None).await {
            Ok(sent) => {
                tracing::info!(channel = %channel.0, text = %line, "pool message sent");
                self.schedule_delete(sent);
            }
            Err(err) => {
                tracing::warn!(channel = %channel.0, error = %err, "failed to send pool message");
            }
        }
    }

    /// Apply the channel's delete policy to a message we just posted. The
    /// deletion runs detached; a failure is logged and dropped.
    fn schedule_delete(&self, sent: MessageId) {
        let Some(policy) = self.settings.delete else {
            return;
        };

        let chat = Arc::clone(&self.chat);
        let channel = self.settings.channel_id.clone();
        tokio::spawn(async move {
            if let DeletePolicy::AfterSecs(secs) = policy {
                tracing::info!(channel = %channel.0, delay_secs = secs, "deleting reply after delay");
                sleep(Duration::from_secs(secs)).await;
            }
            if let Err(err) = chat.delete_message(&channel, &sent).await {
                tracing::warn!(channel = %channel.0, error = %err, "failed to delete reply");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chat::types::{BotIdentity, ChannelInfo, Message},
        domain::{ChannelId, Credential},
        errors::Error,
        keys::KeyRotator,
        model::GenerationClient,
        pool::MessagePool,
        Result,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SELF_ID: &str = "999";

    struct FakeChat {
        latest: Mutex<VecDeque<Result<Option<Message>>>>,
        fetch_calls: AtomicUsize,
        slow_mode: Option<u64>,
        fail_sends: bool,
        sends: Mutex<Vec<(ChannelId, String, Option<MessageId>)>>,
        deletes: Mutex<Vec<MessageId>>,
        next_send_id: AtomicUsize,
    }

    impl FakeChat {
        fn scripted(results: Vec<Result<Option<Message>>>) -> Arc<Self> {
            Arc::new(Self {
                latest: Mutex::new(results.into()),
                fetch_calls: AtomicUsize::new(0),
                slow_mode: Some(0),
                fail_sends: false,
                sends: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
                next_send_id: AtomicUsize::new(0),
            })
        }

        fn with_latest(message: Message) -> Arc<Self> {
            Self::scripted(vec![Ok(Some(message))])
        }

        fn sent(&self) -> Vec<(ChannelId, String, Option<MessageId>)> {
            self.sends.lock().unwrap().clone()
        }

        fn deleted(&self) -> Vec<MessageId> {
            self.deletes.lock().unwrap().clone()
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatPort for FakeChat {
        async fn fetch_self(&self) -> Result<BotIdentity> {
            Ok(BotIdentity {
                id: UserId(SELF_ID.to_string()),
                username: "bot".to_string(),
                discriminator: "0001".to_string(),
            })
        }

        async fn fetch_channel_info(&self, _channel: &ChannelId) -> Result<ChannelInfo> {
            Ok(ChannelInfo {
                name: "general".to_string(),
                server_name: "testserver".to_string(),
            })
        }

        async fn fetch_latest_message(&self, _channel: &ChannelId) -> Result<Option<Message>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.latest.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn fetch_slow_mode_delay(&self, _channel: &ChannelId) -> Result<u64> {
            match self.slow_mode {
                Some(secs) => Ok(secs),
                None => Err(Error::Transport("slow mode lookup failed".to_string())),
            }
        }

        async fn send_message(
            &self,
            channel: &ChannelId,
            text: &str,
            reply_to: Option<&MessageId>,
        ) -> Result<MessageId> {
            if self.fail_sends {
                return Err(Error::Transport("send failed".to_string()));
            }
            self.sends
                .lock()
                .unwrap()
                .push((channel.clone(), text.to_string(), reply_to.cloned()));
            let n = self.next_send_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(MessageId(format!("sent-{n}")))
        }

        async fn delete_message(&self, _channel: &ChannelId, message: &MessageId) -> Result<()> {
            self.deletes.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FakeBackend {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn scripted(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn prompts(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationClient for FakeBackend {
        async fn complete(&self, _credential: &Credential, prompt: &str) -> Result<String> {
            self.calls.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("unscripted reply".to_string()))
        }
    }

    fn settings(channel: &str) -> ChannelSettings {
        ChannelSettings {
            channel_id: ChannelId(channel.to_string()),
            language: "id".to_string(),
            use_generation: true,
            read_delay_secs: 1,
            delay_interval_secs: 1,
            use_slow_mode: false,
            use_reply: true,
            persona: None,
            delete: None,
        }
    }

    fn inbound(id: &str, author: &str, content: &str) -> Message {
        Message {
            id: MessageId(id.to_string()),
            author_id: UserId(author.to_string()),
            kind: 0,
            content: content.to_string(),
            attachment_count: 0,
            mentions: Vec::new(),
            referenced_author: None,
            has_reference_pointer: false,
        }
    }

    struct Harness {
        chat: Arc<FakeChat>,
        backend: Arc<FakeBackend>,
        conversations: Arc<ConversationStore>,
        processed: Arc<ProcessedSet>,
        worker: ChannelWorker,
    }

    fn harness(chat: Arc<FakeChat>, backend: Arc<FakeBackend>, settings: ChannelSettings) -> Harness {
        let conversations = Arc::new(ConversationStore::new(7, Duration::from_secs(3600)));
        let processed = Arc::new(ProcessedSet::new());
        let keys = Arc::new(KeyRotator::new(
            vec![Credential("k1".to_string())],
            Duration::from_secs(86_400),
        ));
        let pool = Arc::new(MessagePool::load(Path::new("/nonexistent/pesan.txt")).unwrap());
        let generator = Arc::new(ReplyGenerator::new(
            keys,
            Arc::clone(&backend) as Arc<dyn GenerationClient>,
            pool,
            Duration::from_secs(2),
        ));
        let worker = ChannelWorker::new(
            Arc::clone(&chat) as Arc<dyn ChatPort>,
            generator,
            Arc::clone(&conversations),
            Arc::new(MessageFilter::new()),
            Arc::clone(&processed),
            settings,
            UserId(SELF_ID.to_string()),
        );
        Harness {
            chat,
            backend,
            conversations,
            processed,
            worker,
        }
    }

    fn conversation_key(user: &str, channel: &str) -> ConversationKey {
        ConversationKey {
            user_id: UserId(user.to_string()),
            channel_id: ChannelId(channel.to_string()),
        }
    }

    #[tokio::test]
    async fn answers_and_records_a_qualifying_message() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "hai juga");
        assert_eq!(sent[0].2, Some(MessageId("m1".to_string())));
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);

        let history = h.conversations.history(&conversation_key("u1", "c1")).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_text, "halo kawan");
        assert_eq!(history[0].bot_text, "hai juga");
        assert_eq!(h.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn conversation_history_feeds_the_next_prompt() {
        let chat = FakeChat::scripted(vec![
            Ok(Some(inbound("m1", "u1", "halo kawan"))),
            Ok(Some(inbound("m2", "u1", "apa kabar"))),
        ]);
        let backend = FakeBackend::scripted(vec![
            Ok("balasan satu".to_string()),
            Ok("balasan dua".to_string()),
        ]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;
        h.worker.run_cycle().await;

        let prompts = h.backend.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("conversation history"));
        assert!(prompts[1].contains("User: halo kawan\nYou: balasan satu\n"));
    }

    #[tokio::test]
    async fn already_processed_message_is_ignored() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.processed.insert(MessageId("m1".to_string())).await;
        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn system_notification_is_skipped_without_marking() {
        let mut join = inbound("m1", "u1", "");
        join.kind = SYSTEM_MESSAGE_KIND;
        let chat = FakeChat::scripted(vec![Ok(Some(join.clone())), Ok(Some(join))]);
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;
        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(!h.processed.contains(&MessageId("m1".to_string())).await);
        assert_eq!(h.chat.fetches(), 2);
    }

    #[tokio::test]
    async fn unaddressed_message_is_marked_and_skipped() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "<@111> lihat ini"));
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn message_with_attachments_is_marked_and_skipped() {
        let mut msg = inbound("m1", "u1", "lihat foto ini");
        msg.attachment_count = 2;
        let chat = FakeChat::with_latest(msg);
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);
    }

    #[tokio::test]
    async fn link_message_is_marked_and_skipped() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "cek https://example.com"));
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_language_skips_without_sending() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![]);
        let mut s = settings("c1");
        s.language = "fr".to_string();
        let h = harness(chat, backend, s);

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);
        assert!(h
            .conversations
            .history(&conversation_key("u1", "c1"))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_replaced_with_the_fallback() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![Ok(String::new())]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Maaf, tidak dapat membalas pesan.");
    }

    #[tokio::test]
    async fn echoed_reply_is_not_sent() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![Ok("Halo Kawan".to_string())]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);
        assert!(h
            .conversations
            .history(&conversation_key("u1", "c1"))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn failed_send_records_no_exchange() {
        let mut chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        Arc::get_mut(&mut chat).unwrap().fail_sends = true;
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert!(h.processed.contains(&MessageId("m1".to_string())).await);
        assert!(h
            .conversations
            .history(&conversation_key("u1", "c1"))
            .await
            .is_empty());
        assert!(h.chat.deleted().is_empty());
    }

    #[tokio::test]
    async fn reply_threading_can_be_disabled() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let mut s = settings("c1");
        s.use_reply = false;
        let h = harness(chat, backend, s);

        h.worker.run_cycle().await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, None);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_delete_policy_removes_the_reply() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let mut s = settings("c1");
        s.delete = Some(DeletePolicy::Immediate);
        let h = harness(chat, backend, s);

        h.worker.run_cycle().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.chat.deleted(), vec![MessageId("sent-1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_delete_policy_waits_out_the_delay() {
        let chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let mut s = settings("c1");
        s.delete = Some(DeletePolicy::AfterSecs(30));
        let h = harness(chat, backend, s);

        h.worker.run_cycle().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.chat.deleted().is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.chat.deleted(), vec![MessageId("sent-1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_mode_delay_is_honored() {
        let mut chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        Arc::get_mut(&mut chat).unwrap().slow_mode = Some(7);
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let mut s = settings("c1");
        s.use_slow_mode = true;
        let h = harness(chat, backend, s);

        let before = tokio::time::Instant::now();
        h.worker.run_cycle().await;
        let waited = tokio::time::Instant::now().duration_since(before);

        assert!(waited >= Duration::from_secs(7));
        assert_eq!(h.chat.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_slow_mode_lookup_uses_the_default_delay() {
        let mut chat = FakeChat::with_latest(inbound("m1", "u1", "halo kawan"));
        Arc::get_mut(&mut chat).unwrap().slow_mode = None;
        let backend = FakeBackend::scripted(vec![Ok("hai juga".to_string())]);
        let mut s = settings("c1");
        s.use_slow_mode = true;
        let h = harness(chat, backend, s);

        let before = tokio::time::Instant::now();
        h.worker.run_cycle().await;
        let waited = tokio::time::Instant::now().duration_since(before);

        assert!(waited >= Duration::from_secs(5));
        assert_eq!(h.chat.sent().len(), 1);
    }

    #[tokio::test]
    async fn pool_cycle_posts_without_reading_the_channel() {
        let path =
            std::env::temp_dir().join(format!("drb-worker-pool-{}.txt", std::process::id()));
        std::fs::write(&path, "dari file\n").unwrap();

        let chat = FakeChat::scripted(vec![]);
        let backend = FakeBackend::scripted(vec![]);
        let conversations = Arc::new(ConversationStore::new(7, Duration::from_secs(3600)));
        let keys = Arc::new(KeyRotator::new(
            vec![Credential("k1".to_string())],
            Duration::from_secs(86_400),
        ));
        let generator = Arc::new(ReplyGenerator::new(
            keys,
            Arc::clone(&backend) as Arc<dyn GenerationClient>,
            Arc::new(MessagePool::load(&path).unwrap()),
            Duration::from_secs(2),
        ));
        let mut s = settings("c1");
        s.use_generation = false;
        let worker = ChannelWorker::new(
            Arc::clone(&chat) as Arc<dyn ChatPort>,
            generator,
            conversations,
            Arc::new(MessageFilter::new()),
            Arc::new(ProcessedSet::new()),
            s,
            UserId(SELF_ID.to_string()),
        );

        worker.run_pool_cycle().await;

        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "dari file");
        assert_eq!(sent[0].2, None);
        assert_eq!(chat.fetches(), 0);
        assert_eq!(backend.call_count(), 0);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn fetch_failure_ends_the_cycle_quietly() {
        let chat = FakeChat::scripted(vec![Err(Error::Transport("boom".to_string()))]);
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_channel_ends_the_cycle_quietly() {
        let chat = FakeChat::scripted(vec![Ok(None)]);
        let backend = FakeBackend::scripted(vec![]);
        let h = harness(chat, backend, settings("c1"));

        h.worker.run_cycle().await;

        assert!(h.chat.sent().is_empty());
        assert_eq!(h.backend.call_count(), 0);
    }
}
