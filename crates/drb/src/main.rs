use std::sync::Arc;

use drb_core::{
    chat::port::ChatPort,
    config::Config,
    conversation::{spawn_cleanup_task, ConversationStore},
    filter::MessageFilter,
    generator::ReplyGenerator,
    keys::KeyRotator,
    pool::MessagePool,
    worker::{ChannelWorker, ProcessedSet},
};
use drb_discord::DiscordClient;
use drb_gemini::GeminiClient;

#[tokio::main]
async fn main() -> Result<(), drb_core::Error> {
    drb_core::logging::init("drb")?;

    let cfg = Config::load()?;

    let mut clients: Vec<Arc<dyn ChatPort>> = Vec::new();
    let mut identities = Vec::new();
    for token in &cfg.discord_tokens {
        let client: Arc<dyn ChatPort> = Arc::new(DiscordClient::new(token.clone()));
        let me = client.fetch_self().await?;
        tracing::info!(
            username = %me.username,
            discriminator = %me.discriminator,
            "logged in"
        );
        identities.push(me);
        clients.push(client);
    }

    let keys = Arc::new(KeyRotator::new(
        cfg.gemini_api_keys.clone(),
        cfg.key_cooldown,
    ));
    let backend = Arc::new(GeminiClient::new(cfg.gemini_model.clone()));
    let pool = Arc::new(MessagePool::load(&cfg.message_pool_file)?);
    let generator = Arc::new(ReplyGenerator::new(
        keys,
        backend,
        pool,
        cfg.generation_retry_delay,
    ));
    let conversations = Arc::new(ConversationStore::new(
        cfg.max_conversation_exchanges,
        cfg.conversation_expiry,
    ));
    let filter = Arc::new(MessageFilter::new());
    let processed = Arc::new(ProcessedSet::new());

    tracing::info!(
        max_exchanges = cfg.max_conversation_exchanges,
        expiry_secs = cfg.conversation_expiry.as_secs(),
        "conversation memory configured"
    );

    let cleanup = spawn_cleanup_task(Arc::clone(&conversations), cfg.cleanup_period);

    // Accounts are assigned to channels round-robin.
    let mut workers = Vec::new();
    for (i, settings) in cfg.channels.iter().enumerate() {
        let client = Arc::clone(&clients[i % clients.len()]);
        let identity = &identities[i % identities.len()];

        match client.fetch_channel_info(&settings.channel_id).await {
            Ok(info) => tracing::info!(
                channel = %settings.channel_id.0,
                name = %info.name,
                server = %info.server_name,
                account = %identity.username,
                "watching channel"
            ),
            Err(err) => tracing::warn!(
                channel = %settings.channel_id.0,
                error = %err,
                "channel info lookup failed"
            ),
        }
        tracing::info!(
            channel = %settings.channel_id.0,
            language = %settings.language,
            generation = settings.use_generation,
            slow_mode = settings.use_slow_mode,
            reply = settings.use_reply,
            "channel settings"
        );

        let worker = ChannelWorker::new(
            client,
            Arc::clone(&generator),
            Arc::clone(&conversations),
            Arc::clone(&filter),
            Arc::clone(&processed),
            settings.clone(),
            identity.id.clone(),
        );
        workers.push(tokio::spawn(async move { worker.run().await }));
    }

    for handle in workers {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "channel worker aborted");
        }
    }
    cleanup.abort();

    Ok(())
}
