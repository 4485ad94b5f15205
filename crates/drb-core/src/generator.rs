use std::{sync::Arc, time::Duration};

use rand::Rng;

use crate::{
    conversation::Exchange,
    errors::Error,
    keys::KeyRotator,
    model::GenerationClient,
    pool::MessagePool,
    Result,
};

/// Substring patterns that mark a message as asking for the current time.
const TIME_QUESTION_PATTERNS: &[&str] = &[
    "what time",
    "what's the time",
    "what is the time",
    "current time",
    "time now",
    "time is it",
    "got the time",
    "tell me the time",
    "jam berapa",
    "sekarang jam",
    "waktu sekarang",
];

/// Extra completions to request when the backend repeats its previous
/// output, before accepting the repeat anyway.
const DUPLICATE_RETRY_BUDGET: u32 = 3;

/// Everything the generator needs to answer one message.
#[derive(Clone, Debug)]
pub struct ReplyRequest {
    pub text: String,
    pub language: String,
    pub use_generation: bool,
    pub persona: Option<String>,
    pub history: Vec<Exchange>,
}

/// Produces the text to post for a message.
///
/// Three paths: the static pool (generation disabled), a synthesized
/// clock-time answer for time questions, and the model backend for
/// everything else. The backend path never gives up: rate-limited keys
/// rotate through [`KeyRotator`], transport failures retry after a fixed
/// delay, and only an unsupported language surfaces as an error.
pub struct ReplyGenerator {
    keys: Arc<KeyRotator>,
    client: Arc<dyn GenerationClient>,
    pool: Arc<MessagePool>,
    retry_delay: Duration,
    /// Last accepted backend output, for spotting a backend that repeats
    /// itself. Process-wide, not per channel.
    last_reply: tokio::sync::Mutex<Option<String>>,
}

impl ReplyGenerator {
    pub fn new(
        keys: Arc<KeyRotator>,
        client: Arc<dyn GenerationClient>,
        pool: Arc<MessagePool>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            keys,
            client,
            pool,
            retry_delay,
            last_reply: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn generate(&self, req: &ReplyRequest) -> Result<String> {
        if !req.use_generation {
            return Ok(self.pool.random_line());
        }

        if is_time_question(&req.text) {
            tracing::info!(text = %req.text, "time question detected, synthesizing a clock time");
            return Ok(self.time_reply(req).await);
        }

        self.generate_novel(req).await
    }

    /// Answer a time question with a made-up clock time. With a persona the
    /// backend gets one chance to phrase it in character; any failure falls
    /// back to the plain templated sentence.
    async fn time_reply(&self, req: &ReplyRequest) -> String {
        let time = random_clock_time();

        if let Some(persona) = req.persona.as_deref() {
            let prompt = if req.language == "id" {
                format!(
                    "You are {persona}. Seseorang bertanya jam berapa sekarang. \
                     Katakan bahwa sekarang jam {time}. \
                     Jawab dengan gaya khas karaktermu dengan 1 kalimat."
                )
            } else {
                format!(
                    "You are {persona}. Someone asked what time it is. \
                     Tell them it's {time} now. \
                     Answer in your character's style with 1 sentence."
                )
            };

            let credential = self.keys.acquire().await;
            match self.client.complete(&credential, &prompt).await {
                Ok(reply) if !reply.is_empty() => return reply,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "in-character time reply failed, using the plain one");
                }
            }
        }

        if req.language == "id" {
            format!("Sekarang jam {time}.")
        } else {
            format!("It's {time}.")
        }
    }

    async fn generate_novel(&self, req: &ReplyRequest) -> Result<String> {
        let prompt = build_prompt(req)?;
        let mut duplicate_budget = DUPLICATE_RETRY_BUDGET;
        let mut credential = self.keys.acquire().await;

        loop {
            let candidate = match self.client.complete(&credential, &prompt).await {
                Ok(text) => text,
                Err(Error::RateLimited) => {
                    tracing::warn!("generation key rate limited, rotating to another");
                    self.keys.mark_exhausted(&credential).await;
                    credential = self.keys.acquire().await;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        retry_in_secs = self.retry_delay.as_secs(),
                        "generation request failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            let mut last = self.last_reply.lock().await;
            if last.as_deref() == Some(candidate.as_str()) {
                if duplicate_budget > 0 {
                    duplicate_budget -= 1;
                    drop(last);
                    tracing::debug!("backend repeated itself, requesting a fresh completion");
                    continue;
                }
                tracing::warn!("backend keeps repeating itself, accepting the repeat");
            }
            *last = Some(candidate.clone());
            return Ok(candidate);
        }
    }
}

fn build_prompt(req: &ReplyRequest) -> Result<String> {
    let mut prompt = String::new();

    if let Some(persona) = req.persona.as_deref() {
        prompt.push_str(&format!(
            "You are {persona}. Remember this character, but you show this character only if being asked. "
        ));
    }

    if !req.history.is_empty() {
        prompt.push_str("Here's our conversation history (most recent last):\n");
        for exchange in &req.history {
            prompt.push_str(&format!(
                "User: {}\nYou: {}\n",
                exchange.user_text, exchange.bot_text
            ));
        }
        prompt.push_str(
            "\nRemember this context when replying. Keep your response conversational and natural.\n",
        );
    }

    match req.language.as_str() {
        "id" => prompt.push_str(&format!(
            "Balas pesan berikut dalam bahasa Indonesia, dengan mempertahankan konteks percakapan sebelumnya: {}",
            req.text
        )),
        "en" => prompt.push_str(&format!(
            "Reply to the following message in English, maintaining the context of our previous conversation: {}",
            req.text
        )),
        other => return Err(Error::UnsupportedLanguage(other.to_string())),
    }

    prompt.push_str(
        "\n\nBuatlah menjadi 1 kalimat menggunakan bahasa kasual chatting di discord tanpa huruf kapital dan jangan selalu pakai emoticon",
    );

    Ok(prompt)
}

fn is_time_question(text: &str) -> bool {
    let lower = text.to_lowercase();
    TIME_QUESTION_PATTERNS.iter().any(|p| lower.contains(p))
}

fn random_clock_time() -> String {
    let mut rng = rand::thread_rng();
    let hour: u8 = rng.gen_range(1..=12);
    let minute: u8 = rng.gen_range(0..=59);
    let suffix = ["AM", "PM"][rng.gen_range(0..2)];
    format!("{hour}:{minute:02} {suffix}")
}
