/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so the worker
/// loop can handle them consistently (retryable vs skip).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The generation backend refused the credential with a rate-limit
    /// status. Distinguished so the caller can rotate keys instead of
    /// retrying blindly.
    #[error("generation backend rate limited")]
    RateLimited,

    #[error("unsupported reply language: {0}")]
    UnsupportedLanguage(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
