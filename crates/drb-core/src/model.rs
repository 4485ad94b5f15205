use async_trait::async_trait;

use crate::{domain::Credential, Result};

/// Generation backend port.
///
/// One prompt in, one completion out. Implementations surface the
/// backend's rate-limit refusal as [`crate::Error::RateLimited`] so the
/// caller can rotate credentials; every other failure is
/// [`crate::Error::Transport`].
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn complete(&self, credential: &Credential, prompt: &str) -> Result<String>;
}
