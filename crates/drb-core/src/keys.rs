use std::{collections::HashSet, time::Duration};

use rand::seq::SliceRandom;

use crate::domain::Credential;

/// Rotation over a fixed set of generation API keys.
///
/// Keys that hit the backend's rate limit are set aside until every key is
/// exhausted; then the whole set is released again after `cooldown`. The
/// credential list itself never changes, only the exhausted subset.
pub struct KeyRotator {
    credentials: Vec<Credential>,
    cooldown: Duration,
    exhausted: tokio::sync::Mutex<HashSet<Credential>>,
}

impl KeyRotator {
    /// `credentials` must be non-empty; config validation guarantees this.
    pub fn new(credentials: Vec<Credential>, cooldown: Duration) -> Self {
        Self {
            credentials,
            cooldown,
            exhausted: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    /// A uniformly random usable credential.
    ///
    /// When every credential is exhausted this waits out the cooldown,
    /// forgets all exhaustion marks, and tries again. No fairness between
    /// the remaining keys is promised.
    pub async fn acquire(&self) -> Credential {
        loop {
            {
                let exhausted = self.exhausted.lock().await;
                let available: Vec<&Credential> = self
                    .credentials
                    .iter()
                    .filter(|c| !exhausted.contains(*c))
                    .collect();
                if let Some(credential) = available.choose(&mut rand::thread_rng()) {
                    return (*credential).clone();
                }
            }

            tracing::warn!(
                cooldown_secs = self.cooldown.as_secs(),
                "all generation keys rate limited, waiting out the cooldown"
            );
            tokio::time::sleep(self.cooldown).await;
            self.exhausted.lock().await.clear();
        }
    }

    /// Set a credential aside. Marking one twice is fine.
    pub async fn mark_exhausted(&self, credential: &Credential) {
        self.exhausted.lock().await.insert(credential.clone());
    }
}
