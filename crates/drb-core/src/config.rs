use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{ChannelSettings, Credential},
    errors::Error,
    Result,
};

/// Typed configuration, loaded once at startup.
///
/// Everything comes from the environment (plus an optional `.env` file) and
/// from the channels file; nothing is prompted interactively.
#[derive(Clone, Debug)]
pub struct Config {
    /// Discord account tokens. Channels are assigned to accounts
    /// round-robin in file order.
    pub discord_tokens: Vec<String>,
    pub gemini_api_keys: Vec<Credential>,
    pub gemini_model: String,
    pub channels: Vec<ChannelSettings>,
    pub message_pool_file: PathBuf,

    pub max_conversation_exchanges: usize,
    pub conversation_expiry: Duration,
    pub cleanup_period: Duration,
    pub key_cooldown: Duration,
    pub generation_retry_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let discord_tokens = {
            let many = parse_csv(env_str("DISCORD_TOKENS"));
            if many.is_empty() {
                env_str("DISCORD_TOKEN")
                    .and_then(non_empty)
                    .map(|t| vec![t])
                    .unwrap_or_default()
            } else {
                many
            }
        };
        if discord_tokens.is_empty() {
            return Err(Error::Config(
                "DISCORD_TOKENS (or DISCORD_TOKEN) environment variable is required".to_string(),
            ));
        }

        let gemini_api_keys: Vec<Credential> = parse_csv(env_str("GEMINI_API_KEYS"))
            .into_iter()
            .map(Credential)
            .collect();
        if gemini_api_keys.is_empty() {
            return Err(Error::Config(
                "GEMINI_API_KEYS environment variable is required".to_string(),
            ));
        }

        let gemini_model =
            env_str("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash-latest".to_string());

        let channels_file =
            env_path("CHANNELS_FILE").unwrap_or_else(|| PathBuf::from("channels.json"));
        let channels = load_channels(&channels_file)?;
        if channels.is_empty() {
            return Err(Error::Config(format!(
                "no channels configured in {}",
                channels_file.display()
            )));
        }

        let message_pool_file =
            env_path("MESSAGE_POOL_FILE").unwrap_or_else(|| PathBuf::from("pesan.txt"));

        let max_conversation_exchanges = env_usize("CONVERSATION_MAX_EXCHANGES").unwrap_or(7);
        let conversation_expiry =
            Duration::from_secs(env_u64("CONVERSATION_EXPIRY_SECS").unwrap_or(3600));
        let cleanup_period = Duration::from_secs(env_u64("CLEANUP_PERIOD_SECS").unwrap_or(3600));
        let key_cooldown = Duration::from_secs(env_u64("KEY_COOLDOWN_SECS").unwrap_or(86_400));
        let generation_retry_delay =
            Duration::from_secs(env_u64("GENERATION_RETRY_DELAY_SECS").unwrap_or(2));

        Ok(Self {
            discord_tokens,
            gemini_api_keys,
            gemini_model,
            channels,
            message_pool_file,
            max_conversation_exchanges,
            conversation_expiry,
            cleanup_period,
            key_cooldown,
            generation_retry_delay,
        })
    }
}

/// Read and parse the channels file (a JSON array of channel settings).
pub fn load_channels(path: &Path) -> Result<Vec<ChannelSettings>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read channels file {}: {e}", path.display()))
    })?;
    let channels: Vec<ChannelSettings> = serde_json::from_str(&contents).map_err(|e| {
        Error::Config(format!("invalid channels file {}: {e}", path.display()))
    })?;
    Ok(channels)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeletePolicy;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("drb-config-{}-{name}", std::process::id()))
    }

    #[test]
    fn parse_csv_trims_and_drops_empty_entries() {
        let got = parse_csv(Some(" a , ,b,,c ".to_string()));
        assert_eq!(got, vec!["a", "b", "c"]);
        assert!(parse_csv(None).is_empty());
        assert!(parse_csv(Some(" , ".to_string())).is_empty());
    }

    #[test]
    fn load_channels_parses_full_entries() {
        let path = temp_path("full.json");
        fs::write(
            &path,
            r#"[
                {
                    "channel_id": "111",
                    "language": "id",
                    "use_generation": true,
                    "read_delay_secs": 5,
                    "delay_interval_secs": 15,
                    "use_slow_mode": true,
                    "use_reply": true,
                    "persona": "a medieval knight",
                    "delete": {"after_secs": 60}
                },
                {"channel_id": "222", "language": "en"}
            ]"#,
        )
        .unwrap();

        let channels = load_channels(&path).unwrap();
        assert_eq!(channels.len(), 2);
        assert!(channels[0].use_generation);
        assert_eq!(channels[0].persona.as_deref(), Some("a medieval knight"));
        assert_eq!(channels[0].delete, Some(DeletePolicy::AfterSecs(60)));
        assert!(!channels[1].use_generation);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn load_channels_reports_missing_file_as_config_error() {
        let err = load_channels(Path::new("/nonexistent/channels.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_channels_reports_bad_json_as_config_error() {
        let path = temp_path("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_channels(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        fs::remove_file(&path).ok();
    }
}
