use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, Result};

pub const DEFAULT_WARN_TIER1_TEMPLATE: &str = "{username}, this chat only hosts comments on channel posts.\n\n\
Please move your message into the comment thread under the relevant post.";

pub const DEFAULT_WARN_TIER2_TEMPLATE: &str = "{username}, repeated off-thread messages will get you muted.\n\n\
Reply under a channel post instead of posting to the chat directly.";

/// Typed, immutable process configuration. Loaded once at startup and shared
/// by reference; nothing mutates it afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    // Core identities
    pub bot_token: String,
    pub group_id: ChatId,
    pub channel_id: ChatId,
    pub admin_id: ChatId,

    // Escalation thresholds: warn tier 1 from the first violation, tier 2
    // from `warn_tier2_at`, restriction from `restrict_at`.
    pub warn_tier2_at: u32,
    pub restrict_at: u32,
    pub warn_tier1_template: String,
    pub warn_tier2_template: String,

    // Restriction duration: base + scale * count seconds.
    pub restrict_base: Duration,
    pub restrict_scale_per_count: Duration,

    // Persistence
    pub db_path: PathBuf,

    // Dispatch / shutdown behavior
    pub dispatch_max_retry_wait: Duration,
    pub drain_timeout: Duration,
    pub admin_cache_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let group_id = ChatId(require_i64("GROUP_ID")?);
        let channel_id = ChatId(require_i64("CHANNEL_ID")?);
        let admin_id = ChatId(require_i64("ADMIN_ID")?);

        let warn_tier2_at = env_u32("WARN_TIER2_AT").unwrap_or(3);
        let restrict_at = env_u32("RESTRICT_AT").unwrap_or(5);
        if warn_tier2_at < 2 {
            return Err(Error::Config(
                "WARN_TIER2_AT must be at least 2 (tier 1 covers count 1)".to_string(),
            ));
        }
        if restrict_at <= warn_tier2_at {
            return Err(Error::Config(format!(
                "RESTRICT_AT ({restrict_at}) must be greater than WARN_TIER2_AT ({warn_tier2_at})"
            )));
        }

        let warn_tier1_template = env_str("WARN_TIER1_TEMPLATE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_WARN_TIER1_TEMPLATE.to_string());
        let warn_tier2_template = env_str("WARN_TIER2_TEMPLATE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_WARN_TIER2_TEMPLATE.to_string());

        let restrict_base = Duration::from_secs(env_u64("RESTRICT_BASE_SECS").unwrap_or(3600));
        let restrict_scale_per_count =
            Duration::from_secs(env_u64("RESTRICT_SCALE_SECS").unwrap_or(0));

        let db_path =
            PathBuf::from(env_str("DB_PATH").unwrap_or_else(|| "data/dgb.sqlite3".to_string()));

        let dispatch_max_retry_wait =
            Duration::from_secs(env_u64("DISPATCH_MAX_RETRY_WAIT_SECS").unwrap_or(30));
        let drain_timeout = Duration::from_secs(env_u64("DRAIN_TIMEOUT_SECS").unwrap_or(10));
        let admin_cache_ttl = Duration::from_secs(env_u64("ADMIN_CACHE_TTL_SECS").unwrap_or(600));

        Ok(Self {
            bot_token,
            group_id,
            channel_id,
            admin_id,
            warn_tier2_at,
            restrict_at,
            warn_tier1_template,
            warn_tier2_template,
            restrict_base,
            restrict_scale_per_count,
            db_path,
            dispatch_max_retry_wait,
            drain_timeout,
            admin_cache_ttl,
        })
    }
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

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn require_i64(key: &str) -> Result<i64> {
    env_str(key)
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
