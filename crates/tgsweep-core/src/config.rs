use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{errors::Error, Result};

/// What an admin gets after confirming the extra admin prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminPolicy {
    /// Same full teardown as an owner.
    #[default]
    Teardown,
    /// Plain leave (history clear + leave chain).
    Leave,
}

impl AdminPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "teardown" | "delete" => Some(AdminPolicy::Teardown),
            "leave" => Some(AdminPolicy::Leave),
            _ => None,
        }
    }
}

/// Knobs the engine reads. Everything else in [`Config`] belongs to the binary and
/// the adapter.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub dialog_limit: usize,
    pub page_size: usize,
    pub probe_limit: usize,
    /// Upper bound on one participant snapshot. Adapters page internally up to it.
    pub participant_limit: usize,
    /// Pause after every drained page.
    pub page_delay: Duration,
    /// Pause after a container delete or history clear.
    pub settle_delay: Duration,
    pub admin_policy: AdminPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialog_limit: 500,
            page_size: 100,
            probe_limit: 100,
            participant_limit: 10_000,
            page_delay: Duration::from_millis(500),
            settle_delay: Duration::from_millis(1000),
            admin_policy: AdminPolicy::Teardown,
        }
    }
}

/// Typed configuration loaded from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram client credentials
    pub api_id: i32,
    pub api_hash: String,
    pub session_file: PathBuf,

    pub engine: EngineConfig,

    // Rate limiting
    pub min_call_interval: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let api_id = env_str("TG_API_ID")
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("TG_API_ID environment variable is required".to_string()))?;
        let api_id = api_id
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Config(format!("TG_API_ID is not a number: {api_id}")))?;

        let api_hash = env_str("TG_API_HASH").and_then(non_empty).ok_or_else(|| {
            Error::Config("TG_API_HASH environment variable is required".to_string())
        })?;

        let session_file = env_path("TG_SESSION_FILE").unwrap_or_else(|| "tgsweep.session".into());

        let defaults = EngineConfig::default();
        let admin_policy = match env_str("ADMIN_POLICY").and_then(non_empty) {
            Some(raw) => AdminPolicy::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "ADMIN_POLICY must be `teardown` or `leave`, got `{raw}`"
                ))
            })?,
            None => defaults.admin_policy,
        };

        let engine = EngineConfig {
            dialog_limit: env_parse::<usize>("DIALOG_LIMIT").unwrap_or(defaults.dialog_limit),
            page_size: env_parse::<usize>("PAGE_SIZE")
                .unwrap_or(defaults.page_size)
                .clamp(1, 100),
            probe_limit: env_parse::<usize>("PROBE_LIMIT")
                .unwrap_or(defaults.probe_limit)
                .max(1),
            participant_limit: env_parse::<usize>("PARTICIPANT_LIMIT")
                .unwrap_or(defaults.participant_limit)
                .max(1),
            page_delay: env_millis("DRAIN_PAGE_DELAY_MS").unwrap_or(defaults.page_delay),
            settle_delay: env_millis("SETTLE_DELAY_MS").unwrap_or(defaults.settle_delay),
            admin_policy,
        };

        let min_call_interval =
            env_millis("MIN_CALL_INTERVAL_MS").unwrap_or(Duration::from_millis(50));

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/tgsweep-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(true);

        Ok(Self {
            api_id,
            api_hash,
            session_file,
            engine,
            min_call_interval,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let v = v.trim();
        let val = ['"', '\'']
            .iter()
            .find_map(|q| v.strip_prefix(*q)?.strip_suffix(*q))
            .unwrap_or(v);

        out.push((key.to_string(), val.to_string()));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Unparseable values count as unset.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_str(key).and_then(|s| s.trim().parse::<T>().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
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

    #[test]
    fn dotenv_parser_strips_quotes_comments_and_export() {
        let parsed = parse_dotenv(
            "# creds\nTG_API_ID=12345\nexport TG_API_HASH=\"abc def\"\n\nBROKEN\nADMIN_POLICY='leave'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TG_API_ID".to_string(), "12345".to_string()),
                ("TG_API_HASH".to_string(), "abc def".to_string()),
                ("ADMIN_POLICY".to_string(), "leave".to_string()),
            ]
        );
    }

    #[test]
    fn admin_policy_parses_known_values_only() {
        assert_eq!(AdminPolicy::parse("Teardown"), Some(AdminPolicy::Teardown));
        assert_eq!(AdminPolicy::parse(" leave "), Some(AdminPolicy::Leave));
        assert_eq!(AdminPolicy::parse("both"), None);
    }

    #[test]
    fn engine_defaults_match_platform_limits() {
        let d = EngineConfig::default();
        assert_eq!(d.page_size, 100);
        assert_eq!(d.probe_limit, 100);
        assert!(d.participant_limit > 200, "one snapshot must cover large groups");
        assert_eq!(d.page_delay, Duration::from_millis(500));
        assert_eq!(d.settle_delay, Duration::from_secs(1));
        assert_eq!(d.admin_policy, AdminPolicy::Teardown);
    }
}
