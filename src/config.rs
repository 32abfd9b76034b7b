use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tmdb::{self, MediaType};

const DEFAULT_ENV_PREFIX: &str = "MOVIEPEDIA";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmdbConfig {
    /// API read access token, sent as a bearer credential.
    #[serde(default)]
    pub access_token: String,
    /// Skips the `/account` lookup when set.
    #[serde(default)]
    pub account_id: Option<u64>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_authenticate_url")]
    pub authenticate_url: String,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            account_id: None,
            base_url: default_base_url(),
            authenticate_url: default_authenticate_url(),
            image_base_url: default_image_base_url(),
            image_size: default_image_size(),
            language: default_language(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    tmdb::DEFAULT_BASE_URL.into()
}

fn default_authenticate_url() -> String {
    tmdb::DEFAULT_AUTHENTICATE_URL.into()
}

fn default_image_base_url() -> String {
    tmdb::DEFAULT_IMAGE_BASE_URL.into()
}

fn default_image_size() -> String {
    tmdb::DEFAULT_IMAGE_SIZE.into()
}

fn default_language() -> String {
    tmdb::DEFAULT_LANGUAGE.into()
}

fn default_user_agent() -> String {
    format!("moviepedia/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_notification_duration", with = "humantime_serde")]
    pub notification_duration: Duration,
    #[serde(default)]
    pub default_media_type: MediaType,
    /// Items from the end of a list at which the next page is requested.
    #[serde(default = "default_load_more_threshold")]
    pub load_more_threshold: usize,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            notification_duration: default_notification_duration(),
            default_media_type: MediaType::Movie,
            load_more_threshold: default_load_more_threshold(),
        }
    }
}

fn default_notification_duration() -> Duration {
    Duration::from_millis(3000)
}

fn default_load_more_threshold() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_auth_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            redirect_uri: default_redirect_uri(),
            poll_interval: default_poll_interval(),
            timeout: default_auth_timeout(),
        }
    }
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:0/moviepedia/approved".into()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

impl AuthConfig {
    pub fn flow_config(&self, authenticate_url: &str) -> crate::auth::Config {
        crate::auth::Config {
            authenticate_url: authenticate_url.to_string(),
            redirect_uri: self.redirect_uri.clone(),
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    let path = options.config_file.clone().or_else(default_config_path);
    if let Some(path) = path {
        if path.exists() {
            let from_file = read_config_file(&path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix));

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Overlays `other` onto `base`. Values still at their defaults in `other`
/// leave `base` untouched.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if !other.tmdb.access_token.is_empty() {
        base.tmdb.access_token = other.tmdb.access_token;
    }
    if other.tmdb.account_id.is_some() {
        base.tmdb.account_id = other.tmdb.account_id;
    }
    if !other.tmdb.base_url.is_empty() && other.tmdb.base_url != defaults.tmdb.base_url {
        base.tmdb.base_url = other.tmdb.base_url;
    }
    if !other.tmdb.authenticate_url.is_empty()
        && other.tmdb.authenticate_url != defaults.tmdb.authenticate_url
    {
        base.tmdb.authenticate_url = other.tmdb.authenticate_url;
    }
    if !other.tmdb.image_base_url.is_empty()
        && other.tmdb.image_base_url != defaults.tmdb.image_base_url
    {
        base.tmdb.image_base_url = other.tmdb.image_base_url;
    }
    if !other.tmdb.image_size.is_empty() && other.tmdb.image_size != defaults.tmdb.image_size {
        base.tmdb.image_size = other.tmdb.image_size;
    }
    if !other.tmdb.language.is_empty() && other.tmdb.language != defaults.tmdb.language {
        base.tmdb.language = other.tmdb.language;
    }
    if !other.tmdb.user_agent.is_empty() && other.tmdb.user_agent != defaults.tmdb.user_agent {
        base.tmdb.user_agent = other.tmdb.user_agent;
    }

    if other.ui.notification_duration != defaults.ui.notification_duration {
        base.ui.notification_duration = other.ui.notification_duration;
    }
    if other.ui.default_media_type != defaults.ui.default_media_type {
        base.ui.default_media_type = other.ui.default_media_type;
    }
    if other.ui.load_more_threshold != defaults.ui.load_more_threshold {
        base.ui.load_more_threshold = other.ui.load_more_threshold;
    }

    if !other.auth.redirect_uri.is_empty() && other.auth.redirect_uri != defaults.auth.redirect_uri
    {
        base.auth.redirect_uri = other.auth.redirect_uri;
    }
    if other.auth.poll_interval != defaults.auth.poll_interval {
        base.auth.poll_interval = other.auth.poll_interval;
    }
    if other.auth.timeout != defaults.auth.timeout {
        base.auth.timeout = other.auth.timeout;
    }

    base
}

fn load_env(prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    let mut cfg = Config::default();
    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }
    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "tmdb.access_token" => cfg.tmdb.access_token = value,
        "tmdb.account_id" => cfg.tmdb.account_id = value.trim().parse::<u64>().ok(),
        "tmdb.base_url" => cfg.tmdb.base_url = value,
        "tmdb.authenticate_url" => cfg.tmdb.authenticate_url = value,
        "tmdb.image_base_url" => cfg.tmdb.image_base_url = value,
        "tmdb.image_size" => cfg.tmdb.image_size = value,
        "tmdb.language" => cfg.tmdb.language = value,
        "tmdb.user_agent" => cfg.tmdb.user_agent = value,
        "ui.notification_duration" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.notification_duration = duration;
            }
        }
        "ui.default_media_type" => {
            if let Some(media_type) = MediaType::parse(&value) {
                cfg.ui.default_media_type = media_type;
            }
        }
        "ui.load_more_threshold" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.ui.load_more_threshold = parsed;
            }
        }
        "auth.redirect_uri" => cfg.auth.redirect_uri = value,
        "auth.poll_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.auth.poll_interval = duration;
            }
        }
        "auth.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.auth.timeout = duration;
            }
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("moviepedia").join("config.yaml"))
}

pub fn save_credentials(
    path: Option<PathBuf>,
    access_token: &str,
    account_id: Option<u64>,
) -> Result<PathBuf> {
    let access_token = access_token.trim();
    anyhow::ensure!(
        !access_token.is_empty(),
        "config: tmdb.access_token is required"
    );

    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };

    cfg.tmdb.access_token = access_token.to_string();
    if account_id.is_some() {
        cfg.tmdb.account_id = account_id;
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(dir: &Path, prefix: &str) -> LoadOptions {
        LoadOptions {
            config_file: Some(dir.join("missing.yaml")),
            env_prefix: Some(prefix.into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(isolated(dir.path(), "MOVIEPEDIA_TEST_DEFAULTS")).unwrap();
        assert_eq!(cfg.ui.notification_duration, Duration::from_millis(3000));
        assert_eq!(cfg.auth.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.tmdb.base_url, tmdb::DEFAULT_BASE_URL);
        assert!(cfg.tmdb.access_token.is_empty());
    }

    #[test]
    fn file_values_survive_env_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "ui:\n  notification_duration: 5s\n  default_media_type: tv\nauth:\n  timeout: 2m\n",
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("MOVIEPEDIA_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.notification_duration, Duration::from_secs(5));
        assert_eq!(cfg.ui.default_media_type, MediaType::Tv);
        assert_eq!(cfg.auth.timeout, Duration::from_secs(120));
    }

    #[test]
    fn save_credentials_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        save_credentials(Some(path.clone()), " token ", Some(42)).unwrap();
        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.tmdb.access_token, "token");
        assert_eq!(saved.tmdb.account_id, Some(42));

        save_credentials(Some(path.clone()), "rotated", None).unwrap();
        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.tmdb.access_token, "rotated");
        assert_eq!(saved.tmdb.account_id, Some(42));
        assert!(save_credentials(Some(path), "  ", None).is_err());
    }

    #[test]
    fn env_overrides() {
        let dir = tempdir().unwrap();
        env::set_var("MOVIEPEDIA_TEST_ENV_TMDB__ACCESS_TOKEN", "from-env");
        env::set_var("MOVIEPEDIA_TEST_ENV_AUTH__POLL_INTERVAL", "250ms");
        let cfg = load(isolated(dir.path(), "MOVIEPEDIA_TEST_ENV")).unwrap();
        env::remove_var("MOVIEPEDIA_TEST_ENV_TMDB__ACCESS_TOKEN");
        env::remove_var("MOVIEPEDIA_TEST_ENV_AUTH__POLL_INTERVAL");

        assert_eq!(cfg.tmdb.access_token, "from-env");
        assert_eq!(cfg.auth.poll_interval, Duration::from_millis(250));
    }
}
