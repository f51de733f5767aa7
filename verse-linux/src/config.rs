//! Load config from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration. File: ~/.config/versebridge/config.toml or /etc/versebridge/config.toml.
/// Env overrides: VERSEBRIDGE_DEVICE_PORT, VERSEBRIDGE_SOURCE_URL, VERSEBRIDGE_FAVORITES_PATH, VERSEBRIDGE_LOG.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Device link TCP port (default 47800).
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    /// Verse source endpoint.
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// How long a sent packet may wait for its ack before counting as failed.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    #[serde(default = "default_inter_message_delay_ms")]
    pub inter_message_delay_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_packet_length")]
    pub packet_length: usize,
    #[serde(default = "default_verse_batch")]
    pub verse_batch: u32,
    #[serde(default = "default_cache_chapters")]
    pub cache_chapters: usize,
    #[serde(default = "default_notify_on_exhaustion")]
    pub notify_on_exhaustion: bool,
    #[serde(default = "default_favorites_path")]
    pub favorites_path: PathBuf,
    /// Log filter used when RUST_LOG is unset (default "info").
    #[serde(default = "default_log")]
    pub log: String,
}

fn default_device_port() -> u16 {
    47800
}
fn default_source_url() -> String {
    "http://labs.bible.org/api/".to_string()
}
fn default_http_timeout_ms() -> u64 {
    20_000
}
fn default_ack_timeout_ms() -> u64 {
    5_000
}
fn default_max_tries() -> u32 {
    verse_core::config::DEFAULT_MAX_TRIES
}
fn default_inter_message_delay_ms() -> u64 {
    verse_core::config::DEFAULT_INTER_MESSAGE_DELAY.as_millis() as u64
}
fn default_retry_delay_ms() -> u64 {
    verse_core::config::DEFAULT_RETRY_DELAY.as_millis() as u64
}
fn default_packet_length() -> usize {
    verse_core::chunk::DEFAULT_PACKET_LENGTH
}
fn default_verse_batch() -> u32 {
    verse_core::chunk::DEFAULT_VERSE_BATCH
}
fn default_cache_chapters() -> usize {
    verse_core::verse::DEFAULT_CACHE_CHAPTERS
}
fn default_notify_on_exhaustion() -> bool {
    true
}
fn default_favorites_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/share/versebridge/favorites.json"),
        None => PathBuf::from("/var/lib/versebridge/favorites.json"),
    }
}
fn default_log() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_port: default_device_port(),
            source_url: default_source_url(),
            http_timeout_ms: default_http_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            max_tries: default_max_tries(),
            inter_message_delay_ms: default_inter_message_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            packet_length: default_packet_length(),
            verse_batch: default_verse_batch(),
            cache_chapters: default_cache_chapters(),
            notify_on_exhaustion: default_notify_on_exhaustion(),
            favorites_path: default_favorites_path(),
            log: default_log(),
        }
    }
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Core settings derived from this config.
    pub fn core(&self) -> verse_core::Config {
        verse_core::Config {
            delivery: verse_core::DeliveryPolicy {
                max_tries: self.max_tries.max(1),
                inter_message_delay: Duration::from_millis(self.inter_message_delay_ms),
                retry_delay: Duration::from_millis(self.retry_delay_ms),
                notify_on_exhaustion: self.notify_on_exhaustion,
            },
            packet_length: self.packet_length,
            verse_batch: self.verse_batch,
            cache_chapters: self.cache_chapters,
        }
    }
}

/// Load config: merge default, then config file (explicit path, else first standard path present), then env vars.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut c = match explicit {
        Some(path) => parse(&std::fs::read_to_string(path)?)?,
        None => load_file().unwrap_or_default(),
    };
    apply_env(&mut c, |key| std::env::var(key).ok());
    Ok(c)
}

pub fn parse(s: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str::<Config>(s)?)
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("VERSEBRIDGE_DEVICE_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.device_port = p;
        }
    }
    if let Some(s) = var("VERSEBRIDGE_SOURCE_URL") {
        c.source_url = s;
    }
    if let Some(s) = var("VERSEBRIDGE_FAVORITES_PATH") {
        c.favorites_path = PathBuf::from(s);
    }
    if let Some(s) = var("VERSEBRIDGE_LOG") {
        c.log = s;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/versebridge/config.toml"));
    }
    out.push(PathBuf::from("/etc/versebridge/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p).map_err(anyhow::Error::from).and_then(|s| parse(&s)) {
                Ok(c) => return Some(c),
                Err(e) => eprintln!("ignoring config {}: {e}", p.display()),
            }
            break;
        }
    }
    None
}
