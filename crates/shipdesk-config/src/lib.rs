use serde::{Deserialize, Serialize};
use shipdesk_api::DEFAULT_API_URL;
use shipdesk_batch::{
    DEFAULT_PRINT_CONCURRENCY, DEFAULT_SYNC_POLL_INTERVAL, DEFAULT_SYNC_TIMEOUT, MAX_PRINT_BATCH,
};
use shipdesk_listing::{
    DEFAULT_CARD_WIDTH, DEFAULT_CLIPBOARD_REJECT_TTL, DEFAULT_CONTINUATION_ROWS,
    DEFAULT_INITIAL_ROWS, DEFAULT_MAX_PAGE_SIZE, DEFAULT_RESERVED_WIDTH, DEFAULT_SCAN_PAGE_SIZE,
    DEFAULT_SCROLL_THRESHOLD, DEFAULT_SCROLL_THROTTLE,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_SHIPDESK_CONFIG: &str = "SHIPDESK_CONFIG";

const MIN_SCROLL_THRESHOLD: f64 = 0.1;
/// Scroll progress never exceeds 1.0 and the trigger needs it strictly above
/// the threshold.
const MAX_SCROLL_THRESHOLD: f64 = 0.99;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipdeskConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub scroll: ScrollSection,
    #[serde(default)]
    pub batch: BatchSection,
    #[serde(default)]
    pub scan: ScanSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiSection {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

/// Card grid geometry used to size list pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutSection {
    #[serde(default = "default_reserved_width")]
    pub reserved_width: u32,
    #[serde(default = "default_card_width")]
    pub card_width: u32,
    #[serde(default = "default_initial_rows")]
    pub initial_rows: usize,
    #[serde(default = "default_continuation_rows")]
    pub continuation_rows: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            reserved_width: default_reserved_width(),
            card_width: default_card_width(),
            initial_rows: default_initial_rows(),
            continuation_rows: default_continuation_rows(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrollSection {
    #[serde(default = "default_scroll_threshold")]
    pub threshold: f64,
    #[serde(default = "default_scroll_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for ScrollSection {
    fn default() -> Self {
        Self {
            threshold: default_scroll_threshold(),
            throttle_ms: default_scroll_throttle_ms(),
        }
    }
}

impl ScrollSection {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSection {
    #[serde(default = "default_print_chunk_size")]
    pub print_chunk_size: usize,
    #[serde(default = "default_print_concurrency")]
    pub print_concurrency: usize,
    #[serde(default = "default_sync_poll_interval_secs")]
    pub sync_poll_interval_secs: u64,
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            print_chunk_size: default_print_chunk_size(),
            print_concurrency: default_print_concurrency(),
            sync_poll_interval_secs: default_sync_poll_interval_secs(),
            sync_timeout_secs: default_sync_timeout_secs(),
        }
    }
}

impl BatchSection {
    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync_poll_interval_secs)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanSection {
    #[serde(default = "default_scan_page_size")]
    pub page_size: usize,
    #[serde(default = "default_clipboard_reject_ttl_secs")]
    pub clipboard_reject_ttl_secs: u64,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            page_size: default_scan_page_size(),
            clipboard_reject_ttl_secs: default_clipboard_reject_ttl_secs(),
        }
    }
}

impl ScanSection {
    pub fn clipboard_reject_ttl(&self) -> Duration {
        Duration::from_secs(self.clipboard_reject_ttl_secs)
    }
}

pub fn load_from_env() -> Result<ShipdeskConfig, ConfigError> {
    let path = config_path_from_env()?;
    load_from_path(path)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ShipdeskConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

/// Path `load_from_env` reads, honoring `SHIPDESK_CONFIG`.
pub fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_SHIPDESK_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "SHIPDESK_CONFIG contained invalid UTF-8",
        )),
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("shipdesk").join("config.toml"))
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn default_api_base_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_reserved_width() -> u32 {
    DEFAULT_RESERVED_WIDTH
}

fn default_card_width() -> u32 {
    DEFAULT_CARD_WIDTH
}

fn default_initial_rows() -> usize {
    DEFAULT_INITIAL_ROWS
}

fn default_continuation_rows() -> usize {
    DEFAULT_CONTINUATION_ROWS
}

fn default_max_page_size() -> usize {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_scroll_threshold() -> f64 {
    DEFAULT_SCROLL_THRESHOLD
}

fn default_scroll_throttle_ms() -> u64 {
    u64::try_from(DEFAULT_SCROLL_THROTTLE.as_millis()).unwrap_or(u64::MAX)
}

fn default_print_chunk_size() -> usize {
    MAX_PRINT_BATCH
}

fn default_print_concurrency() -> usize {
    DEFAULT_PRINT_CONCURRENCY
}

fn default_sync_poll_interval_secs() -> u64 {
    DEFAULT_SYNC_POLL_INTERVAL.as_secs()
}

fn default_sync_timeout_secs() -> u64 {
    DEFAULT_SYNC_TIMEOUT.as_secs()
}

fn default_scan_page_size() -> usize {
    DEFAULT_SCAN_PAGE_SIZE
}

fn default_clipboard_reject_ttl_secs() -> u64 {
    DEFAULT_CLIPBOARD_REJECT_TTL.as_secs()
}

fn persist_config(path: &Path, config: &ShipdeskConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize SHIPDESK_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write SHIPDESK_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<ShipdeskConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for SHIPDESK_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = ShipdeskConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read SHIPDESK_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: ShipdeskConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse SHIPDESK_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    if normalize_config(&mut config) {
        persist_config(path, &config)?;
    }

    Ok(config)
}

/// Clamps every value into its supported range. Returns `true` when anything
/// changed.
pub fn normalize_config(config: &mut ShipdeskConfig) -> bool {
    let mut changed = false;

    changed |= normalize_base_url(&mut config.api.base_url);
    changed |= normalize_layout_config(&mut config.layout);
    changed |= normalize_scroll_config(&mut config.scroll);
    changed |= normalize_batch_config(&mut config.batch);
    changed |= normalize_scan_config(&mut config.scan);

    changed
}

fn normalize_base_url(value: &mut String) -> bool {
    let trimmed = value.trim().trim_end_matches('/');
    let normalized = if trimmed.is_empty() {
        default_api_base_url()
    } else {
        trimmed.to_owned()
    };
    if normalized != *value {
        *value = normalized;
        return true;
    }
    false
}

pub fn normalize_layout_config(config: &mut LayoutSection) -> bool {
    let mut changed = false;

    if config.card_width == 0 {
        config.card_width = default_card_width();
        changed = true;
    }
    changed |= clamp_field(&mut config.initial_rows, 1, 50);
    changed |= clamp_field(&mut config.continuation_rows, 1, 50);
    changed |= clamp_field(&mut config.max_page_size, 1, 500);

    changed
}

pub fn normalize_scroll_config(config: &mut ScrollSection) -> bool {
    let mut changed = false;

    let normalized_threshold = if config.threshold.is_finite() {
        config.threshold.clamp(MIN_SCROLL_THRESHOLD, MAX_SCROLL_THRESHOLD)
    } else {
        default_scroll_threshold()
    };
    if normalized_threshold != config.threshold {
        config.threshold = normalized_threshold;
        changed = true;
    }
    changed |= clamp_field(&mut config.throttle_ms, 0, 5_000);

    changed
}

pub fn normalize_batch_config(config: &mut BatchSection) -> bool {
    let mut changed = false;

    changed |= clamp_field(&mut config.print_chunk_size, 1, MAX_PRINT_BATCH);
    changed |= clamp_field(&mut config.print_concurrency, 1, 8);
    changed |= clamp_field(&mut config.sync_poll_interval_secs, 1, 60);
    changed |= clamp_field(&mut config.sync_timeout_secs, 10, 1_800);

    changed
}

pub fn normalize_scan_config(config: &mut ScanSection) -> bool {
    let mut changed = false;

    changed |= clamp_field(&mut config.page_size, 1, 100);
    changed |= clamp_field(&mut config.clipboard_reject_ttl_secs, 1, 3_600);

    changed
}

fn clamp_field<T: Ord + Copy>(value: &mut T, min: T, max: T) -> bool {
    let normalized = (*value).clamp(min, max);
    if normalized != *value {
        *value = normalized;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipdesk_listing::{ScrollMetrics, ScrollTrigger, ScrollTriggerConfig};
    use std::sync::{Mutex, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tokio::time::Instant;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env_vars<F>(vars: &[(&str, Option<&str>)], test: F)
    where
        F: FnOnce(),
    {
        let _guard = env_lock().lock().expect("env lock");
        let backup = vars
            .iter()
            .map(|(name, _)| ((*name).to_owned(), std::env::var(name).ok()))
            .collect::<Vec<_>>();

        for (name, value) in vars {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }

        test();

        for (name, value) in backup {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "shipdesk-config-{prefix}-{nanos}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    fn remove_temp_path(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    fn write_config_file(path: &Path, raw: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture config parent");
        }
        std::fs::write(path, raw.as_bytes()).expect("write fixture config");
    }

    #[test]
    fn load_from_env_creates_default_config_when_missing() {
        let home = unique_temp_dir("home-defaults");
        let expected = home.join(".config").join("shipdesk").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("USERPROFILE", None),
                (ENV_SHIPDESK_CONFIG, None),
            ],
            || {
                let config = load_from_env().expect("load defaults");
                assert_eq!(config, ShipdeskConfig::default());
                assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
                assert_eq!(config.batch.print_chunk_size, 20);
                assert!(expected.exists());
            },
        );

        remove_temp_path(&home);
    }

    #[test]
    fn load_from_env_honors_explicit_config_path() {
        let home = unique_temp_dir("home-explicit-path");
        let root = unique_temp_dir("explicit-path");
        let explicit = root.join("nested").join("custom.toml");
        let default = home.join(".config").join("shipdesk").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("USERPROFILE", None),
                (
                    ENV_SHIPDESK_CONFIG,
                    Some(explicit.to_str().expect("config path")),
                ),
            ],
            || {
                load_from_env().expect("load explicit path config");
                assert!(explicit.exists());
                assert!(!default.exists());
            },
        );

        remove_temp_path(&home);
        remove_temp_path(&root);
    }

    #[test]
    fn blank_env_path_falls_back_to_default_location() {
        let home = unique_temp_dir("home-blank-env");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("USERPROFILE", None),
                (ENV_SHIPDESK_CONFIG, Some("   ")),
            ],
            || {
                let path = config_path_from_env().expect("resolve path");
                assert_eq!(
                    path,
                    home.join(".config").join("shipdesk").join("config.toml")
                );
            },
        );

        remove_temp_path(&home);
    }

    #[test]
    fn partial_file_is_filled_with_defaults() {
        let root = unique_temp_dir("partial");
        let path = root.join("config.toml");
        write_config_file(
            &path,
            r#"
[api]
base_url = "https://packing.example.com"

[layout]
card_width = 240
"#,
        );

        let config = load_from_path(&path).expect("load partial config");

        assert_eq!(config.api.base_url, "https://packing.example.com");
        assert_eq!(config.layout.card_width, 240);
        assert_eq!(config.layout.initial_rows, 4);
        assert_eq!(config.scroll.throttle(), Duration::from_millis(150));
        assert_eq!(config.scan.clipboard_reject_ttl(), Duration::from_secs(30));

        remove_temp_path(&root);
    }

    #[test]
    fn out_of_range_values_are_clamped_and_persisted() {
        let root = unique_temp_dir("clamp");
        let path = root.join("config.toml");
        write_config_file(
            &path,
            r#"
[api]
base_url = "https://packing.example.com/"

[scroll]
threshold = 3.5

[batch]
print_chunk_size = 50
print_concurrency = 0
sync_timeout_secs = 1
"#,
        );

        let config = load_from_path(&path).expect("load config");

        assert_eq!(config.api.base_url, "https://packing.example.com");
        assert_eq!(config.scroll.threshold, MAX_SCROLL_THRESHOLD);
        assert_eq!(config.batch.print_chunk_size, 20);
        assert_eq!(config.batch.print_concurrency, 1);
        assert_eq!(config.batch.sync_timeout(), Duration::from_secs(10));

        let persisted = std::fs::read_to_string(&path).expect("read persisted config");
        assert!(persisted.contains("print_chunk_size = 20"));
        assert!(!persisted.contains("print_chunk_size = 50"));

        remove_temp_path(&root);
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let root = unique_temp_dir("invalid");
        let path = root.join("config.toml");
        write_config_file(&path, "[layout\ncard_width = ");

        let error = load_from_path(&path).expect_err("invalid toml");

        assert!(error.to_string().contains("Failed to parse SHIPDESK_CONFIG"));
        remove_temp_path(&root);
    }

    #[test]
    fn normalize_reports_no_change_for_defaults() {
        let mut config = ShipdeskConfig::default();
        assert!(!normalize_config(&mut config));
    }

    #[test]
    fn full_threshold_is_pulled_below_bottom_of_scroll() {
        let mut scroll = ScrollSection {
            threshold: 1.0,
            ..ScrollSection::default()
        };

        assert!(normalize_scroll_config(&mut scroll));
        assert!(scroll.threshold < 1.0);

        let mut trigger = ScrollTrigger::new(ScrollTriggerConfig {
            threshold: scroll.threshold,
            throttle: scroll.throttle(),
        });
        let bottom = ScrollMetrics::new(1600.0, 400.0, 2000.0);
        assert!(trigger.observe("window", bottom, true, Instant::now()));
    }

    #[test]
    fn defaults_follow_engine_constants() {
        let config = ShipdeskConfig::default();

        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.layout.card_width, DEFAULT_CARD_WIDTH);
        assert_eq!(config.layout.initial_rows, DEFAULT_INITIAL_ROWS);
        assert_eq!(config.scroll.threshold, DEFAULT_SCROLL_THRESHOLD);
        assert_eq!(config.scroll.throttle(), DEFAULT_SCROLL_THROTTLE);
        assert_eq!(config.batch.print_chunk_size, MAX_PRINT_BATCH);
        assert_eq!(config.batch.sync_poll_interval(), DEFAULT_SYNC_POLL_INTERVAL);
        assert_eq!(config.batch.sync_timeout(), DEFAULT_SYNC_TIMEOUT);
        assert_eq!(config.scan.page_size, DEFAULT_SCAN_PAGE_SIZE);
        assert_eq!(config.scan.clipboard_reject_ttl(), DEFAULT_CLIPBOARD_REJECT_TTL);
    }
}
