use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportConfig {
    #[serde(default = "default_viewport_width")]
    pub width: u32,
    #[serde(default = "default_viewport_height")]
    pub height: u32,
    #[serde(default = "default_viewport_dpr")]
    pub dpr: u32,
}

fn default_viewport_width() -> u32 {
    728
}

fn default_viewport_height() -> u32 {
    797
}

fn default_viewport_dpr() -> u32 {
    1
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: default_viewport_width(),
            height: default_viewport_height(),
            dpr: default_viewport_dpr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// Application root; every request path is appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub viewport: ViewportConfig,
    /// Case-insensitive markers in the submit response meaning "no such permit".
    #[serde(default = "default_not_found_markers")]
    pub not_found_markers: Vec<String>,
    #[serde(default = "default_ajax_id_prefix")]
    pub ajax_id_prefix: String,
    #[serde(default = "default_ajax_id_digits")]
    pub ajax_id_digits: usize,
}

fn default_base_url() -> String {
    "https://cdplusmobile.marioncountyfl.org/pdswebservices/PROD/webpermitnew/webpermits.dll"
        .to_string()
}

fn default_not_found_markers() -> Vec<String> {
    vec![
        "no matching permit".to_string(),
        "no matching record".to_string(),
    ]
}

fn default_ajax_id_prefix() -> String {
    "17148202878".to_string()
}

fn default_ajax_id_digits() -> usize {
    3
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            viewport: ViewportConfig::default(),
            not_found_markers: default_not_found_markers(),
            ajax_id_prefix: default_ajax_id_prefix(),
            ajax_id_digits: default_ajax_id_digits(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Sent as `Referer`; defaults to the site base URL when unset.
    #[serde(default)]
    pub referer: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".to_string()
}

fn default_accept() -> String {
    "*/*".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            referer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfig {
    /// Maximum number of identifiers walked at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_input_file")]
    pub input_file: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_failures_file")]
    pub failures_file: String,
}

fn default_concurrency() -> usize {
    4
}

fn default_input_file() -> String {
    "permits.json".to_string()
}

fn default_output_file() -> String {
    "permits.jsonl".to_string()
}

fn default_failures_file() -> String {
    "failures.jsonl".to_string()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            limit: None,
            input_file: default_input_file(),
            output_file: default_output_file(),
            failures_file: default_failures_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.site.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "site.baseUrl must be an http(s) URL, got '{}'",
                self.site.base_url
            )));
        }
        if self.site.ajax_id_digits == 0 {
            return Err(Error::Config("site.ajaxIdDigits must be at least 1".to_string()));
        }
        if !self.site.ajax_id_prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "site.ajaxIdPrefix must be decimal digits, got '{}'",
                self.site.ajax_id_prefix
            )));
        }
        if self.crawl.concurrency == 0 {
            return Err(Error::Config("crawl.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.site.base_url.trim().trim_end_matches('/')
    }

    pub fn referer(&self) -> String {
        match self.transport.referer.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => self.base_url().to_string(),
        }
    }
}
