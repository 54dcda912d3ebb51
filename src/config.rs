use crate::types::Profile;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub user_profile: Profile,
    pub chat: ChatConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_site_url")]
    pub base_url: String,
    pub login_link: String,
    pub start_message: String,
    #[serde(default = "default_character_path")]
    pub character_path: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectorConfig {
    #[serde(default = "default_message_block")]
    pub message_block: String,
    #[serde(default = "default_partner_bubble")]
    pub partner_bubble: String,
    #[serde(default = "default_text_node")]
    pub text_node: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_text_input")]
    pub text_input: String,
    #[serde(default = "default_reaction_button")]
    pub reaction_button: String,
    #[serde(default = "default_profile_heading")]
    pub profile_heading: String,
    #[serde(default = "default_profile_bio")]
    pub profile_bio: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_open_delay_ms")]
    pub open_delay_ms: u64,
    #[serde(default = "default_element_timeout_secs")]
    pub element_timeout_secs: u64,
    #[serde(default)]
    pub observe_deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptConfig {
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
    #[serde(default = "default_text_path")]
    pub text_path: PathBuf,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_gemini_base_url(),
            prompt: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            headless: false,
            executable: None,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            message_block: default_message_block(),
            partner_bubble: default_partner_bubble(),
            text_node: default_text_node(),
            image: default_image(),
            text_input: default_text_input(),
            reaction_button: default_reaction_button(),
            profile_heading: default_profile_heading(),
            profile_bio: default_profile_bio(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            open_delay_ms: default_open_delay_ms(),
            element_timeout_secs: default_element_timeout_secs(),
            observe_deadline_secs: None,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            json_path: default_json_path(),
            text_path: default_text_path(),
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn open_delay(&self) -> Duration {
        Duration::from_millis(self.open_delay_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn observe_deadline(&self) -> Option<Duration> {
        self.observe_deadline_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg = Self::parse(&content, env_api_key())?;
        Ok(cfg)
    }

    /// Parses and validates a config. `fallback_key` fills an empty
    /// `gemini.api_key`.
    pub fn parse(content: &str, fallback_key: Option<String>) -> Result<Self> {
        let mut cfg: Config = toml::from_str(content).context("failed to parse config toml")?;

        if cfg.gemini.api_key.trim().is_empty() {
            if let Some(key) = fallback_key {
                cfg.gemini.api_key = key;
            }
        }
        if cfg.gemini.api_key.trim().is_empty() {
            bail!("gemini.api_key is required (or set GEMINI_API_KEY)");
        }
        if cfg.chat.start_message.trim().is_empty() {
            bail!("chat.start_message must not be empty");
        }
        Ok(cfg)
    }
}

fn env_api_key() -> Option<String> {
    std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .ok()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.9
}

fn default_top_p() -> f32 {
    1.0
}

fn default_top_k() -> u32 {
    1
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_site_url() -> String {
    "https://golove.ai/".to_string()
}

fn default_character_path() -> String {
    "character/".to_string()
}

fn default_chat_path() -> String {
    "chat/".to_string()
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from("browser_profile")
}

fn default_message_block() -> String {
    r"body > main > div.relative.overscroll-none.overflow-y-auto.w-full.z-\[15\].pb-\[24px\].pt-\[8px\].flex-1.h-full.mx-auto.px-\[16px\].allow-select > div > div:nth-child(1)".to_string()
}

fn default_partner_bubble() -> String {
    "div.flex.justify-start".to_string()
}

fn default_text_node() -> String {
    "p".to_string()
}

fn default_image() -> String {
    "img".to_string()
}

fn default_text_input() -> String {
    r"body > main > div:nth-child(3) > div > div.w-full.bg-white\/\[4\%\].border.border-white\/\[12\%\].hover\:border-white\/\[30\%\].focus-within\:border-white\/\[30\%\].transition-all.pt-\[8px\].px-\[16px\].rounded-\[16px\] > textarea".to_string()
}

fn default_reaction_button() -> String {
    r"body > main > div:nth-child(3) > div > div.flex.gap-\[16px\].items-end > div > button".to_string()
}

fn default_profile_heading() -> String {
    r"body > main > div > div.flex.justify-between.gap-\[16px\].w-full > div.flex.gap-\[16px\] > div > h4".to_string()
}

fn default_profile_bio() -> String {
    r"body > main > div > div.bg-white\/\[4\%\].rounded-\[16px\].p-\[16px\].flex.flex-col.gap-\[8px\] > p".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_open_delay_ms() -> u64 {
    2000
}

fn default_element_timeout_secs() -> u64 {
    30
}

fn default_json_path() -> PathBuf {
    PathBuf::from("logs.json")
}

fn default_text_path() -> PathBuf {
    PathBuf::from("logs.logs")
}
