//! TOML configuration.
//!
//! Every section is optional; a missing section takes its defaults, so an
//! empty file (or no file at the default path) yields a usable config with
//! both services disabled.
//!
//! ```toml
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//!
//! [generation]
//! provider = "openai"
//! model = "gpt-3.5-turbo-instruct"
//!
//! [selection]
//! max_paragraphs = 10
//! std_threshold = 0.01
//! ```

use anyhow::{Context, Result};
use docent_core::generation::GenerationParams;
use docent_core::select::SelectionParams;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docent.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub parsing: ParsingConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Texts per HTTP request; larger batches are split into sequential requests.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_num_generations")]
    pub num_generations: usize,
    /// Prompts are cut to their last `prompt_token_limit` tokens.
    #[serde(default = "default_prompt_token_limit")]
    pub prompt_token_limit: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            temperature: default_temperature(),
            num_generations: default_num_generations(),
            prompt_token_limit: default_prompt_token_limit(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn answer_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            num_generations: self.num_generations,
        }
    }

    pub fn summary_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.summary_max_tokens,
            ..self.answer_params()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectionConfig {
    #[serde(default = "default_max_paragraphs")]
    pub max_paragraphs: usize,
    #[serde(default = "default_std_threshold")]
    pub std_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_paragraphs: default_max_paragraphs(),
            std_threshold: default_std_threshold(),
        }
    }
}

impl SelectionConfig {
    pub fn params(&self) -> SelectionParams {
        SelectionParams {
            max_paragraphs: self.max_paragraphs,
            std_threshold: self.std_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParsingConfig {
    /// Lines join a block when the gap above them is at most this many line heights.
    #[serde(default = "default_block_gap_factor")]
    pub block_gap_factor: f32,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            block_gap_factor: default_block_gap_factor(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HighlightConfig {
    #[serde(default = "default_stroke_color")]
    pub stroke_color: [f32; 3],
    #[serde(default = "default_fill_color")]
    pub fill_color: [f32; 3],
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            stroke_color: default_stroke_color(),
            fill_color: default_fill_color(),
            opacity: default_opacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Sessions untouched for this long are dropped. `0` keeps them forever.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl ServerConfig {
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_secs > 0).then(|| Duration::from_secs(self.session_idle_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    96
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tokens() -> usize {
    500
}
fn default_summary_max_tokens() -> usize {
    100
}
fn default_temperature() -> f32 {
    0.3
}
fn default_num_generations() -> usize {
    2
}
fn default_prompt_token_limit() -> usize {
    1900
}
fn default_max_paragraphs() -> usize {
    10
}
fn default_std_threshold() -> f64 {
    0.01
}
fn default_block_gap_factor() -> f32 {
    0.5
}
fn default_stroke_color() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}
fn default_fill_color() -> [f32; 3] {
    [0.0, 45.0 / 255.0, 1.0]
}
fn default_opacity() -> f32 {
    0.15
}
fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_session_idle_secs() -> u64 {
    3600
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file at the default path yields
/// [`Config::default`]. A missing file anywhere else is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<()> {
    // Validate selection
    if config.selection.max_paragraphs == 0 {
        anyhow::bail!("selection.max_paragraphs must be >= 1");
    }
    if !(config.selection.std_threshold > 0.0) {
        anyhow::bail!("selection.std_threshold must be > 0");
    }

    // Validate parsing
    if !(config.parsing.block_gap_factor >= 0.0) {
        anyhow::bail!("parsing.block_gap_factor must be >= 0");
    }

    // Validate highlight
    if !(config.highlight.opacity > 0.0 && config.highlight.opacity <= 1.0) {
        anyhow::bail!("highlight.opacity must be in (0.0, 1.0]");
    }
    let colors = config
        .highlight
        .stroke_color
        .iter()
        .chain(config.highlight.fill_color.iter());
    for component in colors {
        if !(0.0..=1.0).contains(component) {
            anyhow::bail!("highlight colors must have components in [0.0, 1.0]");
        }
    }

    // Validate services
    validate_provider("embedding", &config.embedding.provider, &config.embedding.model)?;
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    validate_provider("generation", &config.generation.provider, &config.generation.model)?;
    if config.generation.num_generations == 0 {
        anyhow::bail!("generation.num_generations must be > 0");
    }
    if config.generation.prompt_token_limit == 0 {
        anyhow::bail!("generation.prompt_token_limit must be > 0");
    }

    Ok(())
}

fn validate_provider(section: &str, provider: &str, model: &Option<String>) -> Result<()> {
    match provider {
        "disabled" => Ok(()),
        "openai" => {
            if model.is_none() {
                anyhow::bail!(
                    "{}.model must be specified when provider is '{}'",
                    section,
                    provider
                );
            }
            Ok(())
        }
        other => anyhow::bail!(
            "Unknown {} provider: '{}'. Must be disabled or openai.",
            section,
            other
        ),
    }
}
