//! Configuration parsing.
//!
//! Loaded from a TOML file (see `config/docqa.example.toml`). Every section
//! and field has a default, so an empty file, or no file at all, is a
//! valid configuration. [`validate`] rejects values the pipeline cannot run
//! with.
//!
//! ```toml
//! [backend]
//! url = "http://localhost:11434/api/generate"
//! model = "deepseek-r1:1.5b"
//!
//! [retrieval]
//! top_k = 3
//! empty_context = "bare_prompt"   # or "refuse"
//!
//! [embedding]
//! provider = "local"              # "local", "ollama", or "hashed"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

/// The language-model inference endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_backend_model")]
    pub model: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            model: default_backend_model(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:11434/api/generate".to_string()
}
fn default_backend_model() -> String {
    "deepseek-r1:1.5b".to_string()
}
fn default_backend_timeout() -> u64 {
    60
}

/// What to do when an attachment yields no usable passages.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Call the backend with the prompt and a note that the file was empty.
    #[default]
    BarePrompt,
    /// Return an error without calling the backend.
    Refuse,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,
    #[serde(default = "default_image_char_budget")]
    pub image_char_budget: usize,
    #[serde(default)]
    pub empty_context: EmptyContextPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_char_budget: default_context_char_budget(),
            image_char_budget: default_image_char_budget(),
            empty_context: EmptyContextPolicy::default(),
        }
    }
}

fn default_top_k() -> usize {
    docqa_core::retrieve::DEFAULT_TOP_K
}
fn default_context_char_budget() -> usize {
    3000
}
fn default_image_char_budget() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
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
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    if cfg!(feature = "local-embeddings-fastembed") {
        "local".to_string()
    } else {
        "hashed".to_string()
    }
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

/// External tools used by the extractors.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    /// Run OCR on images and text-less PDF pages.
    #[serde(default = "default_true")]
    pub ocr: bool,
    #[serde(default = "default_tesseract")]
    pub tesseract: PathBuf,
    /// `pdftoppm` executable used to rasterise PDF pages for OCR.
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: PathBuf,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    /// LibreOffice (`soffice`) executable for office→PDF conversion.
    /// Conversion is unavailable when unset.
    #[serde(default)]
    pub converter: Option<PathBuf>,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ocr: true,
            tesseract: default_tesseract(),
            pdftoppm: default_pdftoppm(),
            ocr_language: default_ocr_language(),
            ocr_dpi: default_ocr_dpi(),
            converter: None,
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_tesseract() -> PathBuf {
    PathBuf::from("tesseract")
}
fn default_pdftoppm() -> PathBuf {
    PathBuf::from("pdftoppm")
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_ocr_dpi() -> u32 {
    300
}
fn default_tool_timeout() -> u64 {
    120
}

impl EmbeddingConfig {
    pub fn is_local(&self) -> bool {
        self.provider == "local"
    }
}

/// Load configuration from `path`, or defaults when `path` is `None`.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.context_char_budget == 0 || config.retrieval.image_char_budget == 0 {
        anyhow::bail!("retrieval character budgets must be > 0");
    }

    // Validate backend
    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }
    if config.backend.model.trim().is_empty() {
        anyhow::bail!("backend.model must not be empty");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "hashed" | "local" => {}
        "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is 'ollama'");
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'ollama'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or hashed.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    Ok(())
}
