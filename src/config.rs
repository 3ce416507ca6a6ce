//! Server configuration
//!
//! Defaults are overridden by environment variables (a `.env` file is loaded
//! by the binary before this runs). Overrides go through a resolver closure so
//! tests never touch the process environment.

use std::path::PathBuf;
use std::time::Duration;

/// Matches Google Drive share links embedded in attachment metadata
pub const DEFAULT_LINK_PATTERN: &str = r#"https://drive\.google\.com/[^\s'"]+"#;

/// Settings for the external value generation service
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub api_base: String,
    /// Bearer token; generation fails fast when absent
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Upper bound on a single generation call
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Security and resource configuration for the form fill server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory that downloads and filled outputs are written to
    pub work_dir: PathBuf,
    /// Directories caller-supplied paths must live in (empty allows all)
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes (default: 100MB)
    pub max_download_bytes: u64,
    /// Timeout for every fetch (default: 30s)
    pub fetch_timeout: Duration,
    /// Regex locating PDF links inside attachment metadata
    pub attachment_link_pattern: String,
    /// Value generation service
    pub generation: GenerationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("mcp_pdfs"),
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            fetch_timeout: Duration::from_secs(30),
            attachment_link_pattern: DEFAULT_LINK_PATTERN.to_string(),
            generation: GenerationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from `env`; unparsable values are logged and ignored.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("FORM_FILL_WORK_DIR") {
            self.work_dir = PathBuf::from(v);
        }
        if let Some(v) = env("FORM_FILL_RESOURCE_DIRS") {
            self.resource_dirs = v
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = env("FORM_FILL_ALLOW_PRIVATE_URLS") {
            match v.parse() {
                Ok(b) => self.allow_private_urls = b,
                Err(_) => warn_invalid("FORM_FILL_ALLOW_PRIVATE_URLS", &v),
            }
        }
        if let Some(v) = env("FORM_FILL_MAX_DOWNLOAD_BYTES") {
            match v.parse() {
                Ok(n) => self.max_download_bytes = n,
                Err(_) => warn_invalid("FORM_FILL_MAX_DOWNLOAD_BYTES", &v),
            }
        }
        if let Some(v) = env("FORM_FILL_FETCH_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.fetch_timeout = Duration::from_secs(n),
                Err(_) => warn_invalid("FORM_FILL_FETCH_TIMEOUT_SECS", &v),
            }
        }
        if let Some(v) = env("FORM_FILL_LINK_PATTERN") {
            self.attachment_link_pattern = v;
        }

        // Generation
        if let Some(v) = env("OPENAI_BASE_URL") {
            self.generation.api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = env("OPENAI_API_KEY") {
            if !v.is_empty() {
                self.generation.api_key = Some(v);
            }
        }
        if let Some(v) = env("FORM_FILL_MODEL") {
            self.generation.model = v;
        }
        if let Some(v) = env("FORM_FILL_GENERATION_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.generation.timeout = Duration::from_secs(n),
                Err(_) => warn_invalid("FORM_FILL_GENERATION_TIMEOUT_SECS", &v),
            }
        }
    }
}

fn warn_invalid(var: &str, value: &str) {
    tracing::warn!(var, value, "ignoring invalid env override");
}
