use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

use crate::semantic::DEFAULT_LIMIT;

const CONFIG_FILE: &str = "config.yaml";

/// Default completion model
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Default embedding model for the OpenAI-compatible provider
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Default provider request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which vendor API backs the AI capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiServiceConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Empty key means no provider is configured
    #[serde(default)]
    pub api_key: String,

    /// Model used for completions
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Override for the vendor API base url (proxies, self-hosted gateways)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorDbConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Relative paths resolve against the base directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
            default_limit: DEFAULT_LIMIT,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> String {
    "vector_db".to_string()
}

fn default_search_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_notes_dir() -> String {
    "notes".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ai_service: AiServiceConfig,
    #[serde(default)]
    pub vector_db: VectorDbConfig,
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_service: AiServiceConfig::default(),
            vector_db: VectorDbConfig::default(),
            notes_dir: default_notes_dir(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// `NOTEDEX_DIR`, or `~/.local/share/notedex`.
    pub fn default_base_path() -> anyhow::Result<PathBuf> {
        if let Ok(dir) = std::env::var("NOTEDEX_DIR") {
            return Ok(PathBuf::from(dir));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;

        Ok(home.join(".local/share/notedex"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.ai_service.timeout_secs == 0 {
            bail!("ai_service.timeout_secs must be greater than 0");
        }

        if self.vector_db.default_limit == 0 {
            bail!("vector_db.default_limit must be greater than 0");
        }

        if self.vector_db.db_path.trim().is_empty() {
            bail!("vector_db.db_path must not be empty");
        }

        Ok(())
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path).with_context(|| {
            format!("Failed to create base directory {}", base_path.display())
        })?;

        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            let mut config = Self::default();
            config.base_path = base_path.to_path_buf();
            config.save()?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", config_path.display()))?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = self.base_path.join(CONFIG_FILE);
        let temp_path = self.base_path.join(format!("{CONFIG_FILE}.tmp"));

        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(&temp_path, config_str.as_bytes())
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &config_path)
            .with_context(|| format!("Failed to replace {}", config_path.display()))?;

        Ok(())
    }

    /// Replace the api key with one taken from the environment. Never persisted.
    pub fn apply_api_key_override(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.ai_service.api_key = key;
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn vector_db_dir(&self) -> PathBuf {
        self.resolve(&self.vector_db.db_path)
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.resolve(&self.notes_dir)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
