//! Layered configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_PIPELINE__WORKERS=8`). Typed
//! sections fall back to their defaults when a key is absent.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::catalog::{Separators, DEFAULT_KEYWORD_SEPARATOR, DEFAULT_TOPIC_SEPARATOR};
use crate::corpus::DEFAULT_EXTENSIONS;
use crate::sink::OutputFormat;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Loads the config files found in `dir` for the given environment name.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.catalog.separators().map_err(anyhow::Error::from)?;
        if settings.corpus.extensions.is_empty() {
            anyhow::bail!(crate::error::Error::InvalidConfig("corpus.extensions must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub corpus: CorpusSettings,
    pub output: OutputSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub path: String,
    pub topic_separator: String,
    pub keyword_separator: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: "./actualCatalog.txt".to_string(),
            topic_separator: DEFAULT_TOPIC_SEPARATOR.to_string(),
            keyword_separator: DEFAULT_KEYWORD_SEPARATOR.to_string(),
        }
    }
}

impl CatalogSettings {
    pub fn separators(&self) -> crate::error::Result<Separators> {
        Separators::new(self.topic_separator.clone(), self.keyword_separator.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub dir: String,
    pub extensions: Vec<String>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { dir: "./sample_documents".to_string(), extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub path: String,
    pub format: OutputFormat,
    pub truncate: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { path: "classification_results.txt".to_string(), format: OutputFormat::Tabbed, truncate: false }
    }
}

/// How worker outcomes reach the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// Workers append to the shared sink as they go.
    #[default]
    Append,
    /// Workers buffer outcomes; the manager writes them after the final barrier.
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Worker units; the run uses `workers + 1` units in total.
    pub workers: usize,
    pub sink_mode: SinkMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(usize::from).unwrap_or(2).max(1);
        Self { workers, sink_mode: SinkMode::Append }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
