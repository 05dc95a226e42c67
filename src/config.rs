use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "ROSTER";

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub reading: ReadingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub concurrency: usize,
    pub delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            user_agent: "Mozilla/5.0 (CandidateFetcher/1.0)".to_string(),
            timeout_secs: 10,
            retries: 3,
            backoff_ms: 2000,
            concurrency: 2,
            delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// Extra `kanji<TAB>reading` files, applied over the built-in name dictionary.
    pub dictionaries: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    /// Fixed metadata column order. Defaults to every key seen, sorted.
    pub metadata_columns: Option<Vec<String>>,
    pub bom: bool,
    pub assign_ids: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: PathBuf::from("candidates.csv"),
            metadata_columns: None,
            bom: false,
            assign_ids: true,
        }
    }
}

/// How far a source's printed readings can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredReading {
    /// Readings are printed for this election.
    Official,
    /// Readings may be carried over from an earlier election.
    #[default]
    Stale,
    /// Never look at the readings on this source.
    Ignore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    /// Lower rank wins merge conflicts.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub discover: Option<DiscoverConfig>,
    #[serde(default)]
    pub readings: DeclaredReading,
    pub schema: SchemaConfig,
    #[serde(default)]
    pub party_aliases: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub default_party_aliases: bool,
    /// Constant metadata stamped on every record of this source (e.g. `district = "比例"`).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    pub index_url: String,
    pub href_contains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub entry: String,
    #[serde(default)]
    pub kanji_name: Option<FieldSpec>,
    #[serde(default)]
    pub reading: Option<FieldSpec>,
    #[serde(default)]
    pub party: Option<FieldSpec>,
    #[serde(default)]
    pub status_or_age: Option<FieldSpec>,
    /// One-line listings: named groups `name`, `reading`, `party`, `status`.
    #[serde(default)]
    pub line_pattern: Option<String>,
    #[serde(default)]
    pub page_fields: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub extra: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub scope: Option<ScopeConfig>,
}

/// Region of the page that holds the entries, in document order.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Entries start after the first `heading` element whose text contains this.
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default = "default_heading")]
    pub heading: String,
    /// Entries end at the first entry block whose text starts with one of these.
    #[serde(default)]
    pub stop_prefix: Vec<String>,
    /// Entries end at the first entry block whose text contains one of these.
    #[serde(default)]
    pub stop_contains: Vec<String>,
}

/// Where one value lives inside an entry (or page).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "FieldSpecRepr")]
pub struct FieldSpec {
    /// Relative CSS selector; `None` reads the scope element itself.
    pub selector: Option<String>,
    pub attr: Option<String>,
    pub own_text: bool,
    pub pattern: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldSpecRepr {
    Selector(String),
    Detailed {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        attr: Option<String>,
        #[serde(default)]
        own_text: bool,
        #[serde(default)]
        pattern: Option<String>,
    },
}

impl From<FieldSpecRepr> for FieldSpec {
    fn from(repr: FieldSpecRepr) -> Self {
        match repr {
            FieldSpecRepr::Selector(selector) => FieldSpec {
                selector: Some(selector),
                ..Default::default()
            },
            FieldSpecRepr::Detailed {
                selector,
                attr,
                own_text,
                pattern,
            } => FieldSpec {
                selector,
                attr,
                own_text,
                pattern,
            },
        }
    }
}

fn default_priority() -> u32 {
    100
}

fn default_heading() -> String {
    "h1, h2, h3, h4, h5, h6".to_string()
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    /// Load a TOML file, then apply `ROSTER__SECTION__KEY` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(env_source())
            .build()?;
        let cfg: RunConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let cfg: RunConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::DuplicateSource(source.id.clone()));
            }
            if source.urls.is_empty() && source.discover.is_none() {
                return Err(ConfigError::NoUrls(source.id.clone()));
            }
            if source.schema.kanji_name.is_none() && source.schema.line_pattern.is_none() {
                return Err(ConfigError::MissingNameField(source.id.clone()));
            }
        }
        Ok(())
    }

    pub fn source(&self, id: &str) -> Result<&SourceConfig, ConfigError> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ConfigError::UnknownSource(id.to_string()))
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
