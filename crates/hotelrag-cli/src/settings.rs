//! Application settings

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use hotelrag_core::{Error, Result};

const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;
const DEFAULT_MATCH_COUNT: usize = 5;

/// Which service embeds queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Ollama,
    Gemini,
}

/// Which service writes answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Ollama,
    Gemini,
}

/// Which similarity store holds the listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Supabase,
    Qdrant,
    Local,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Supabase => write!(f, "supabase"),
            StoreKind::Qdrant => write!(f, "qdrant"),
            StoreKind::Local => write!(f, "local"),
        }
    }
}

/// Settings of the chat application.
///
/// Adapter-specific settings live with each adapter's config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub threshold: f32,
    pub count: usize,
    pub embedder: EmbedderKind,
    pub generator: GeneratorKind,
    pub store: StoreKind,
    /// JSON Lines export loaded into the local store.
    pub local_store_path: Option<PathBuf>,
    pub extract_filters: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            count: DEFAULT_MATCH_COUNT,
            embedder: EmbedderKind::Ollama,
            generator: GeneratorKind::Gemini,
            store: StoreKind::Supabase,
            local_store_path: None,
            extract_filters: false,
        }
    }
}

impl Settings {
    /// Create settings from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup, falling back to defaults.
    ///
    /// Values are parsed but not cross-checked; call `validate` once any
    /// command-line overrides are applied.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            threshold: parse_var(&lookup, "MATCH_THRESHOLD")?.unwrap_or(defaults.threshold),
            count: parse_var(&lookup, "MATCH_COUNT")?.unwrap_or(defaults.count),
            embedder: kind_var(&lookup, "HOTELRAG_EMBEDDER")?.unwrap_or(defaults.embedder),
            generator: kind_var(&lookup, "HOTELRAG_GENERATOR")?.unwrap_or(defaults.generator),
            store: kind_var(&lookup, "HOTELRAG_STORE")?.unwrap_or(defaults.store),
            local_store_path: lookup("HOTELRAG_LOCAL_STORE_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            extract_filters: match lookup("HOTELRAG_EXTRACT_FILTERS") {
                Some(raw) => parse_flag("HOTELRAG_EXTRACT_FILTERS", &raw)?,
                None => defaults.extract_filters,
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Configuration(format!(
                "Match threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.count == 0 {
            return Err(Error::Configuration("Match count must be positive".to_string()));
        }
        if self.store == StoreKind::Local && self.local_store_path.is_none() {
            return Err(Error::Configuration(
                "The local store needs HOTELRAG_LOCAL_STORE_PATH".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Configuration(format!("{} has an invalid value: {}", key, raw)))
        })
        .transpose()
}

fn kind_var<T: ValueEnum>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            T::from_str(raw.trim(), true)
                .map_err(|_| Error::Configuration(format!("{} has an unknown value: {}", key, raw)))
        })
        .transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Configuration(format!("{} is not a boolean: {}", key, raw))),
    }
}
