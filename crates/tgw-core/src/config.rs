use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    batcher::MonthBatcher, catalog::PersonaCatalog, context::AnalysisSettings, errors::Error,
    oracle::client::ClassifierConfig, Result,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Typed runtime configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Oracle endpoint
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub oracle_model: String,

    // Retry / concurrency policy
    pub classifier: ClassifierConfig,

    // Prompt and output shaping
    pub analysis: AnalysisSettings,

    pub persona_catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);

        let openai_api_key = env_str("OPENAI_API_KEY").ok_or_else(|| {
            Error::Config("OPENAI_API_KEY environment variable is required".to_string())
        })?;
        let openai_base_url = env_str("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let oracle_model = env_str("ORACLE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let defaults = ClassifierConfig::default();
        let classifier = ClassifierConfig {
            max_concurrency: positive(
                "ORACLE_MAX_CONCURRENCY",
                parse_num(&env_str, "ORACLE_MAX_CONCURRENCY")?,
                defaults.max_concurrency,
            )?,
            max_attempts: positive(
                "ORACLE_MAX_ATTEMPTS",
                parse_num(&env_str, "ORACLE_MAX_ATTEMPTS")?,
                defaults.max_attempts,
            )?,
            base_backoff: parse_num::<u64>(&env_str, "ORACLE_BASE_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff),
            call_timeout: match parse_num::<u64>(&env_str, "ORACLE_CALL_TIMEOUT_MS")? {
                Some(0) => {
                    return Err(Error::Config(
                        "ORACLE_CALL_TIMEOUT_MS must be greater than zero".to_string(),
                    ))
                }
                Some(ms) => Duration::from_millis(ms),
                None => defaults.call_timeout,
            },
        };

        let base = AnalysisSettings::default();
        let analysis = AnalysisSettings {
            batcher: MonthBatcher {
                months_per_batch: positive(
                    "SENTIMENT_BATCH_MONTHS",
                    parse_num(&env_str, "SENTIMENT_BATCH_MONTHS")?,
                    base.batcher.months_per_batch,
                )?,
                max_messages_per_month: positive(
                    "SENTIMENT_MESSAGES_PER_MONTH",
                    parse_num(&env_str, "SENTIMENT_MESSAGES_PER_MONTH")?,
                    base.batcher.max_messages_per_month,
                )?,
            },
            persona_top_terms: positive(
                "PERSONA_TOP_TERMS",
                parse_num(&env_str, "PERSONA_TOP_TERMS")?,
                base.persona_top_terms,
            )?,
            ..base
        };

        let persona_catalog_path = env_str("PERSONA_CATALOG_PATH").map(PathBuf::from);

        Ok(Self {
            openai_api_key,
            openai_base_url,
            oracle_model,
            classifier,
            analysis,
            persona_catalog_path,
        })
    }

    /// The persona catalog: the JSON override when configured, else the built-in one.
    pub fn catalog(&self) -> Result<PersonaCatalog> {
        match &self.persona_catalog_path {
            Some(path) => PersonaCatalog::from_json_file(path),
            None => Ok(PersonaCatalog::builtin()),
        }
    }
}

fn parse_num<T: std::str::FromStr>(
    env_str: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match env_str(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{raw}`"))),
    }
}

fn positive<T: PartialEq + Default>(key: &str, v: Option<T>, default: T) -> Result<T> {
    match v {
        Some(v) if v == T::default() => Err(Error::Config(format!(
            "{key} must be greater than zero"
        ))),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

/// Load `path` into the environment; variables already set are left alone.
fn load_dotenv_if_present(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => debug!(path = %path.display(), "loaded env file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable env file"),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
