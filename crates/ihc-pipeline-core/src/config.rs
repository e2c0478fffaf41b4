use crate::error::Error;
use chrono::NaiveDate;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://api.ihc-attribution.com/v1/compute_ihc";
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub output_dir: String,
    pub api_url: String,
    pub api_token: Option<String>,
    pub conv_type_id: String,
    pub batch_size: usize,
    /// Score with the local heuristic instead of calling the service.
    pub test_mode: bool,
}

/// Everything the batched scoring path needs, passed explicitly to the
/// orchestrator and the HTTP client.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub api_url: String,
    pub api_token: String,
    pub conv_type_id: String,
    pub batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "challenge.db".to_string(),
            output_dir: "output".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            conv_type_id: "default".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            test_mode: true,
        }
    }
}

impl AppConfig {
    /// Build the scoring configuration for a live run. Fails when no token
    /// is configured or the batch size is zero.
    pub fn scoring_config(&self) -> Result<ScoringConfig, Error> {
        let api_token = self
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig("api_token is required for live scoring".into()))?;
        let scoring = ScoringConfig {
            api_url: self.api_url.clone(),
            api_token,
            conv_type_id: self.conv_type_id.clone(),
            batch_size: self.batch_size,
        };
        scoring.validate()?;
        Ok(scoring)
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Load configuration from an optional `Config.toml` and `IHC_*` environment
/// variables, on top of built-in defaults.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();
    let builder = Config::builder()
        .set_default("db_path", defaults.db_path)?
        .set_default("output_dir", defaults.output_dir)?
        .set_default("api_url", defaults.api_url)?
        .set_default("conv_type_id", defaults.conv_type_id)?
        .set_default("batch_size", defaults.batch_size as i64)?
        .set_default("test_mode", defaults.test_mode)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("IHC").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Inclusive date window applied to `event_date` / `conv_date`.
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, Error> {
        let range = DateRange {
            start: start.map(parse_date).transpose()?,
            end: end.map(parse_date).transpose()?,
        };
        if let (Some(s), Some(e)) = (range.start, range.end) {
            if s > e {
                return Err(Error::InvalidConfig(format!(
                    "start date {} is after end date {}",
                    s, e
                )));
            }
        }
        Ok(range)
    }

    pub fn start_str(&self) -> Option<String> {
        self.start.map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn end_str(&self) -> Option<String> {
        self.end.map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// Suffix used in export file names.
    pub fn file_suffix(&self) -> String {
        match (self.start_str(), self.end_str()) {
            (Some(s), Some(e)) => format!("_{}_to_{}", s, e),
            (Some(s), None) => format!("_from_{}", s),
            (None, Some(e)) => format!("_to_{}", e),
            (None, None) => String::new(),
        }
    }

    /// Human readable form for log lines.
    pub fn describe(&self) -> String {
        match (self.start_str(), self.end_str()) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            (Some(s), None) => format!("from {}", s),
            (None, Some(e)) => format!("to {}", e),
            (None, None) => "all dates".to_string(),
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDate(raw.to_string()))
}
