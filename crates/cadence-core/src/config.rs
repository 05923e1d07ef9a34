use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub recurrence: RecurrenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Tunables for recurrence evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct RecurrenceConfig {
    /// Reject rules that carry both COUNT and UNTIL.
    pub strict_validation: bool,
    /// Consecutive periods a rule may scan without producing a candidate
    /// before it is treated as empty.
    pub max_empty_periods: u32,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            strict_validation: true,
            max_empty_periods: 1000,
        }
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `.env` file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails,
    /// or if the loaded values are out of range.
    pub fn load() -> Result<Self> {
        let defaults = RecurrenceConfig::default();
        let settings = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("recurrence.strict_validation", defaults.strict_validation)?
            .set_default(
                "recurrence.max_empty_periods",
                i64::from(defaults.max_empty_periods),
            )?
            // Env file, nested keys as `RECURRENCE__MAX_EMPTY_PERIODS`
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        tracing::debug!(
            strict = settings.recurrence.strict_validation,
            max_empty_periods = settings.recurrence.max_empty_periods,
            "Recurrence settings loaded"
        );
        Ok(settings)
    }

    /// ## Summary
    /// Checks value ranges that `serde` cannot express.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidSetting` naming the key if
    /// `recurrence.max_empty_periods` is zero or `logging.level` is blank.
    pub fn validate(&self) -> CoreResult<()> {
        if self.recurrence.max_empty_periods == 0 {
            return Err(CoreError::InvalidSetting {
                key: "recurrence.max_empty_periods",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(CoreError::InvalidSetting {
                key: "logging.level",
                reason: "must name a level or filter directive".to_string(),
            });
        }
        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
