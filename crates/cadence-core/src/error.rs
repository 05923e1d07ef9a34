use thiserror::Error;

/// Errors raised while loading shared settings.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// A loaded setting is outside the range the engine accepts.
    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
