use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronhiveError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CronhiveError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            CronhiveError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CronhiveError>;
