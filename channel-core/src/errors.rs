use channel_common::data::DataError;
use thiserror::Error;

/// Error types for the channel detector
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

impl ChannelError {
    pub(crate) fn invalid(name: &str, reason: &str) -> Self {
        ChannelError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
