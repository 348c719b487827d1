use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upstream request to `{url}` failed")]
    Upstream {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn upstream(url: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Upstream {
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
