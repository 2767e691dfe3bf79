use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logger error: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Custom(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Custom(message.to_string())
    }
}
