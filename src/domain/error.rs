use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("candidate pool for `{game}` is empty")]
    EmptyPool { game: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn empty_pool(game: impl Into<String>) -> Self {
        Self::EmptyPool { game: game.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
