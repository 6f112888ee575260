use thiserror::Error;

use crate::{
    application::ports::{CatalogError, ImageFetchError},
    domain::{error::DomainError, types::MediaId},
    infra::error::InfraError,
};

/// Why no daily response could be produced for a cache key.
///
/// Nothing is cached when assembly fails, so the next request starts over.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("no candidate could back the {game} game")]
    Unbuildable { game: String },
}

impl AssemblyError {
    pub fn unbuildable(game: impl Into<String>) -> Self {
        Self::Unbuildable { game: game.into() }
    }
}

#[derive(Debug, Error)]
pub enum PosterImageError {
    #[error("media {media_id} has no poster image")]
    NotFound { media_id: MediaId },
    #[error("poster source could not be fetched: {0}")]
    Upstream(#[from] ImageFetchError),
    #[error("poster source could not be decoded: {0}")]
    Decode(String),
    #[error("poster variant could not be rendered: {0}")]
    Render(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl PosterImageError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn render(err: impl std::fmt::Display) -> Self {
        Self::Render(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    PosterImage(#[from] PosterImageError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// The error followed by each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}
