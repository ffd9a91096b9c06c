//! Crate-level error type.

use crate::config::ConfigError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the engine's fallible entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;
