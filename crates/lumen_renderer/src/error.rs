//! Renderer error types.

use thiserror::Error;

use crate::scene::SceneError;

/// Errors raised while building scenes or driving render threads.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Spectral data error: {0}")]
    Spectral(#[from] lumen_core::SpectralError),

    #[error("Failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Render worker {0} disconnected")]
    Disconnected(usize),

    #[error("Render pool has no workers")]
    NoWorkers,
}

pub type RenderResult<T> = Result<T, RenderError>;
