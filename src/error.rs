//! Error types for the print/capture core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, printing, or capturing
#[derive(Error, Debug)]
pub enum Error {
    /// The rendering engine context did not signal readiness in time
    #[error("Render engine did not start within {0:?}")]
    StartupTimeout(Duration),

    /// An operation was requested before the engine context was started
    #[error("Render engine has not been started")]
    NotStarted,

    /// The rendering engine reported a failure while loading content
    #[error("Failed to load content: {0}")]
    Load(String),

    /// Snapshot or scale/pagination computation failed
    #[error("Capture failed: {0}")]
    Capture(String),

    /// The print subsystem failed to emit a page
    #[error("Print failed: {0}")]
    Print(String),

    /// Script evaluation inside the rendered document failed
    #[error("Script execution failed: {0}")]
    Script(String),

    /// The engine thread is no longer running
    #[error("Render engine context is gone")]
    EngineGone,

    /// Generic error
    #[error("{0}")]
    Other(String),
}
