use thiserror::Error;

pub type Result<T, E = SwitchyardError> = std::result::Result<T, E>;

/// Startup-time errors.
///
/// Every variant indicates a programming error in controller declarations
/// and is fatal: registration and mounting happen once at boot, so callers
/// are expected to propagate these with `?` rather than recover.
#[derive(Debug, Error)]
pub enum SwitchyardError {
    #[error("path `{path}` must begin with a slash")]
    InvalidPath { path: String },

    #[error("`{controller}` is missing a basepath")]
    MissingBasepath { controller: &'static str },

    #[error(
        "`{controller}` has no materialized router; register it with `Registry::register` before mounting"
    )]
    UnmountableController { controller: &'static str },

    #[error("invalid payload schema: {reason}")]
    InvalidSchema { reason: String },
}
