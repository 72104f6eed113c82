// ==============================================================================
// error.rs — ERROR TAXONOMY
// ------------------------------------------------------------------------------
// - ConfigError: construction-time failures (bad tuning, bad checkpoint list,
//   unreadable / unparsable config file). Always fatal to construction.
// - GeometryWarning: a collision mesh that could not be registered. The world
//   keeps running without it (worst case: gravity-only free fall).
// - SchedulerError: misuse of the tick source lifecycle.
//
// Transient sensing misses and respawns are NOT errors; they are handled
// inside the ground resolver.
// ==============================================================================

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Validation(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// A static mesh rejected at registration time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryWarning {
    #[error("mesh `{name}` has no triangles")]
    Empty { name: String },

    #[error("mesh `{name}` triangle {triangle} references vertex {index} but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        name: String,
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("mesh `{name}` vertex {vertex} is not finite")]
    NonFiniteVertex { name: String, vertex: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("a tick loop is already driving this simulation")]
    AlreadyRunning,

    #[error("tick rate must be > 0 Hz (got {0})")]
    InvalidTickRate(u32),
}
