use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::frames::FrameSourceError;

/// Failures that stop the station before or while it runs.
#[derive(Debug, Error)]
pub enum StationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frames(#[from] FrameSourceError),
    #[error("cannot open transcript {path}: {source}")]
    Transcript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("console I/O failed: {0}")]
    Console(#[from] io::Error),
}
