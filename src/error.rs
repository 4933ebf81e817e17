use std::path::PathBuf;

use thiserror::Error;

/// Region-level failures. None of these abort a job: callers degrade to a
/// documented default and move on to the next region.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("degenerate region: crop is {width}x{height}")]
    DegenerateRegion { width: i64, height: i64 },

    #[error("color clustering failed: {0}")]
    ClusteringFailure(String),

    #[error("font asset missing: {}", .0.display())]
    FontAssetMissing(PathBuf),

    #[error("failed to render region: {0}")]
    RenderFailure(String),
}
