use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Slice is empty, nothing to draw")]
    EmptySlice,

    #[error("Canvas of {width}x{height} pixels is too small for the plot")]
    CanvasTooSmall { width: u32, height: u32 },

    #[error("Unknown colormap '{0}'")]
    UnknownColormap(String),

    #[error("'{0}' is not a usable font file")]
    InvalidFont(PathBuf),

    #[error("No display available; write the figure to a PNG file instead")]
    NoDisplay,

    #[error("Interactive viewer not compiled in; rebuild with the 'viewer' feature")]
    ViewerUnavailable,

    #[error("Viewer failed: {0}")]
    Viewer(String),

    #[error("Failed to encode image")]
    Image(#[from] image::ImageError),

    #[error("Failed to write '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to build table from slice")]
    Table(#[from] PolarsError),

    #[error("Unsupported export format for '{0}', expected .csv or .parquet")]
    UnsupportedFormat(PathBuf),
}
