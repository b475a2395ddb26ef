use crate::dap::dds::BaseType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Variable '{key}' not found. Available: {}", .available.join(", "))]
    KeyNotFound { key: String, available: Vec<String> },

    #[error("Variable '{variable}' has no dimension '{dimension}'. Dimensions: {}", .available.join(", "))]
    DimensionNotFound {
        variable: String,
        dimension: String,
        available: Vec<String>,
    },

    #[error("Index {index} is out of range for dimension '{dimension}' of size {size}")]
    IndexOutOfRange {
        dimension: String,
        index: usize,
        size: usize,
    },

    #[error("Fixing '{dimension}' on '{variable}' leaves dimensions [{}], expected exactly two", .remaining.join(", "))]
    NotTwoDimensional {
        variable: String,
        dimension: String,
        remaining: Vec<String>,
    },

    #[error("Dimension '{dimension}' of '{variable}' is empty")]
    EmptyDimension { variable: String, dimension: String },

    #[error("Variable '{variable}' holds {base_type} values, which cannot be plotted")]
    NotNumeric {
        variable: String,
        base_type: BaseType,
    },

    #[error("The data response did not contain '{0}'")]
    MissingData(String),
}
