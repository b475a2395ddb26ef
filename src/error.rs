use crate::credentials::CredentialsError;
use crate::dap::error::DapError;
use crate::dataset::error::SelectError;
use crate::render::error::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DapviewError {
    #[error(transparent)]
    Dap(#[from] DapError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

/// Coarse failure classes callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Authentication,
    Format,
    KeyNotFound,
    IndexOutOfRange,
    Render,
    Configuration,
}

impl DapviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DapviewError::Dap(e) => match e {
                DapError::Connection { .. }
                | DapError::HttpStatus { .. }
                | DapError::Server { .. }
                | DapError::TooManyRedirects(_)
                | DapError::ResponseIo { .. } => ErrorKind::Connection,
                DapError::Authentication { .. } | DapError::InsecureTransport(_) => {
                    ErrorKind::Authentication
                }
                DapError::Format { .. } | DapError::Unsupported(_) => ErrorKind::Format,
                DapError::InvalidUrl(..) => ErrorKind::Configuration,
            },
            DapviewError::Select(e) => match e {
                SelectError::KeyNotFound { .. } | SelectError::DimensionNotFound { .. } => {
                    ErrorKind::KeyNotFound
                }
                SelectError::IndexOutOfRange { .. } | SelectError::EmptyDimension { .. } => {
                    ErrorKind::IndexOutOfRange
                }
                SelectError::NotTwoDimensional { .. } | SelectError::NotNumeric { .. } => {
                    ErrorKind::Render
                }
                SelectError::MissingData(_) => ErrorKind::Format,
            },
            DapviewError::Render(RenderError::UnknownColormap(_)) => ErrorKind::Configuration,
            DapviewError::Render(_) => ErrorKind::Render,
            DapviewError::Credentials(_) => ErrorKind::Configuration,
        }
    }
}
