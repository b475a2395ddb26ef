//! Opening datasets. [`DatasetAccessor`] is the seam between the selection
//! and rendering steps and whatever serves the data.

pub mod http;
pub mod memory;

use crate::credentials::Credentials;
use crate::dap::constraint::Constraint;
use crate::dap::error::DapError;
use crate::dap::xdr::DecodedVariable;
use crate::dataset::Dataset;
use async_trait::async_trait;

/// Opens a dataset handle from a locator and optional credentials.
#[async_trait]
pub trait DatasetAccessor: Send + Sync {
    async fn open(
        &self,
        locator: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Dataset, DapError>;
}

/// Reads constrained array data for an open dataset. Owned by the
/// [`Dataset`] and released when the handle is dropped.
#[async_trait]
pub trait DataReader: Send + Sync {
    async fn read(&self, constraint: &Constraint) -> Result<Vec<DecodedVariable>, DapError>;

    fn release(&self) {}
}
