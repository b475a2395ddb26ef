//! The main entry point: open a remote dataset, select a field and render
//! a 2-D slice of it.

use crate::accessor::http::HttpAccessor;
use crate::accessor::DatasetAccessor;
use crate::credentials::Credentials;
use crate::dap::error::DapError;
use crate::dap::session::HttpConfig;
use crate::dataset::slice::Slice;
use crate::dataset::Dataset;
use crate::error::DapviewError;
use crate::render::figure::{Figure, PlotStyle};
use bon::bon;
use log::info;
use std::sync::Arc;

/// Field plotted when none is given.
pub const DEFAULT_FIELD: &str = "precipitationCal";
/// Dimension fixed when none is given.
pub const DEFAULT_DIMENSION: &str = "time";

/// The slice that was read and the figure rendered from it.
#[derive(Debug, Clone)]
pub struct PlotOutput {
    pub slice: Slice,
    pub figure: Figure,
}

/// Client composing the accessor, selector and renderer.
///
/// Create one with [`Dapview::new()`] for DAP2 over HTTP, or with
/// [`Dapview::with_accessor()`] to read from anything implementing
/// [`DatasetAccessor`].
///
/// # Examples
///
/// ```no_run
/// # use dapview::{Credentials, Dapview, DapviewError};
/// # async fn run() -> Result<(), DapviewError> {
/// let client = Dapview::new()?;
/// let credentials = Credentials::from_env()?;
/// let output = client
///     .plot()
///     .url("https://gpm1.gesdisc.eosdis.nasa.gov/opendap/GPM_L3/GPM_3IMERGHH.07/2023/03/3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5")
///     .maybe_credentials(credentials.as_ref())
///     .call()
///     .await?;
/// output.figure.save_png("imerg.png".as_ref())?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dapview {
    accessor: Arc<dyn DatasetAccessor>,
}

#[bon]
impl Dapview {
    /// A client speaking DAP2 over HTTP with the default [`HttpConfig`].
    pub fn new() -> Result<Self, DapError> {
        Self::with_config(HttpConfig::default())
    }

    pub fn with_config(config: HttpConfig) -> Result<Self, DapError> {
        Ok(Self::with_accessor(HttpAccessor::new(config)?))
    }

    pub fn with_accessor(accessor: impl DatasetAccessor + 'static) -> Self {
        Self {
            accessor: Arc::new(accessor),
        }
    }

    pub fn accessor(&self) -> &dyn DatasetAccessor {
        self.accessor.as_ref()
    }

    /// Opens the dataset at `url`. The handle releases its session when
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`DapError::Connection`], [`DapError::Authentication`] or
    /// [`DapError::Format`] (wrapped in [`DapviewError::Dap`]) depending on
    /// what went wrong.
    #[builder]
    pub async fn open(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Dataset, DapviewError> {
        let dataset = self.accessor.open(url, credentials).await?;
        info!(
            "Opened {} with {} variables",
            dataset.name(),
            dataset.variables().len()
        );
        Ok(dataset)
    }

    /// Opens `url`, selects `field`, fixes `index` along `dimension` and
    /// renders the slice headlessly. Each step only runs if the previous one
    /// succeeded; the dataset is released on every path.
    #[builder]
    pub async fn plot(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
        field: Option<&str>,
        dimension: Option<&str>,
        index: Option<usize>,
        style: Option<PlotStyle>,
    ) -> Result<PlotOutput, DapviewError> {
        let dataset = self.open().url(url).maybe_credentials(credentials).call().await?;
        let variable = dataset.variable(field.unwrap_or(DEFAULT_FIELD))?;
        let slice = variable
            .isel(dimension.unwrap_or(DEFAULT_DIMENSION), index.unwrap_or(0))
            .await?;
        let figure = Figure::render(&slice, &style.unwrap_or_default())?;
        dataset.close();
        Ok(PlotOutput { slice, figure })
    }
}
