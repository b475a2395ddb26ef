//! Renders the first half hour of IMERG precipitation for 1 March 2023.
//!
//! Needs an Earthdata Login account: set `EARTHDATA_USERNAME` and
//! `EARTHDATA_PASSWORD`, or add `urs.earthdata.nasa.gov` to `~/.netrc`.

use dapview::{
    Credentials, Dapview, DapviewError, Figure, PlotStyle, DEFAULT_AUTH_HOST, DEFAULT_DIMENSION,
    DEFAULT_FIELD,
};
use std::path::Path;

const GRANULE: &str = "https://gpm1.gesdisc.eosdis.nasa.gov/opendap/GPM_L3/GPM_3IMERGHH.07/2023/03/3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5";

#[tokio::main]
async fn main() -> Result<(), DapviewError> {
    let credentials = Credentials::discover(DEFAULT_AUTH_HOST)?;
    let client = Dapview::new()?;

    let dataset = client
        .open()
        .url(GRANULE)
        .maybe_credentials(credentials.as_ref())
        .call()
        .await?;
    println!("{}", dataset);

    let slice = dataset
        .variable(DEFAULT_FIELD)?
        .isel(DEFAULT_DIMENSION, 0)
        .await?;
    dataset.close();

    let style = PlotStyle::builder()
        .title("Precipitación IMERG (mm/hr) - 1 Marzo 2023")
        .build();
    let figure = Figure::render(&slice, &style)?;
    println!(
        "{}x{} slice, value range {:?}",
        slice.shape().0,
        slice.shape().1,
        slice.finite_range()
    );
    figure.save_png(Path::new("imerg_20230301.png"))?;
    Ok(())
}
