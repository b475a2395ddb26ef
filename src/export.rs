use crate::dataset::slice::Slice;
use crate::render::error::RenderError;
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

impl Slice {
    /// Writes [`Slice::to_dataframe`] as CSV or Parquet, chosen by the file
    /// extension.
    pub fn write_table(&self, path: &Path) -> Result<(), RenderError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let mut df = self.to_dataframe()?;
        let create = || File::create(path).map_err(|e| RenderError::Io(path.to_path_buf(), e));

        match extension.as_deref() {
            Some("csv") => {
                CsvWriter::new(create()?).include_header(true).finish(&mut df)?;
            }
            Some("parquet") | Some("pq") => {
                ParquetWriter::new(create()?)
                    .with_compression(ParquetCompression::Snappy)
                    .finish(&mut df)?;
            }
            _ => return Err(RenderError::UnsupportedFormat(path.to_path_buf())),
        }
        info!("Wrote {} rows of {} to {:?}", df.height(), self.variable, path);
        Ok(())
    }
}
