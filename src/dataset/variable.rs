use crate::cf::{decode_time, CfDecoding};
use crate::dap::constraint::{Constraint, Hyperslab};
use crate::dap::das::AttributeTable;
use crate::dap::dds::BaseType;
use crate::dap::error::DapError;
use crate::dap::xdr::DecodedVariable;
use crate::dataset::error::SelectError;
use crate::dataset::slice::Slice;
use crate::dataset::{Dataset, Dimension, VariableInfo};
use crate::error::DapviewError;
use log::info;
use ndarray::Array2;

/// A field of an open [`Dataset`].
#[derive(Clone, Copy)]
pub struct Variable<'a> {
    dataset: &'a Dataset,
    info: &'a VariableInfo,
}

/// A validated plan for reading one 2-D slice: a single index along the
/// fixed dimension, the full extent of the two remaining ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub variable: String,
    pub fixed_dim: String,
    pub fixed_index: usize,
    pub slabs: Vec<Hyperslab>,
    /// Positions of the row and column dimensions.
    pub axes: (usize, usize),
}

impl Selection {
    pub fn shape(&self) -> (usize, usize) {
        (self.slabs[self.axes.0].len(), self.slabs[self.axes.1].len())
    }
}

impl<'a> Variable<'a> {
    pub(crate) fn new(dataset: &'a Dataset, info: &'a VariableInfo) -> Self {
        Self { dataset, info }
    }

    pub fn name(&self) -> &'a str {
        &self.info.name
    }

    pub fn base_type(&self) -> BaseType {
        self.info.base_type
    }

    pub fn dims(&self) -> &'a [Dimension] {
        &self.info.dims
    }

    pub fn shape(&self) -> Vec<usize> {
        self.info.dims.iter().map(|d| d.size).collect()
    }

    pub fn dim_size(&self, name: &str) -> Option<usize> {
        self.info.dims.iter().find(|d| d.name == name).map(|d| d.size)
    }

    pub fn attributes(&self) -> &'a AttributeTable {
        &self.info.attributes
    }

    pub fn units(&self) -> Option<&'a str> {
        self.info.attributes.text("units")
    }

    pub fn long_name(&self) -> Option<&'a str> {
        self.info.attributes.text("long_name")
    }

    /// Plans the slice at `index` along `dim`. While more than two other
    /// dimensions remain, size-1 ones are dropped from the front; exactly
    /// two must be left.
    pub fn select(&self, dim: &str, index: usize) -> Result<Selection, SelectError> {
        let info = self.info;
        if !info.base_type.is_numeric() {
            return Err(SelectError::NotNumeric {
                variable: info.name.clone(),
                base_type: info.base_type,
            });
        }

        let fixed = info
            .dims
            .iter()
            .position(|d| d.name == dim)
            .ok_or_else(|| SelectError::DimensionNotFound {
                variable: info.name.clone(),
                dimension: dim.to_string(),
                available: info.dims.iter().map(|d| d.name.clone()).collect(),
            })?;
        let size = info.dims[fixed].size;
        if index >= size {
            return Err(SelectError::IndexOutOfRange {
                dimension: dim.to_string(),
                index,
                size,
            });
        }

        let mut remaining: Vec<usize> = (0..info.dims.len()).filter(|&i| i != fixed).collect();
        while remaining.len() > 2 {
            let Some(pos) = remaining.iter().position(|&i| info.dims[i].size == 1) else {
                break;
            };
            remaining.remove(pos);
        }
        let &[y, x] = remaining.as_slice() else {
            return Err(SelectError::NotTwoDimensional {
                variable: info.name.clone(),
                dimension: dim.to_string(),
                remaining: remaining.iter().map(|&i| info.dims[i].name.clone()).collect(),
            });
        };
        if let Some(empty) = [y, x].iter().find(|&&i| info.dims[i].size == 0) {
            return Err(SelectError::EmptyDimension {
                variable: info.name.clone(),
                dimension: info.dims[*empty].name.clone(),
            });
        }

        let slabs = info
            .dims
            .iter()
            .enumerate()
            .map(|(i, d)| {
                if i == fixed {
                    Hyperslab::index(index)
                } else {
                    Hyperslab::full(d.size)
                }
            })
            .collect();

        Ok(Selection {
            variable: info.name.clone(),
            fixed_dim: dim.to_string(),
            fixed_index: index,
            slabs,
            axes: (y, x),
        })
    }

    fn constraint(&self, selection: &Selection) -> Constraint {
        let mut constraint = Constraint::new().project(&self.info.name, selection.slabs.clone());
        if self.info.grid {
            return constraint;
        }
        for (slab, coordinate) in selection.slabs.iter().zip(&self.info.coordinates) {
            if let Some(path) = coordinate {
                if *path != self.info.name {
                    constraint = constraint.project(path, vec![*slab]);
                }
            }
        }
        constraint
    }

    /// Decoded values of the coordinate variable for dimension `pos`.
    fn coordinate(&self, decoded: &[DecodedVariable], pos: usize, expected: usize) -> Option<Vec<f64>> {
        let path = self.info.coordinates.get(pos)?.as_ref()?;
        let raw = decoded.iter().find(|v| &v.name == path)?.data.to_f64()?;
        if raw.len() != expected {
            return None;
        }
        let cf = match self.dataset.info(path) {
            Some(coord) => CfDecoding::from_attributes(&coord.attributes, coord.base_type),
            None => CfDecoding::from_attributes(&AttributeTable::new(), BaseType::Float64),
        };
        Some(raw.into_iter().map(|v| cf.apply(v)).collect())
    }

    /// Reads and decodes the planned slice. The dataset itself is left
    /// untouched.
    pub async fn read(&self, selection: &Selection) -> Result<Slice, DapviewError> {
        let constraint = self.constraint(selection);
        let decoded = self.dataset.reader().read(&constraint).await?;

        let data = decoded
            .iter()
            .find(|v| v.name == self.info.name)
            .ok_or_else(|| SelectError::MissingData(self.info.name.clone()))?;
        let raw = data.data.to_f64().ok_or_else(|| SelectError::NotNumeric {
            variable: self.info.name.clone(),
            base_type: data.data.base_type(),
        })?;

        let (rows, cols) = selection.shape();
        if raw.len() != rows * cols {
            return Err(DapError::format(
                "DODS",
                format!(
                    "expected {} values for {}, received {}",
                    rows * cols,
                    self.info.name,
                    raw.len()
                ),
            )
            .into());
        }
        let cf = CfDecoding::from_attributes(&self.info.attributes, self.info.base_type);
        let values = Array2::from_shape_vec((rows, cols), raw.into_iter().map(|v| cf.apply(v)).collect())
            .map_err(|e| DapError::format("DODS", e.to_string()))?;

        let (y, x) = selection.axes;
        let fixed = self
            .info
            .dims
            .iter()
            .position(|d| d.name == selection.fixed_dim)
            .unwrap_or_default();
        let fixed_value = self
            .coordinate(&decoded, fixed, 1)
            .and_then(|v| v.first().copied());
        let fixed_time = fixed_value.and_then(|value| {
            let path = self.info.coordinates.get(fixed)?.as_ref()?;
            let units = self.dataset.info(path)?.attributes.text("units")?;
            decode_time(value, units)
        });

        info!(
            "Read {}x{} slice of {} at {}={}",
            rows, cols, self.info.name, selection.fixed_dim, selection.fixed_index
        );

        let mut slice = Slice::new(
            &self.info.name,
            &self.info.dims[y].name,
            &self.info.dims[x].name,
            values,
        );
        slice.long_name = self.long_name().map(str::to_string);
        slice.units = self.units().map(str::to_string);
        slice.fixed_dim = selection.fixed_dim.clone();
        slice.fixed_index = selection.fixed_index;
        slice.fixed_value = fixed_value;
        slice.fixed_time = fixed_time;
        slice.y = self.coordinate(&decoded, y, rows);
        slice.x = self.coordinate(&decoded, x, cols);
        Ok(slice)
    }

    /// [`Variable::select`] followed by [`Variable::read`].
    pub async fn isel(&self, dim: &str, index: usize) -> Result<Slice, DapviewError> {
        let selection = self.select(dim, index)?;
        self.read(&selection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::memory::{MemoryAccessor, MemoryDataset, MemoryVariable};
    use crate::accessor::DatasetAccessor;
    use crate::dap::xdr::ArrayData;

    fn imerg_like() -> MemoryDataset {
        MemoryDataset::new("imerg")
            .with_variable(
                MemoryVariable::new("time", &[("time", 2)], ArrayData::Int32(vec![1_677_628_800, 1_677_630_600]))
                    .with_attributes(
                        AttributeTable::new()
                            .with_text("units", "seconds since 1970-01-01 00:00:00 UTC"),
                    ),
            )
            .with_variable(MemoryVariable::new(
                "lat",
                &[("lat", 2)],
                ArrayData::Float32(vec![-0.05, 0.05]),
            ))
            .with_variable(MemoryVariable::new(
                "lon",
                &[("lon", 3)],
                ArrayData::Float32(vec![10.05, 10.15, 10.25]),
            ))
            .with_variable(
                MemoryVariable::new(
                    "precipitationCal",
                    &[("time", 2), ("lat", 2), ("lon", 3)],
                    ArrayData::Float32(vec![
                        0.0, 0.5, -9999.9, 1.0, 1.5, 2.0, //
                        3.0, 3.5, 4.0, 4.5, 5.0, 5.5,
                    ]),
                )
                .with_attributes(
                    AttributeTable::new()
                        .with_text("units", "mm/hr")
                        .with_number("_FillValue", -9999.9),
                ),
            )
    }

    async fn open() -> Dataset {
        MemoryAccessor::new()
            .with_dataset("mem://imerg", imerg_like())
            .open("mem://imerg", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn select_validates_dimension_and_index() {
        let ds = open().await;
        let var = ds.variable("precipitationCal").unwrap();
        assert_eq!(var.dim_size("time"), Some(2));

        assert!(matches!(
            var.select("depth", 0),
            Err(SelectError::DimensionNotFound { .. })
        ));
        assert!(matches!(
            var.select("time", 2),
            Err(SelectError::IndexOutOfRange { index: 2, size: 2, .. })
        ));
        assert!(matches!(
            ds.variable("lat").unwrap().select("lat", 0),
            Err(SelectError::NotTwoDimensional { .. })
        ));
        assert_eq!(var.select("lat", 1).unwrap().axes, (0, 2));

        let selection = var.select("time", 1).unwrap();
        assert_eq!(selection.axes, (1, 2));
        assert_eq!(selection.shape(), (2, 3));
        assert_eq!(selection.slabs[0], Hyperslab::index(1));
    }

    #[tokio::test]
    async fn isel_decodes_values_coordinates_and_time() {
        let ds = open().await;
        let slice = ds
            .variable("precipitationCal")
            .unwrap()
            .isel("time", 0)
            .await
            .unwrap();

        assert_eq!(slice.shape(), (2, 3));
        assert_eq!(slice.values[[0, 1]], 0.5);
        assert!(slice.values[[0, 2]].is_nan());
        assert_eq!(slice.y_dim, "lat");
        assert_eq!(slice.x_dim, "lon");
        assert_eq!(slice.x.as_ref().map(Vec::len), Some(3));
        assert_eq!(slice.units.as_deref(), Some("mm/hr"));
        assert_eq!(
            slice.fixed_time.map(|t| t.to_rfc3339()),
            Some("2023-03-01T00:00:00+00:00".to_string())
        );
        assert_eq!(slice.default_title(), "precipitationCal (mm/hr) - 2023-03-01 00:00 UTC");
    }

    async fn open_field(dims: &[(&str, usize)]) -> Dataset {
        let len: usize = dims.iter().map(|(_, s)| s).product();
        MemoryAccessor::new()
            .with_dataset(
                "mem://field",
                MemoryDataset::new("field").with_variable(MemoryVariable::new(
                    "precipitationCal",
                    dims,
                    ArrayData::Float32((0..len).map(|v| v as f32).collect()),
                )),
            )
            .open("mem://field", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn single_row_and_single_column_slices_stay_two_dimensional() {
        let ds = open_field(&[("time", 1), ("lat", 1), ("lon", 10)]).await;
        let slice = ds.variable("precipitationCal").unwrap().isel("time", 0).await.unwrap();
        assert_eq!(slice.shape(), (1, 10));
        assert_eq!((slice.y_dim.as_str(), slice.x_dim.as_str()), ("lat", "lon"));
        assert_eq!(slice.values[[0, 9]], 9.0);

        let ds = open_field(&[("time", 1), ("lat", 10), ("lon", 1)]).await;
        let slice = ds.variable("precipitationCal").unwrap().isel("time", 0).await.unwrap();
        assert_eq!(slice.shape(), (10, 1));
        assert_eq!(slice.values[[9, 0]], 9.0);
    }

    #[tokio::test]
    async fn extra_size_one_dimensions_are_dropped_down_to_two() {
        let ds = open_field(&[("time", 2), ("level", 1), ("lat", 2), ("lon", 3)]).await;
        let var = ds.variable("precipitationCal").unwrap();
        let selection = var.select("time", 1).unwrap();
        assert_eq!(selection.axes, (2, 3));
        assert_eq!(selection.slabs[1], Hyperslab::full(1));
        let slice = var.read(&selection).await.unwrap();
        assert_eq!(slice.values[[0, 0]], 6.0);

        let ds = open_field(&[("time", 1), ("level", 2), ("lat", 2), ("lon", 3)]).await;
        assert!(matches!(
            ds.variable("precipitationCal").unwrap().select("time", 0),
            Err(SelectError::NotTwoDimensional { .. })
        ));
    }

    #[tokio::test]
    async fn constraint_projects_coordinates_of_plain_arrays() {
        let ds = open().await;
        let var = ds.variable("precipitationCal").unwrap();
        let selection = var.select("time", 1).unwrap();
        assert_eq!(
            var.constraint(&selection).to_string(),
            "precipitationCal[1:1:1][0:1:1][0:1:2],time[1:1:1],lat[0:1:1],lon[0:1:2]"
        );
    }

    #[tokio::test]
    async fn string_variables_cannot_be_selected() {
        let ds = MemoryAccessor::new()
            .with_dataset(
                "mem://s",
                MemoryDataset::new("s").with_variable(MemoryVariable::new(
                    "names",
                    &[("time", 1), ("a", 1), ("b", 1)],
                    ArrayData::Str(vec!["x".to_string()]),
                )),
            )
            .open("mem://s", None)
            .await
            .unwrap();
        assert!(matches!(
            ds.variable("names").unwrap().select("time", 0),
            Err(SelectError::NotNumeric { .. })
        ));
    }
}
