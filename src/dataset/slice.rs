use chrono::{DateTime, Utc};
use log::warn;
use ndarray::Array2;
use polars::prelude::*;

/// Coordinates of one axis, or its indices when there are none.
fn axis_values(coords: &Option<Vec<f64>>, len: usize, dim: &str) -> PolarsResult<Vec<f64>> {
    match coords {
        Some(c) if c.len() == len => Ok(c.clone()),
        Some(c) => Err(PolarsError::ShapeMismatch(
            format!("{} has {} coordinates for {} cells", dim, c.len(), len).into(),
        )),
        None => Ok((0..len).map(|i| i as f64).collect()),
    }
}

/// A decoded 2-D slice of one field, with the first dimension as rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub variable: String,
    pub long_name: Option<String>,
    pub units: Option<String>,
    pub y_dim: String,
    pub x_dim: String,
    /// Coordinate values along the rows, when the dataset has them.
    pub y: Option<Vec<f64>>,
    pub x: Option<Vec<f64>>,
    pub fixed_dim: String,
    pub fixed_index: usize,
    pub fixed_value: Option<f64>,
    pub fixed_time: Option<DateTime<Utc>>,
    pub values: Array2<f64>,
}

impl Slice {
    pub fn new(variable: &str, y_dim: &str, x_dim: &str, values: Array2<f64>) -> Self {
        Self {
            variable: variable.to_string(),
            long_name: None,
            units: None,
            y_dim: y_dim.to_string(),
            x_dim: x_dim.to_string(),
            y: None,
            x: None,
            fixed_dim: String::new(),
            fixed_index: 0,
            fixed_value: None,
            fixed_time: None,
            values,
        }
    }

    /// Attaches axis coordinates. An axis whose length does not match the
    /// values is left without coordinates.
    pub fn with_coordinates(mut self, y: Vec<f64>, x: Vec<f64>) -> Self {
        let (rows, cols) = self.shape();
        for (name, coords, len, slot) in [
            (&self.y_dim, y, rows, &mut self.y),
            (&self.x_dim, x, cols, &mut self.x),
        ] {
            if coords.len() == len {
                *slot = Some(coords);
            } else {
                warn!(
                    "Ignoring {} coordinates for {} of size {}",
                    coords.len(),
                    name,
                    len
                );
            }
        }
        self
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Smallest and largest finite value, `None` if there are none.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |range, &v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// `<long name or variable> (<units>) - <fixed coordinate>`.
    pub fn default_title(&self) -> String {
        let label = self.long_name.as_deref().unwrap_or(&self.variable);
        let label = match &self.units {
            Some(units) => format!("{} ({})", label, units),
            None => label.to_string(),
        };
        if self.fixed_dim.is_empty() {
            return label;
        }
        let at = match (self.fixed_time, self.fixed_value) {
            (Some(time), _) => time.format("%Y-%m-%d %H:%M UTC").to_string(),
            (None, Some(value)) => format!("{} = {}", self.fixed_dim, value),
            (None, None) => format!("{}[{}]", self.fixed_dim, self.fixed_index),
        };
        format!("{} - {}", label, at)
    }

    /// Long format: one row per cell with the coordinate (or index) of
    /// each axis and the value. Fails with a shape mismatch when a
    /// coordinate vector does not fit its axis.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let (rows, cols) = self.shape();
        let y_axis = axis_values(&self.y, rows, &self.y_dim)?;
        let x_axis = axis_values(&self.x, cols, &self.x_dim)?;
        let mut ys = Vec::with_capacity(rows * cols);
        let mut xs = Vec::with_capacity(rows * cols);
        for &y in &y_axis {
            for &x in &x_axis {
                ys.push(y);
                xs.push(x);
            }
        }
        let values: Vec<f64> = self.values.iter().copied().collect();
        DataFrame::new(vec![
            Column::new(self.y_dim.as_str().into(), ys),
            Column::new(self.x_dim.as_str().into(), xs),
            Column::new("value".into(), values),
        ])
    }
}
