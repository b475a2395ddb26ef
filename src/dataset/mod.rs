//! The dataset handle and the selection of fields and slices from it.

pub mod error;
pub mod slice;
pub mod variable;

use crate::accessor::DataReader;
use crate::dap::das::AttributeTable;
use crate::dap::dds::{BaseType, Dds, Declaration, Dim};
use crate::dataset::error::SelectError;
use crate::dataset::variable::Variable;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

/// A named axis and its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub size: usize,
}

/// Metadata of one field. Array data stays on the server until a slice is
/// read through [`Variable::isel`].
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    /// Dotted path for structure members.
    pub name: String,
    pub base_type: BaseType,
    pub dims: Vec<Dimension>,
    pub attributes: AttributeTable,
    /// True for DAP Grids, whose maps come back with every array request.
    pub grid: bool,
    /// Per dimension, the variable holding its coordinate values.
    pub coordinates: Vec<Option<String>>,
}

impl VariableInfo {
    fn leaf_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// A one-dimensional variable named after its own dimension.
    pub fn is_coordinate(&self) -> bool {
        self.dims.len() == 1 && self.dims[0].name == self.leaf_name()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub dtype: &'static str,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub units: Option<String>,
    pub long_name: Option<String>,
}

/// Serializable overview of a [`Dataset`].
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub locator: String,
    pub dimensions: Vec<Dimension>,
    pub coordinates: Vec<VariableSummary>,
    pub data_variables: Vec<VariableSummary>,
    pub attributes: AttributeTable,
}

/// An open remote dataset. Owns the reader (and with it the network
/// session), which is released when the handle is dropped.
pub struct Dataset {
    name: String,
    locator: String,
    dimensions: Vec<Dimension>,
    variables: Vec<VariableInfo>,
    attributes: AttributeTable,
    reader: Box<dyn DataReader>,
}

fn dimensions_of(leaf: &str, dims: &[Dim]) -> Vec<Dimension> {
    dims.iter()
        .enumerate()
        .map(|(i, d)| Dimension {
            name: d.name.clone().unwrap_or_else(|| format!("{}_dim{}", leaf, i)),
            size: d.size,
        })
        .collect()
}

fn attributes_for(das: &AttributeTable, paths: &[&str]) -> AttributeTable {
    paths
        .iter()
        .find_map(|p| das.for_variable(p))
        .cloned()
        .unwrap_or_default()
}

fn collect_variables(
    decl: &Declaration,
    prefix: &str,
    das: &AttributeTable,
    out: &mut Vec<VariableInfo>,
) {
    let path = format!("{}{}", prefix, decl.name());
    match decl {
        Declaration::Base { base, name, dims } => {
            let dims = dimensions_of(name, dims);
            out.push(VariableInfo {
                attributes: attributes_for(das, &[&path]),
                coordinates: vec![None; dims.len()],
                name: path,
                base_type: *base,
                dims,
                grid: false,
            });
        }
        Declaration::Structure { members, .. } => {
            let nested = format!("{}.", path);
            for member in members {
                collect_variables(member, &nested, das, out);
            }
        }
        Declaration::Grid { name, array, maps } => {
            let Declaration::Base { base, dims, .. } = array.as_ref() else {
                warn!("Skipping Grid {} whose array part is not an array", path);
                return;
            };
            let mut dims = dimensions_of(name, dims);
            for (dim, map) in dims.iter_mut().zip(maps) {
                if dim.name.starts_with(&format!("{}_dim", name)) {
                    dim.name = map.name().to_string();
                }
            }
            let coordinates = dims
                .iter()
                .enumerate()
                .map(|(i, _)| maps.get(i).map(|m| format!("{}{}", prefix, m.name())))
                .collect();
            let array_path = format!("{}.{}", path, array.name());
            out.push(VariableInfo {
                attributes: attributes_for(das, &[&path, &array_path]),
                name: path.clone(),
                base_type: *base,
                dims,
                grid: true,
                coordinates,
            });
            for map in maps {
                let nested = format!("{}.{}", path, map.name());
                let own = format!("{}{}", prefix, map.name());
                if let Declaration::Base { base, name, dims } = map {
                    let dims = dimensions_of(name, dims);
                    out.push(VariableInfo {
                        attributes: attributes_for(das, &[&own, &nested]),
                        coordinates: vec![None; dims.len()],
                        name: own,
                        base_type: *base,
                        dims,
                        grid: false,
                    });
                }
            }
        }
        Declaration::Sequence { .. } => {
            warn!("Skipping Sequence {}, sequences are not supported", path);
        }
    }
}

impl Dataset {
    /// Builds a handle from the parsed DDS and DAS of `locator`.
    pub fn from_descriptors(
        locator: &str,
        dds: &Dds,
        das: &AttributeTable,
        reader: Box<dyn DataReader>,
    ) -> Self {
        let mut collected = Vec::new();
        for decl in &dds.declarations {
            collect_variables(decl, "", das, &mut collected);
        }

        // Grid maps usually repeat top-level coordinate arrays.
        let mut variables: Vec<VariableInfo> = Vec::with_capacity(collected.len());
        for var in collected {
            if !variables.iter().any(|v| v.name == var.name) {
                variables.push(var);
            }
        }

        let mut dimensions: Vec<Dimension> = Vec::new();
        for dim in variables.iter().flat_map(|v| &v.dims) {
            match dimensions.iter().find(|d| d.name == dim.name) {
                Some(known) if known.size != dim.size => warn!(
                    "Dimension {} has size {} and {}, keeping the first",
                    dim.name, known.size, dim.size
                ),
                Some(_) => {}
                None => dimensions.push(dim.clone()),
            }
        }

        let coordinate_paths: Vec<(String, String, usize)> = variables
            .iter()
            .filter(|v| v.is_coordinate())
            .map(|v| (v.name.clone(), v.dims[0].name.clone(), v.dims[0].size))
            .collect();
        for var in variables.iter_mut().filter(|v| !v.grid) {
            for (slot, dim) in var.coordinates.iter_mut().zip(&var.dims) {
                *slot = coordinate_paths
                    .iter()
                    .find(|(_, name, size)| *name == dim.name && *size == dim.size)
                    .map(|(path, _, _)| path.clone());
            }
        }

        Self {
            name: dds.name.clone(),
            locator: locator.to_string(),
            dimensions,
            variables,
            attributes: das.globals(),
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    /// Global attributes.
    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn reader(&self) -> &dyn DataReader {
        self.reader.as_ref()
    }

    pub(crate) fn info(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Looks up a field by its exact name.
    pub fn variable(&self, key: &str) -> Result<Variable<'_>, SelectError> {
        self.info(key)
            .map(|info| Variable::new(self, info))
            .ok_or_else(|| SelectError::KeyNotFound {
                key: key.to_string(),
                available: self.variables.iter().map(|v| v.name.clone()).collect(),
            })
    }

    pub fn summary(&self) -> DatasetSummary {
        let describe = |v: &VariableInfo| VariableSummary {
            name: v.name.clone(),
            dtype: v.base_type.dtype_name(),
            dims: v.dims.iter().map(|d| d.name.clone()).collect(),
            shape: v.dims.iter().map(|d| d.size).collect(),
            units: v.attributes.text("units").map(str::to_string),
            long_name: v.attributes.text("long_name").map(str::to_string),
        };
        DatasetSummary {
            name: self.name.clone(),
            locator: self.locator.clone(),
            dimensions: self.dimensions.clone(),
            coordinates: self
                .variables
                .iter()
                .filter(|v| v.is_coordinate())
                .map(describe)
                .collect(),
            data_variables: self
                .variables
                .iter()
                .filter(|v| !v.is_coordinate())
                .map(describe)
                .collect(),
            attributes: self.attributes.clone(),
        }
    }

    /// Releases the handle. Dropping it has the same effect.
    pub fn close(self) {}
}

impl Drop for Dataset {
    fn drop(&mut self) {
        self.reader.release();
        debug!("Closed dataset {}", self.locator);
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("locator", &self.locator)
            .field("dimensions", &self.dimensions)
            .field("variables", &self.variables.len())
            .finish()
    }
}

fn write_variables<'a>(
    f: &mut fmt::Formatter<'_>,
    variables: impl Iterator<Item = &'a VariableInfo>,
) -> fmt::Result {
    let variables: Vec<_> = variables.collect();
    let width = variables.iter().map(|v| v.name.len()).max().unwrap_or(0);
    for v in variables {
        let dims: Vec<&str> = v.dims.iter().map(|d| d.name.as_str()).collect();
        writeln!(
            f,
            "  * {:width$}  ({}) {}",
            v.name,
            dims.join(", "),
            v.base_type.dtype_name(),
            width = width
        )?;
    }
    Ok(())
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<dapview.Dataset> {}", self.name)?;
        let dims: Vec<String> = self
            .dimensions
            .iter()
            .map(|d| format!("{}: {}", d.name, d.size))
            .collect();
        writeln!(f, "Dimensions:  ({})", dims.join(", "))?;
        writeln!(f, "Coordinates:")?;
        write_variables(f, self.variables.iter().filter(|v| v.is_coordinate()))?;
        writeln!(f, "Data variables:")?;
        write_variables(f, self.variables.iter().filter(|v| !v.is_coordinate()))?;
        writeln!(f, "Attributes:")?;
        for attr in &self.attributes.attributes {
            writeln!(f, "    {}: {}", attr.name, attr.value)?;
        }
        Ok(())
    }
}
