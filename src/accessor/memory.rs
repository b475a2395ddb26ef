//! An in-process stand-in for a DAP server, for exercising selection and
//! rendering without a network.

use crate::accessor::{DataReader, DatasetAccessor};
use crate::credentials::Credentials;
use crate::dap::constraint::{Constraint, Hyperslab};
use crate::dap::das::AttributeTable;
use crate::dap::dds::{Dds, Declaration, Dim};
use crate::dap::error::DapError;
use crate::dap::xdr::{ArrayData, DecodedVariable};
use crate::dataset::Dataset;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters shared by a [`MemoryAccessor`] and the handles it opened.
#[derive(Debug, Default)]
pub struct AccessStats {
    opens: AtomicUsize,
    reads: AtomicUsize,
    releases: AtomicUsize,
}

impl AccessStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryVariable {
    pub name: String,
    pub dims: Vec<Dim>,
    pub data: ArrayData,
    pub attributes: AttributeTable,
}

impl MemoryVariable {
    /// `dims` are `(name, size)` pairs in row-major order.
    pub fn new(name: &str, dims: &[(&str, usize)], data: ArrayData) -> Self {
        Self {
            name: name.to_string(),
            dims: dims.iter().map(|(n, s)| Dim::named(*n, *s)).collect(),
            data,
            attributes: AttributeTable::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: AttributeTable) -> Self {
        self.attributes = attributes;
        self
    }

    fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.size).collect()
    }

    /// The data must fill the declared dimensions exactly.
    fn check(&self) -> Result<(), DapError> {
        let expected: usize = self.dims.iter().map(|d| d.size).product();
        if self.data.len() != expected {
            return Err(DapError::format(
                "DODS",
                format!(
                    "{} holds {} values but its dimensions need {}",
                    self.name,
                    self.data.len(),
                    expected
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDataset {
    pub name: String,
    pub variables: Vec<MemoryVariable>,
    pub attributes: AttributeTable,
}

impl MemoryDataset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, variable: MemoryVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_global(mut self, name: &str, value: &str) -> Self {
        self.attributes = self.attributes.with_text(name, value);
        self
    }

    pub fn variable_data(&self, name: &str) -> Option<&ArrayData> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| &v.data)
    }

    /// The DDS and DAS a server would publish for this dataset.
    fn descriptors(&self) -> (Dds, AttributeTable) {
        let declarations = self
            .variables
            .iter()
            .map(|v| Declaration::Base {
                base: v.data.base_type(),
                name: v.name.clone(),
                dims: v.dims.clone(),
            })
            .collect();
        let mut das = AttributeTable::new().with_container("NC_GLOBAL", self.attributes.clone());
        for v in &self.variables {
            das = das.with_container(&v.name, v.attributes.clone());
        }
        (
            Dds {
                name: self.name.clone(),
                declarations,
            },
            das,
        )
    }
}

/// Row-major flat indices selected by one hyperslab per dimension.
fn flat_indices(shape: &[usize], slabs: &[Hyperslab]) -> Vec<usize> {
    let mut indices = vec![0usize];
    for (size, slab) in shape.iter().zip(slabs) {
        indices = indices
            .iter()
            .flat_map(|&base| slab.indices().map(move |i| base * size + i))
            .collect();
    }
    indices
}

/// Serves [`MemoryDataset`]s by locator, optionally behind one credential
/// pair.
///
/// # Examples
///
/// ```
/// use dapview::{ArrayData, DatasetAccessor, MemoryAccessor, MemoryDataset, MemoryVariable};
///
/// # async fn run() -> Result<(), dapview::DapError> {
/// let accessor = MemoryAccessor::new().with_dataset(
///     "mem://zeros",
///     MemoryDataset::new("zeros").with_variable(MemoryVariable::new(
///         "precipitationCal",
///         &[("time", 1), ("lat", 2), ("lon", 2)],
///         ArrayData::Float32(vec![0.0; 4]),
///     )),
/// );
/// let dataset = accessor.open("mem://zeros", None).await?;
/// assert!(dataset.variable("precipitationCal").is_ok());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryAccessor {
    datasets: HashMap<String, Arc<MemoryDataset>>,
    required: Option<Credentials>,
    stats: Arc<AccessStats>,
}

impl MemoryAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, locator: &str, dataset: MemoryDataset) -> Self {
        self.datasets.insert(locator.to_string(), Arc::new(dataset));
        self
    }

    /// Rejects every open that does not present exactly these credentials.
    pub fn require_credentials(mut self, credentials: Credentials) -> Self {
        self.required = Some(credentials);
        self
    }

    pub fn stats(&self) -> Arc<AccessStats> {
        self.stats.clone()
    }

    pub fn dataset(&self, locator: &str) -> Option<Arc<MemoryDataset>> {
        self.datasets.get(locator).cloned()
    }
}

#[async_trait]
impl DatasetAccessor for MemoryAccessor {
    async fn open(
        &self,
        locator: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Dataset, DapError> {
        if let Some(required) = &self.required {
            match credentials {
                Some(given) if given == required => {}
                Some(_) => {
                    return Err(DapError::Authentication {
                        url: locator.to_string(),
                        reason: "the credentials were rejected".to_string(),
                    })
                }
                None => {
                    return Err(DapError::Authentication {
                        url: locator.to_string(),
                        reason: "the server requires credentials but none were supplied"
                            .to_string(),
                    })
                }
            }
        }

        let dataset = self
            .datasets
            .get(locator)
            .cloned()
            .ok_or_else(|| DapError::connection(locator, format!("no dataset at {}", locator)))?;
        for variable in &dataset.variables {
            variable.check()?;
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);

        let (dds, das) = dataset.descriptors();
        let reader = MemoryReader {
            locator: locator.to_string(),
            dataset,
            stats: self.stats.clone(),
        };
        Ok(Dataset::from_descriptors(locator, &dds, &das, Box::new(reader)))
    }
}

struct MemoryReader {
    locator: String,
    dataset: Arc<MemoryDataset>,
    stats: Arc<AccessStats>,
}

impl MemoryReader {
    fn constraint_error(&self, message: String) -> DapError {
        DapError::Server {
            url: self.locator.clone(),
            code: 1005,
            message,
        }
    }
}

#[async_trait]
impl DataReader for MemoryReader {
    async fn read(&self, constraint: &Constraint) -> Result<Vec<DecodedVariable>, DapError> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::with_capacity(constraint.projections.len());

        for projection in &constraint.projections {
            let variable = self
                .dataset
                .variables
                .iter()
                .find(|v| v.name == projection.name)
                .ok_or_else(|| self.constraint_error(format!("No such variable: {}", projection.name)))?;
            let shape = variable.shape();

            let slabs = if projection.slabs.is_empty() {
                shape.iter().map(|&s| Hyperslab::full(s)).collect()
            } else {
                projection.slabs.clone()
            };
            if slabs.len() != shape.len()
                || slabs.iter().zip(&shape).any(|(slab, &size)| slab.stop >= size)
            {
                return Err(self.constraint_error(format!(
                    "Invalid hyperslab for {}: {}",
                    projection.name, projection
                )));
            }

            let data = variable
                .data
                .gather(&flat_indices(&shape, &slabs))
                .ok_or_else(|| {
                    DapError::format("DODS", format!("{} is shorter than its dimensions", variable.name))
                })?;
            out.push(DecodedVariable {
                name: variable.name.clone(),
                shape: slabs.iter().map(Hyperslab::len).collect(),
                data,
            });
        }
        Ok(out)
    }

    fn release(&self) {
        debug!("Released in-memory dataset {}", self.locator);
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> MemoryDataset {
        MemoryDataset::new("grid").with_variable(MemoryVariable::new(
            "v",
            &[("time", 2), ("lat", 2), ("lon", 3)],
            ArrayData::Int32((0..12).collect()),
        ))
    }

    #[test]
    fn flat_indices_follow_row_major_order() {
        let idx = flat_indices(
            &[2, 2, 3],
            &[Hyperslab::index(1), Hyperslab::full(2), Hyperslab::full(3)],
        );
        assert_eq!(idx, vec![6, 7, 8, 9, 10, 11]);

        let strided = flat_indices(
            &[4],
            &[Hyperslab {
                start: 0,
                stride: 2,
                stop: 3,
            }],
        );
        assert_eq!(strided, vec![0, 2]);
    }

    #[tokio::test]
    async fn reads_hyperslabs_and_counts_access() {
        let accessor = MemoryAccessor::new().with_dataset("mem://grid", grid());
        let stats = accessor.stats();
        let dataset = accessor.open("mem://grid", None).await.unwrap();

        let constraint = Constraint::new().project(
            "v",
            vec![Hyperslab::index(0), Hyperslab::index(1), Hyperslab::full(3)],
        );
        let vars = dataset.reader().read(&constraint).await.unwrap();
        assert_eq!(vars[0].shape, vec![1, 1, 3]);
        assert_eq!(vars[0].data, ArrayData::Int32(vec![3, 4, 5]));

        drop(dataset);
        assert_eq!(stats.opens(), 1);
        assert_eq!(stats.reads(), 1);
        assert_eq!(stats.releases(), 1);
    }

    #[tokio::test]
    async fn out_of_bounds_hyperslab_is_a_server_error() {
        let accessor = MemoryAccessor::new().with_dataset("mem://grid", grid());
        let dataset = accessor.open("mem://grid", None).await.unwrap();
        let constraint = Constraint::new().project(
            "v",
            vec![Hyperslab::index(5), Hyperslab::full(2), Hyperslab::full(3)],
        );
        let err = dataset.reader().read(&constraint).await.unwrap_err();
        assert!(matches!(err, DapError::Server { code: 1005, .. }));
    }

    #[tokio::test]
    async fn data_shorter_than_its_dimensions_fails_to_open() {
        let accessor = MemoryAccessor::new().with_dataset(
            "mem://short",
            MemoryDataset::new("short").with_variable(MemoryVariable::new(
                "precipitationCal",
                &[("time", 1), ("lat", 10), ("lon", 10)],
                ArrayData::Float32(vec![0.0; 5]),
            )),
        );
        match accessor.open("mem://short", None).await {
            Err(DapError::Format { what, message }) => {
                assert_eq!(what, "DODS");
                assert!(message.contains("holds 5 values but its dimensions need 100"));
            }
            other => panic!("unexpected {:?}", other.map(|d| d.name().to_string())),
        }
        assert_eq!(accessor.stats().opens(), 0);
    }

    #[tokio::test]
    async fn unknown_locator_and_bad_credentials_fail_to_open() {
        let accessor = MemoryAccessor::new()
            .with_dataset("mem://grid", grid())
            .require_credentials(Credentials::new("tester", "secret"));

        let wrong = Credentials::new("tester", "wrong");
        assert!(matches!(
            accessor.open("mem://grid", Some(&wrong)).await,
            Err(DapError::Authentication { .. })
        ));
        assert!(matches!(
            accessor.open("mem://grid", None).await,
            Err(DapError::Authentication { .. })
        ));

        let right = Credentials::new("tester", "secret");
        assert!(matches!(
            accessor.open("mem://other", Some(&right)).await,
            Err(DapError::Connection { .. })
        ));
        assert_eq!(accessor.stats().opens(), 0);
    }
}
