mod accessor;
mod cf;
mod credentials;
mod dap;
mod dapview;
mod dataset;
mod error;
mod export;
mod render;
mod utils;

pub use dapview::*;
pub use error::{DapviewError, ErrorKind};

pub use accessor::http::HttpAccessor;
pub use accessor::memory::{AccessStats, MemoryAccessor, MemoryDataset, MemoryVariable};
pub use accessor::{DataReader, DatasetAccessor};

pub use credentials::{Credentials, CredentialsError, PASSWORD_VAR, USERNAME_VAR};

pub use cf::{decode_time, CfDecoding};

pub use dap::constraint::{Constraint, Hyperslab, Projection};
pub use dap::das::{parse_das, Attribute, AttributeTable, AttributeValue};
pub use dap::dds::{parse_dds, BaseType, Dds, Declaration, Dim};
pub use dap::error::DapError;
pub use dap::session::{parse_server_error, DapSession, HttpConfig, DEFAULT_AUTH_HOST};
pub use dap::xdr::{decode_data, decode_dods, ArrayData, DecodedVariable};

pub use dataset::error::SelectError;
pub use dataset::slice::Slice;
pub use dataset::variable::{Selection, Variable};
pub use dataset::{Dataset, DatasetSummary, Dimension, VariableInfo, VariableSummary};

pub use render::colormap::{Colormap, Palette};
pub use render::error::RenderError;
pub use render::figure::{Figure, PlotStyle};
pub use render::viewer::show;

pub use utils::display_available;
