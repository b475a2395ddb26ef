//! Parser for the DAP2 Dataset Descriptor Structure (`.dds`).
//!
//! ```text
//! Dataset {
//!     Grid {
//!      ARRAY:
//!         Float32 precipitationCal[time = 1][lon = 3600][lat = 1800];
//!      MAPS:
//!         Int32 time[time = 1];
//!         Float32 lon[lon = 3600];
//!         Float32 lat[lat = 1800];
//!     } precipitationCal;
//! } 3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5;
//! ```

use crate::dap::error::DapError;
use crate::dap::grammar::{base_type, describe_failure, identifier, ws, ParseResult};
use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{char, multispace0, u64 as parse_u64};
use nom::combinator::{all_consuming, map, verify};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, separated_pair, terminated, tuple};
use nom::Finish;
use serde::Serialize;
use std::fmt;

/// Atomic DAP2 types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BaseType {
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    String,
    Url,
}

impl BaseType {
    pub fn keyword(&self) -> &'static str {
        match self {
            BaseType::Byte => "Byte",
            BaseType::Int16 => "Int16",
            BaseType::UInt16 => "UInt16",
            BaseType::Int32 => "Int32",
            BaseType::UInt32 => "UInt32",
            BaseType::Float32 => "Float32",
            BaseType::Float64 => "Float64",
            BaseType::String => "String",
            BaseType::Url => "Url",
        }
    }

    /// numpy-style name used in dataset summaries.
    pub fn dtype_name(&self) -> &'static str {
        match self {
            BaseType::Byte => "uint8",
            BaseType::Int16 => "int16",
            BaseType::UInt16 => "uint16",
            BaseType::Int32 => "int32",
            BaseType::UInt32 => "uint32",
            BaseType::Float32 => "float32",
            BaseType::Float64 => "float64",
            BaseType::String | BaseType::Url => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, BaseType::String | BaseType::Url)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One array dimension. DAP2 allows anonymous dimensions (`[1800]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dim {
    pub name: Option<String>,
    pub size: usize,
}

impl Dim {
    pub fn named(name: impl Into<String>, size: usize) -> Self {
        Dim {
            name: Some(name.into()),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// A scalar when `dims` is empty, an array otherwise.
    Base {
        base: BaseType,
        name: String,
        dims: Vec<Dim>,
    },
    Structure {
        name: String,
        members: Vec<Declaration>,
    },
    Sequence {
        name: String,
        members: Vec<Declaration>,
    },
    Grid {
        name: String,
        array: Box<Declaration>,
        maps: Vec<Declaration>,
    },
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Base { name, .. }
            | Declaration::Structure { name, .. }
            | Declaration::Sequence { name, .. }
            | Declaration::Grid { name, .. } => name,
        }
    }

    /// Dimensions of a Base array or of a Grid's array part.
    pub fn dims(&self) -> &[Dim] {
        match self {
            Declaration::Base { dims, .. } => dims,
            Declaration::Grid { array, .. } => array.dims(),
            _ => &[],
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        match self {
            Declaration::Base { base, name, dims } => {
                write!(f, "{}{} {}", pad, base, name)?;
                for dim in dims {
                    match &dim.name {
                        Some(n) => write!(f, "[{} = {}]", n, dim.size)?,
                        None => write!(f, "[{}]", dim.size)?,
                    }
                }
                writeln!(f, ";")
            }
            Declaration::Structure { name, members } | Declaration::Sequence { name, members } => {
                let keyword = if matches!(self, Declaration::Structure { .. }) {
                    "Structure"
                } else {
                    "Sequence"
                };
                writeln!(f, "{}{} {{", pad, keyword)?;
                for member in members {
                    member.write_indented(f, depth + 1)?;
                }
                writeln!(f, "{}}} {};", pad, name)
            }
            Declaration::Grid { name, array, maps } => {
                writeln!(f, "{}Grid {{", pad)?;
                writeln!(f, "{}  ARRAY:", pad)?;
                array.write_indented(f, depth + 1)?;
                writeln!(f, "{}  MAPS:", pad)?;
                for m in maps {
                    m.write_indented(f, depth + 1)?;
                }
                writeln!(f, "{}}} {};", pad, name)
            }
        }
    }
}

/// A parsed `.dds` document.
#[derive(Debug, Clone, PartialEq)]
pub struct Dds {
    pub name: String,
    pub declarations: Vec<Declaration>,
}

impl fmt::Display for Dds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset {{")?;
        for decl in &self.declarations {
            decl.write_indented(f, 1)?;
        }
        writeln!(f, "}} {};", self.name)
    }
}

fn dimension(i: &str) -> ParseResult<'_, Dim> {
    delimited(
        ws(char('[')),
        alt((
            map(
                separated_pair(ws(identifier), char('='), ws(parse_u64)),
                |(name, size)| Dim::named(name, size as usize),
            ),
            map(ws(parse_u64), |size| Dim {
                name: None,
                size: size as usize,
            }),
        )),
        ws(char(']')),
    )(i)
}

fn base_declaration(i: &str) -> ParseResult<'_, Declaration> {
    map(
        tuple((
            ws(base_type),
            ws(identifier),
            many0(dimension),
            ws(char(';')),
        )),
        |(base, name, dims, _)| Declaration::Base {
            base,
            name: name.to_string(),
            dims,
        },
    )(i)
}

fn members(i: &str) -> ParseResult<'_, Vec<Declaration>> {
    delimited(ws(char('{')), many0(declaration), ws(char('}')))(i)
}

fn structure_declaration(i: &str) -> ParseResult<'_, Declaration> {
    map(
        tuple((
            ws(tag_no_case("Structure")),
            members,
            ws(identifier),
            many0(dimension),
            ws(char(';')),
        )),
        |(_, members, name, _, _)| Declaration::Structure {
            name: name.to_string(),
            members,
        },
    )(i)
}

fn sequence_declaration(i: &str) -> ParseResult<'_, Declaration> {
    map(
        tuple((
            ws(tag_no_case("Sequence")),
            members,
            ws(identifier),
            ws(char(';')),
        )),
        |(_, members, name, _)| Declaration::Sequence {
            name: name.to_string(),
            members,
        },
    )(i)
}

fn array_part(i: &str) -> ParseResult<'_, Declaration> {
    verify(base_declaration, |d: &Declaration| !d.dims().is_empty())(i)
}

fn grid_declaration(i: &str) -> ParseResult<'_, Declaration> {
    map(
        tuple((
            ws(tag_no_case("Grid")),
            ws(char('{')),
            ws(terminated(tag_no_case("ARRAY"), ws(char(':')))),
            array_part,
            ws(terminated(tag_no_case("MAPS"), ws(char(':')))),
            many1(array_part),
            ws(char('}')),
            ws(identifier),
            ws(char(';')),
        )),
        |(_, _, _, array, _, maps, _, name, _)| Declaration::Grid {
            name: name.to_string(),
            array: Box::new(array),
            maps,
        },
    )(i)
}

fn declaration(i: &str) -> ParseResult<'_, Declaration> {
    alt((
        structure_declaration,
        sequence_declaration,
        grid_declaration,
        base_declaration,
    ))(i)
}

fn dataset(i: &str) -> ParseResult<'_, Dds> {
    map(
        tuple((
            ws(tag_no_case("Dataset")),
            members,
            ws(identifier),
            ws(char(';')),
            multispace0,
        )),
        |(_, declarations, name, _, _)| Dds {
            name: name.to_string(),
            declarations,
        },
    )(i)
}

/// Parses a complete `.dds` document.
pub fn parse_dds(input: &str) -> Result<Dds, DapError> {
    all_consuming(dataset)(input)
        .finish()
        .map(|(_, dds)| dds)
        .map_err(|e| DapError::format("DDS", describe_failure(input, e.input)))
}
