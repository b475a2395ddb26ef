//! Parser for the DAP2 Dataset Attribute Structure (`.das`).

use crate::dap::error::DapError;
use crate::dap::grammar::{base_type, describe_failure, identifier, quoted, ws, ParseResult};
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, map};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, tuple};
use nom::Finish;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(Vec<String>),
    Number(Vec<f64>),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(values) => values.first().copied(),
            AttributeValue::Text(values) => values.first().and_then(|v| v.trim().parse().ok()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(values) => values.first().map(String::as_str),
            AttributeValue::Number(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(values) => write!(f, "{}", values.join(", ")),
            AttributeValue::Number(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub kind: String,
    pub value: AttributeValue,
}

/// Attributes of one container (a variable, a group or the global table).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeTable {
    pub attributes: Vec<Attribute>,
    pub containers: Vec<(String, AttributeTable)>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: "String".to_string(),
            value: AttributeValue::Text(vec![value.to_string()]),
        });
        self
    }

    pub fn with_number(mut self, name: &str, value: f64) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: "Float64".to_string(),
            value: AttributeValue::Number(vec![value]),
        });
        self
    }

    pub fn with_container(mut self, name: &str, table: AttributeTable) -> Self {
        self.containers.push((name.to_string(), table));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.containers.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttributeValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    pub fn container(&self, name: &str) -> Option<&AttributeTable> {
        self.containers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Resolves the container of a (possibly dotted) variable path, trying
    /// the flat name first since servers flatten groups differently.
    pub fn for_variable(&self, path: &str) -> Option<&AttributeTable> {
        if let Some(table) = self.container(path) {
            return Some(table);
        }
        let mut table = self;
        for part in path.split('.') {
            table = table.container(part)?;
        }
        Some(table)
    }

    /// Global attributes: top-level plain attributes plus every `*GLOBAL*`
    /// container (`NC_GLOBAL`, `HDF5_GLOBAL`, ...).
    pub fn globals(&self) -> AttributeTable {
        let mut merged = AttributeTable {
            attributes: self.attributes.clone(),
            containers: Vec::new(),
        };
        for (name, table) in &self.containers {
            if name.to_ascii_uppercase().contains("GLOBAL") {
                merged.attributes.extend(table.attributes.iter().cloned());
            }
        }
        merged
    }
}

enum Entry {
    Attribute(Attribute),
    Container(String, AttributeTable),
}

fn into_table(entries: Vec<Entry>) -> AttributeTable {
    let mut table = AttributeTable::new();
    for entry in entries {
        match entry {
            Entry::Attribute(a) => table.attributes.push(a),
            Entry::Container(name, t) => table.containers.push((name, t)),
        }
    }
    table
}

fn attribute_kind(i: &str) -> ParseResult<'_, String> {
    alt((
        map(base_type, |t| t.keyword().to_string()),
        map(tag_no_case("Alias"), |_| "Alias".to_string()),
        map(tag_no_case("OtherXML"), |_| "OtherXML".to_string()),
    ))(i)
}

fn bare_value(i: &str) -> ParseResult<'_, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != ',' && c != ';'),
        str::to_string,
    )(i)
}

fn attribute(i: &str) -> ParseResult<'_, Attribute> {
    map(
        tuple((
            ws(attribute_kind),
            ws(identifier),
            separated_list1(ws(char(',')), ws(alt((quoted, bare_value)))),
            ws(char(';')),
        )),
        |(kind, name, raw, _)| {
            let numeric = !matches!(kind.as_str(), "String" | "Url" | "Alias" | "OtherXML");
            let value = if numeric {
                let parsed: Option<Vec<f64>> = raw.iter().map(|v| v.parse().ok()).collect();
                parsed.map_or_else(|| AttributeValue::Text(raw.clone()), AttributeValue::Number)
            } else {
                AttributeValue::Text(raw)
            };
            Attribute {
                name: name.to_string(),
                kind,
                value,
            }
        },
    )(i)
}

fn entries(i: &str) -> ParseResult<'_, Vec<Entry>> {
    delimited(ws(char('{')), many0(entry), ws(char('}')))(i)
}

fn container(i: &str) -> ParseResult<'_, Entry> {
    map(tuple((ws(identifier), entries)), |(name, inner)| {
        Entry::Container(name.to_string(), into_table(inner))
    })(i)
}

fn entry(i: &str) -> ParseResult<'_, Entry> {
    alt((container, map(attribute, Entry::Attribute)))(i)
}

fn attributes_document(i: &str) -> ParseResult<'_, AttributeTable> {
    map(
        tuple((ws(tag_no_case("Attributes")), entries, multispace0)),
        |(_, inner, _)| into_table(inner),
    )(i)
}

/// Parses a complete `.das` document.
pub fn parse_das(input: &str) -> Result<AttributeTable, DapError> {
    all_consuming(attributes_document)(input)
        .finish()
        .map(|(_, table)| table)
        .map_err(|e| DapError::format("DAS", describe_failure(input, e.input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMERG_DAS: &str = r#"Attributes {
    precipitationCal {
        String units "mm/hr";
        Float32 _FillValue -9999.90039;
        String long_name "Calibrated precipitation";
        String coordinates "time lon lat";
    }
    time {
        String units "seconds since 1970-01-01 00:00:00 UTC";
        String standard_name "time";
    }
    NC_GLOBAL {
        String FileHeader "DOI=10.5067/GPM/IMERG/3B-HH/07;\nAlgorithmID=3IMERGHH;";
        Int32 valid_range 0, 100;
    }
    Grid {
        precipitation {
            String units "mm/hr";
        }
    }
}"#;

    #[test]
    fn parses_variable_and_global_containers() {
        let das = parse_das(IMERG_DAS).unwrap();
        let precip = das.for_variable("precipitationCal").unwrap();
        assert_eq!(precip.text("units"), Some("mm/hr"));
        assert!((precip.number("_FillValue").unwrap() + 9999.90039).abs() < 1e-9);

        let globals = das.globals();
        assert_eq!(
            globals.get("valid_range"),
            Some(&AttributeValue::Number(vec![0.0, 100.0]))
        );
        assert!(globals.text("FileHeader").unwrap().contains("AlgorithmID"));
    }

    #[test]
    fn resolves_dotted_paths_through_nested_containers() {
        let das = parse_das(IMERG_DAS).unwrap();
        let nested = das.for_variable("Grid.precipitation").unwrap();
        assert_eq!(nested.text("units"), Some("mm/hr"));
        assert!(das.for_variable("Grid.missing").is_none());
    }

    #[test]
    fn keeps_unparseable_numbers_as_text() {
        let das = parse_das("Attributes { v { Float32 odd 1.5e; } }").unwrap();
        assert_eq!(
            das.for_variable("v").unwrap().get("odd"),
            Some(&AttributeValue::Text(vec!["1.5e".to_string()]))
        );
    }

    #[test]
    fn empty_document_has_no_attributes() {
        assert!(parse_das("Attributes {\n}\n").unwrap().is_empty());
    }

    #[test]
    fn rejects_truncated_documents() {
        assert!(parse_das("Attributes { v { String units \"K\"; }").is_err());
    }
}
