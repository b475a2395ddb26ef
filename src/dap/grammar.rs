//! Lexical pieces shared by the DDS and DAS parsers.

use crate::dap::dds::BaseType;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, tag_no_case, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, value};
use nom::sequence::delimited;
use nom::IResult;

pub(crate) type ParseResult<'a, O> = IResult<&'a str, O>;

/// Wraps a parser so that it skips surrounding whitespace.
pub(crate) fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    F: FnMut(&'a str) -> ParseResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// DAP identifiers are permissive: HDF5-backed servers emit names such as
/// `3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5`.
pub(crate) fn identifier(i: &str) -> ParseResult<'_, &str> {
    take_while1(|c: char| !c.is_whitespace() && !"{}[];=,\"".contains(c))(i)
}

pub(crate) fn base_type(i: &str) -> ParseResult<'_, BaseType> {
    alt((
        value(BaseType::Byte, tag_no_case("Byte")),
        value(BaseType::Int16, tag_no_case("Int16")),
        value(BaseType::UInt16, tag_no_case("UInt16")),
        value(BaseType::Int32, tag_no_case("Int32")),
        value(BaseType::UInt32, tag_no_case("UInt32")),
        value(BaseType::Float32, tag_no_case("Float32")),
        value(BaseType::Float64, tag_no_case("Float64")),
        value(BaseType::String, tag_no_case("String")),
        value(BaseType::Url, tag_no_case("Url")),
    ))(i)
}

/// A double-quoted string with backslash escapes.
pub(crate) fn quoted(i: &str) -> ParseResult<'_, String> {
    alt((
        map(tag("\"\""), |_| String::new()),
        delimited(
            char('"'),
            escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                    value("\t", tag("t")),
                )),
            ),
            char('"'),
        ),
    ))(i)
}

/// Translates a nom failure into a line number and a short excerpt of the
/// offending input.
pub(crate) fn describe_failure(input: &str, rest: &str) -> String {
    let offset = input.len().saturating_sub(rest.len());
    let line = input[..offset].matches('\n').count() + 1;
    let excerpt: String = rest.chars().take(40).collect();
    format!("unexpected input at line {}: '{}'", line, excerpt.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_accepts_hdf5_granule_names() {
        let (rest, name) =
            identifier("3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5;").unwrap();
        assert_eq!(name, "3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5");
        assert_eq!(rest, ";");
    }

    #[test]
    fn base_type_is_case_insensitive() {
        assert_eq!(base_type("float32 x").unwrap().1, BaseType::Float32);
        assert_eq!(base_type("UINT16 x").unwrap().1, BaseType::UInt16);
    }

    #[test]
    fn quoted_handles_escapes_and_empty_strings() {
        assert_eq!(quoted(r#""mm/hr""#).unwrap().1, "mm/hr");
        assert_eq!(quoted(r#""say \"hi\"""#).unwrap().1, "say \"hi\"");
        assert_eq!(quoted(r#""""#).unwrap().1, "");
    }
}
