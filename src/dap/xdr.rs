//! Decoder for DAP2 data responses (`.dods`).
//!
//! A data response is the constrained DDS as text, a `Data:` line and an XDR
//! body. Arrays of numbers carry their element count twice, Byte arrays are
//! packed and padded to four bytes, 16-bit integers and single bytes outside
//! arrays occupy four bytes, strings are length prefixed and padded.

use crate::dap::dds::{parse_dds, BaseType, Dds, Declaration};
use crate::dap::error::DapError;
use log::warn;
use nom::bytes::complete::{tag, take, take_until};
use nom::character::complete::char as byte_char;
use nom::combinator::opt;
use nom::number::complete::{be_f32, be_f64, be_i32, be_u32};
use nom::sequence::tuple;
use nom::IResult;

/// Values of one decoded variable in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Byte(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Str(Vec<String>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Byte(v) => v.len(),
            ArrayData::Int16(v) => v.len(),
            ArrayData::UInt16(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::UInt32(v) => v.len(),
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base_type(&self) -> BaseType {
        match self {
            ArrayData::Byte(_) => BaseType::Byte,
            ArrayData::Int16(_) => BaseType::Int16,
            ArrayData::UInt16(_) => BaseType::UInt16,
            ArrayData::Int32(_) => BaseType::Int32,
            ArrayData::UInt32(_) => BaseType::UInt32,
            ArrayData::Float32(_) => BaseType::Float32,
            ArrayData::Float64(_) => BaseType::Float64,
            ArrayData::Str(_) => BaseType::String,
        }
    }

    /// Widens numeric values to `f64`. Strings yield `None`.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        Some(match self {
            ArrayData::Byte(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Int16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::UInt16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Int32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::UInt32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Float32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ArrayData::Float64(v) => v.clone(),
            ArrayData::Str(_) => return None,
        })
    }

    /// Copies the elements at `indices` into a new array of the same type.
    /// `None` if any index is out of bounds.
    pub fn gather(&self, indices: &[usize]) -> Option<ArrayData> {
        fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Option<Vec<T>> {
            indices.iter().map(|&i| values.get(i).cloned()).collect()
        }
        Some(match self {
            ArrayData::Byte(v) => ArrayData::Byte(pick(v, indices)?),
            ArrayData::Int16(v) => ArrayData::Int16(pick(v, indices)?),
            ArrayData::UInt16(v) => ArrayData::UInt16(pick(v, indices)?),
            ArrayData::Int32(v) => ArrayData::Int32(pick(v, indices)?),
            ArrayData::UInt32(v) => ArrayData::UInt32(pick(v, indices)?),
            ArrayData::Float32(v) => ArrayData::Float32(pick(v, indices)?),
            ArrayData::Float64(v) => ArrayData::Float64(pick(v, indices)?),
            ArrayData::Str(v) => ArrayData::Str(pick(v, indices)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVariable {
    /// Dotted path; Grid arrays use the Grid's name, maps their own.
    pub name: String,
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

type XdrResult<'a, O> = IResult<&'a [u8], O>;

fn truncated(what: &str) -> DapError {
    DapError::format("DODS", format!("payload ended while reading {}", what))
}

struct XdrReader<'a> {
    input: &'a [u8],
}

impl<'a> XdrReader<'a> {
    fn run<O>(&mut self, what: &str, parser: impl FnOnce(&'a [u8]) -> XdrResult<'a, O>) -> Result<O, DapError> {
        let (rest, value) = parser(self.input).map_err(|_| truncated(what))?;
        self.input = rest;
        Ok(value)
    }

    fn u32(&mut self, what: &str) -> Result<u32, DapError> {
        self.run(what, be_u32)
    }

    fn padded_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8], DapError> {
        let bytes = self.run(what, take(len))?;
        let pad = (4 - len % 4) % 4;
        self.run(what, take(pad))?;
        Ok(bytes)
    }

    fn string(&mut self, what: &str) -> Result<String, DapError> {
        let len = self.u32(what)? as usize;
        let bytes = self.padded_bytes(len, what)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn values(&mut self, base: BaseType, count: usize, what: &str) -> Result<ArrayData, DapError> {
        let ints = |reader: &mut Self| -> Result<Vec<i32>, DapError> {
            (0..count).map(|_| reader.run(what, be_i32)).collect()
        };
        Ok(match base {
            BaseType::Int16 => ArrayData::Int16(ints(self)?.into_iter().map(|v| v as i16).collect()),
            BaseType::UInt16 => ArrayData::UInt16(ints(self)?.into_iter().map(|v| v as u16).collect()),
            BaseType::Int32 => ArrayData::Int32(ints(self)?),
            BaseType::UInt32 => {
                ArrayData::UInt32((0..count).map(|_| self.u32(what)).collect::<Result<_, _>>()?)
            }
            BaseType::Float32 => {
                ArrayData::Float32((0..count).map(|_| self.run(what, be_f32)).collect::<Result<_, _>>()?)
            }
            BaseType::Float64 => {
                ArrayData::Float64((0..count).map(|_| self.run(what, be_f64)).collect::<Result<_, _>>()?)
            }
            BaseType::Byte => ArrayData::Byte(self.padded_bytes(count, what)?.to_vec()),
            BaseType::String | BaseType::Url => {
                ArrayData::Str((0..count).map(|_| self.string(what)).collect::<Result<_, _>>()?)
            }
        })
    }

    fn scalar(&mut self, base: BaseType, what: &str) -> Result<ArrayData, DapError> {
        Ok(match base {
            BaseType::Byte => ArrayData::Byte(vec![self.u32(what)? as u8]),
            BaseType::String | BaseType::Url => ArrayData::Str(vec![self.string(what)?]),
            other => self.values(other, 1, what)?,
        })
    }

    fn array(&mut self, base: BaseType, expected: usize, what: &str) -> Result<ArrayData, DapError> {
        let count = self.u32(what)? as usize;
        if !matches!(base, BaseType::String | BaseType::Url) {
            let repeated = self.u32(what)? as usize;
            if repeated != count {
                return Err(DapError::format(
                    "DODS",
                    format!("{}: length words disagree ({} vs {})", what, count, repeated),
                ));
            }
        }
        if count != expected {
            return Err(DapError::format(
                "DODS",
                format!("{}: expected {} values, payload holds {}", what, expected, count),
            ));
        }
        self.values(base, count, what)
    }

    fn declaration(
        &mut self,
        decl: &Declaration,
        prefix: &str,
        out: &mut Vec<DecodedVariable>,
    ) -> Result<(), DapError> {
        let path = format!("{}{}", prefix, decl.name());
        match decl {
            Declaration::Base { base, dims, .. } => {
                let shape: Vec<usize> = dims.iter().map(|d| d.size).collect();
                let data = if dims.is_empty() {
                    self.scalar(*base, &path)?
                } else {
                    self.array(*base, shape.iter().product(), &path)?
                };
                out.push(DecodedVariable {
                    name: path,
                    shape,
                    data,
                });
            }
            Declaration::Structure { members, .. } => {
                let nested = format!("{}.", path);
                for member in members {
                    self.declaration(member, &nested, out)?;
                }
            }
            Declaration::Grid { array, maps, .. } => {
                let (base, dims) = match array.as_ref() {
                    Declaration::Base { base, dims, .. } => (*base, dims),
                    _ => return Err(DapError::Unsupported(format!("non-array Grid {}", path))),
                };
                let shape: Vec<usize> = dims.iter().map(|d| d.size).collect();
                let data = self.array(base, shape.iter().product(), &path)?;
                out.push(DecodedVariable {
                    name: path,
                    shape,
                    data,
                });
                for map in maps {
                    self.declaration(map, prefix, out)?;
                }
            }
            Declaration::Sequence { .. } => {
                return Err(DapError::Unsupported(format!("Sequence {}", path)));
            }
        }
        Ok(())
    }
}

/// Decodes the XDR body that follows the DDS of a data response.
pub fn decode_data(dds: &Dds, payload: &[u8]) -> Result<Vec<DecodedVariable>, DapError> {
    let mut reader = XdrReader { input: payload };
    let mut out = Vec::new();
    for decl in &dds.declarations {
        reader.declaration(decl, "", &mut out)?;
    }
    if !reader.input.is_empty() {
        warn!(
            "{} trailing bytes after decoding data for {}",
            reader.input.len(),
            dds.name
        );
    }
    Ok(out)
}

fn split_response(body: &[u8]) -> XdrResult<'_, &[u8]> {
    let (rest, dds) = take_until(&b"\nData:"[..])(body)?;
    let (rest, _) = tuple((tag(&b"\nData:"[..]), opt(byte_char('\r')), byte_char('\n')))(rest)?;
    Ok((rest, dds))
}

/// Splits a `.dods` body into its DDS and decodes the payload against it.
pub fn decode_dods(body: &[u8]) -> Result<(Dds, Vec<DecodedVariable>), DapError> {
    let (payload, dds_bytes) = split_response(body)
        .map_err(|_| DapError::format("DODS", "no 'Data:' separator in response"))?;
    let dds_text = std::str::from_utf8(dds_bytes)
        .map_err(|e| DapError::format("DODS", format!("DDS section is not UTF-8: {}", e)))?;
    let dds = parse_dds(dds_text)?;
    let variables = decode_data(&dds, payload)?;
    Ok((dds, variables))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn f32_array(values: &[f32]) -> Vec<u8> {
        let mut out = words(&[values.len() as u32, values.len() as u32]);
        for v in values {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    #[test]
    fn decodes_grid_array_followed_by_maps() {
        let dds = "Dataset {\n    Grid {\n     ARRAY:\n        Float32 precip[time = 1][lat = 2][lon = 2];\n     MAPS:\n        Int32 time[time = 1];\n        Float32 lat[lat = 2];\n        Float32 lon[lon = 2];\n    } precip;\n} imerg;\n";
        let mut body = dds.as_bytes().to_vec();
        body.extend_from_slice(b"Data:\n");
        body.extend(f32_array(&[0.0, 0.5, 1.0, 1.5]));
        body.extend(words(&[1, 1, 1_677_628_800]));
        body.extend(f32_array(&[-89.95, -89.85]));
        body.extend(f32_array(&[-179.95, -179.85]));

        let (parsed, vars) = decode_dods(&body).unwrap();
        assert_eq!(parsed.name, "imerg");
        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["precip", "time", "lat", "lon"]);
        assert_eq!(vars[0].shape, vec![1, 2, 2]);
        assert_eq!(vars[0].data, ArrayData::Float32(vec![0.0, 0.5, 1.0, 1.5]));
        assert_eq!(vars[1].data, ArrayData::Int32(vec![1_677_628_800]));
    }

    #[test]
    fn decodes_padded_bytes_short_ints_strings_and_structures() {
        let dds = parse_dds(
            "Dataset {\n  Byte mask[x = 3];\n  Int16 source[x = 2];\n  Structure {\n    String label;\n    Float64 scale;\n  } meta;\n} mixed;",
        )
        .unwrap();
        let mut payload = words(&[3, 3]);
        payload.extend_from_slice(&[1, 0, 7, 0]);
        payload.extend(words(&[2, 2]));
        payload.extend((-3i32).to_be_bytes());
        payload.extend(12i32.to_be_bytes());
        payload.extend(words(&[5]));
        payload.extend_from_slice(b"hello\0\0\0");
        payload.extend(0.25f64.to_be_bytes());

        let vars = decode_data(&dds, &payload).unwrap();
        assert_eq!(vars[0].data, ArrayData::Byte(vec![1, 0, 7]));
        assert_eq!(vars[1].data, ArrayData::Int16(vec![-3, 12]));
        assert_eq!(vars[2].name, "meta.label");
        assert_eq!(vars[2].data, ArrayData::Str(vec!["hello".to_string()]));
        assert!(vars[2].shape.is_empty());
        assert_eq!(vars[3].data, ArrayData::Float64(vec![0.25]));
    }

    #[test]
    fn rejects_counts_that_disagree_with_the_dds() {
        let dds = parse_dds("Dataset {\n  Float32 v[x = 3];\n} d;").unwrap();
        let err = decode_data(&dds, &f32_array(&[1.0, 2.0])).unwrap_err();
        assert!(err.to_string().contains("Malformed DODS"), "{}", err);
    }

    #[test]
    fn reports_truncated_payloads() {
        let dds = parse_dds("Dataset {\n  Float32 v[x = 2];\n} d;").unwrap();
        let mut payload = f32_array(&[1.0, 2.0]);
        payload.truncate(payload.len() - 2);
        assert!(matches!(
            decode_data(&dds, &payload),
            Err(DapError::Format { what: "DODS", .. })
        ));
    }

    #[test]
    fn missing_separator_is_a_format_error() {
        assert!(matches!(
            decode_dods(b"Dataset { Float32 v; } d;"),
            Err(DapError::Format { .. })
        ));
    }

    #[test]
    fn gather_rejects_out_of_bounds_indices() {
        let data = ArrayData::Int16(vec![4, 5, 6]);
        assert_eq!(data.gather(&[2, 0]), Some(ArrayData::Int16(vec![6, 4])));
        assert_eq!(data.gather(&[3]), None);
    }

    #[test]
    fn sequences_are_unsupported() {
        let dds = parse_dds("Dataset {\n  Sequence {\n    Int32 id;\n  } obs;\n} d;").unwrap();
        assert!(matches!(
            decode_data(&dds, &[]),
            Err(DapError::Unsupported(_))
        ));
    }
}
