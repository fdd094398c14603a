use std::collections::HashMap;
use std::str::FromStr;

use getset::{CopyGetters, Getters};
use indexmap::IndexMap;
use multimap::MultiMap;
use strum::{Display, EnumString};

use crate::error::{FormatError, Result, VcfError};
use crate::parser;

#[cfg(not(feature = "sync"))]
pub type Shared<T> = std::rc::Rc<T>;
#[cfg(feature = "sync")]
pub type Shared<T> = std::sync::Arc<T>;

pub type Sample = String;

/// Decoded INFO fields of a record, or FORMAT fields of one sample, in column order.
pub type Fields = IndexMap<String, FieldValue>;

/// CHROM, POS, ID, REF, ALT, QUAL, FILTER, INFO, FORMAT
pub(crate) const FIXED_COLUMNS: usize = 9;

#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumString, Display)]
pub enum FieldType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

/// Declared cardinality of a field ("Number").
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Number {
    Count(usize),
    Alleles,
    AlternateAlleles,
    Genotypes,
    Unknown,
}

impl Number {
    /// Only fields declared with `Number=1` decode to a single value.
    pub fn is_scalar(self) -> bool {
        self == Number::Count(1)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum FieldScope {
    #[strum(to_string = "INFO")]
    Info,
    #[strum(to_string = "FORMAT")]
    Format,
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct FieldSchema {
    #[getset(get = "pub")]
    id: String,
    #[getset(get_copy = "pub")]
    number: Number,
    #[getset(get_copy = "pub")]
    kind: FieldType,
    #[getset(get = "pub")]
    description: String,
    // Source, Version, ...
    #[getset(get = "pub")]
    additional: HashMap<String, String>,
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for FieldSchema {
    type Error = String;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> std::result::Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        let id = h.remove("ID").ok_or("ID is mandatory")?;
        let number = h.remove("Number").ok_or("Number is mandatory")?;
        let number = parser::number(number).ok_or_else(|| format!("invalid Number {}", number))?;
        let kind = h.remove("Type").ok_or("Type is mandatory")?;
        let kind = FieldType::from_str(kind).map_err(|_| format!("invalid Type {}", kind))?;
        Ok(FieldSchema {
            id: id.into(),
            number,
            kind,
            description: h.remove("Description").unwrap_or_default().into(),
            additional: h.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct HeaderContig {
    #[getset(get = "pub")]
    id: String,
    #[getset(get_copy = "pub")]
    length: Option<u64>,
    #[getset(get = "pub")]
    additional: HashMap<String, String>,
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for HeaderContig {
    type Error = String;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> std::result::Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        let id = h.remove("ID").ok_or("ID is mandatory")?;
        let length = match h.remove("length") {
            Some(s) => Some(
                s.parse::<u64>()
                    .ok()
                    .filter(|&length| length > 0)
                    .ok_or_else(|| format!("invalid length {}", s))?,
            ),
            None => None,
        };
        Ok(HeaderContig {
            id: id.into(),
            length,
            additional: h.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct HeaderFilter {
    id: String,
    description: String,
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for HeaderFilter {
    type Error = String;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> std::result::Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        Ok(HeaderFilter {
            id: h.remove("ID").ok_or("ID is mandatory")?.into(),
            description: h.remove("Description").unwrap_or_default().into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Filter(HeaderFilter),
    Structured(IndexMap<String, String>),
}

/// The parsed, immutable VCF header.
#[derive(Debug, Clone, Default, Getters)]
#[getset(get = "pub")]
pub struct Header {
    /// `##key=value` lines other than INFO, FORMAT and contig.
    meta: MultiMap<String, HeaderValue>,
    info: IndexMap<String, FieldSchema>,
    format: IndexMap<String, FieldSchema>,
    contigs: IndexMap<String, HeaderContig>,
    samples: Vec<Sample>,
    /// Every header line, verbatim and in file order.
    lines: Vec<String>,
}

impl Header {
    pub fn fields(&self, scope: FieldScope) -> &IndexMap<String, FieldSchema> {
        match scope {
            FieldScope::Info => &self.info,
            FieldScope::Format => &self.format,
        }
    }

    pub fn schema(&self, scope: FieldScope, id: &str) -> Option<&FieldSchema> {
        self.fields(scope).get(id)
    }

    pub fn contig(&self, id: &str) -> Option<&HeaderContig> {
        self.contigs.get(id)
    }

    pub fn filters(&self) -> Vec<&HeaderFilter> {
        self.meta
            .get_vec("FILTER")
            .map(|values| {
                values
                    .iter()
                    .filter_map(|value| match value {
                        HeaderValue::Filter(f) => Some(f),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Accumulates header lines until the `#CHROM` line, then freezes into a [`Header`].
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    header: Header,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of header lines consumed so far.
    pub fn lines_seen(&self) -> usize {
        self.header.lines.len()
    }

    /// Consumes one header line. Returns `true` once the sample declaration
    /// line has been seen; no further lines belong to the header after that.
    pub fn push(&mut self, line: &str) -> Result<bool> {
        if !line.starts_with('#') {
            if self.header.lines.is_empty() {
                return Err(VcfError::Filetype { line: line.into() });
            }
            return Err(FormatError::MalformedHeader {
                line: self.header.lines.len() + 1,
                reason: "variant data before the #CHROM line".into(),
            }
            .into());
        }
        self.header.lines.push(line.into());
        let line_number = self.header.lines.len();

        if line.starts_with("#CHROM") {
            self.header.samples = line
                .split('\t')
                .skip(FIXED_COLUMNS)
                .map(str::to_owned)
                .collect();
            return Ok(true);
        }
        if let Some(entry) = line.strip_prefix("##") {
            self.metadata(line_number, entry)?;
        }
        Ok(false)
    }

    fn metadata(&mut self, line_number: usize, entry: &str) -> Result<()> {
        let (key, value) = match parser::header_entry(entry) {
            Some(kv) => kv,
            // bare `##comment`
            None => return Ok(()),
        };
        let malformed = |reason: String| FormatError::MalformedHeader {
            line: line_number,
            reason,
        };
        let structured = || {
            parser::structured(value)
                .ok_or_else(|| malformed(format!("expected {}=<key=value,...>", key)))
        };
        match key {
            "INFO" | "FORMAT" => {
                let schema = FieldSchema::try_from(structured()?).map_err(malformed)?;
                let registry = if key == "INFO" {
                    &mut self.header.info
                } else {
                    &mut self.header.format
                };
                registry.insert(schema.id.clone(), schema);
            }
            "contig" => {
                let contig = HeaderContig::try_from(structured()?).map_err(malformed)?;
                self.header.contigs.insert(contig.id.clone(), contig);
            }
            "FILTER" => {
                let filter = HeaderFilter::try_from(structured()?).map_err(malformed)?;
                self.header
                    .meta
                    .insert(key.into(), HeaderValue::Filter(filter));
            }
            _ => {
                let value = match parser::structured(value) {
                    Some(pairs) => HeaderValue::Structured(
                        pairs
                            .into_iter()
                            .map(|(k, v)| (k.into(), v.into()))
                            .collect(),
                    ),
                    None => HeaderValue::String(value.into()),
                };
                self.header.meta.insert(key.into(), value);
            }
        }
        Ok(())
    }

    pub fn build(self) -> Header {
        self.header
    }
}

/// A single decoded INFO or FORMAT value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Character(char),
    /// Only ever `true`; absent flags are not stored.
    Flag(bool),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

/// A decoded field: scalar for `Number=1`, list for any other cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    List(Vec<Value>),
}

impl FieldValue {
    /// All values of this field, a scalar being a one-element slice.
    pub fn values(&self) -> &[Value] {
        match self {
            FieldValue::Scalar(v) => std::slice::from_ref(v),
            FieldValue::List(v) => v,
        }
    }

    pub fn scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::List(_) => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldValue::List(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{header, HEADER};

    #[test]
    fn test_builder_collects_schemas() {
        let header = header();
        assert_eq!(header.samples(), &vec!["S1".to_string(), "S2".to_string()]);
        assert_eq!(header.contig("chr1").and_then(|c| c.length()), Some(249250621));
        assert_eq!(header.contig("chrUn").and_then(|c| c.length()), None);

        let dp = header.schema(FieldScope::Info, "DP").unwrap();
        assert_eq!(dp.kind(), FieldType::Integer);
        assert_eq!(dp.number(), Number::Count(1));
        let af = header.schema(FieldScope::Info, "AF").unwrap();
        assert_eq!(af.number(), Number::AlternateAlleles);
        assert_eq!(
            af.description(),
            "Allele Frequency, for each ALT allele, in the same order as listed"
        );
        let gt = header.schema(FieldScope::Format, "GT").unwrap();
        assert_eq!(gt.kind(), FieldType::String);
        assert!(header.schema(FieldScope::Format, "DB").is_none());
    }

    #[test]
    fn test_raw_lines_and_meta() {
        let header = header();
        assert_eq!(header.lines().len(), HEADER.lines().count());
        assert_eq!(header.lines()[0], "##fileformat=VCFv4.2");
        assert!(header.lines().last().unwrap().starts_with("#CHROM"));
        assert_eq!(
            header.meta().get("fileformat"),
            Some(&HeaderValue::String("VCFv4.2".into()))
        );
        let filters = header.filters();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[1].id(), "LowQual");
    }

    #[test]
    fn test_not_a_vcf() {
        let mut builder = HeaderBuilder::new();
        let err = builder.push("chr1\t100\t.\tA\tG").unwrap_err();
        assert!(matches!(err, VcfError::Filetype { .. }));
    }

    #[test]
    fn test_missing_mandatory_key() {
        let mut builder = HeaderBuilder::new();
        builder.push("##fileformat=VCFv4.2").unwrap();
        let err = builder
            .push("##INFO=<ID=DP,Type=Integer,Description=\"depth\">")
            .unwrap_err();
        assert!(matches!(
            err,
            VcfError::Format(FormatError::MalformedHeader { line: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_contig_length() {
        for length in ["1.5e3", "abc", "-5", "0", ""] {
            let mut builder = HeaderBuilder::new();
            builder.push("##fileformat=VCFv4.2").unwrap();
            let err = builder
                .push(&format!("##contig=<ID=c,length={}>", length))
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    VcfError::Format(FormatError::MalformedHeader { line: 2, .. })
                ),
                "length={}",
                length
            );
        }
    }

    #[test]
    fn test_sample_line_terminates_header() {
        let mut builder = HeaderBuilder::new();
        assert!(!builder.push("##fileformat=VCFv4.2").unwrap());
        assert!(!builder.push("# free-form comment").unwrap());
        assert!(builder
            .push("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")
            .unwrap());
        let header = builder.build();
        assert!(header.samples().is_empty());
        assert_eq!(header.lines().len(), 3);
    }

    #[test]
    fn test_field_value_shapes() {
        let scalar = FieldValue::Scalar(Value::Integer(3));
        assert_eq!(scalar.values(), &[Value::Integer(3)]);
        assert!(!scalar.is_list());
        let list = FieldValue::List(vec![Value::Float(0.5), Value::Float(0.25)]);
        assert_eq!(list.values().len(), 2);
        assert!(list.scalar().is_none());
        assert_eq!(Value::Integer(7).as_f64(), Some(7.0));
        assert_eq!(Value::String("x".into()).as_f64(), None);
    }
}
