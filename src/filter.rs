use getset::{CopyGetters, Getters};
use itertools::Itertools;
use log::warn;
use strum::{Display, EnumString};

use crate::error::FilterError;
use crate::record::VariantRecord;
use crate::types::{FieldScope, FieldType, Header, Sample, Value};

/// Retains records on `contig` whose position lies in `[start, end]`.
/// Without an end the range is open to the right.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct RangeFilter {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    end: Option<u64>,
}

impl RangeFilter {
    pub fn new<S: Into<String>>(contig: S, start: u64, end: Option<u64>) -> Self {
        Self {
            contig: contig.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && self.end.map_or(true, |end| position <= end)
    }

    pub fn covers(&self, record: &VariantRecord) -> bool {
        self.contig == record.contig() && self.contains(record.position())
    }
}

/// How the per-value outcomes of a multi-valued field are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchType {
    /// Every value matches; a field without values never does.
    #[default]
    All,
    Any,
    None,
}

impl MatchType {
    pub fn aggregate<I: IntoIterator<Item = bool>>(self, outcomes: I) -> bool {
        let mut outcomes = outcomes.into_iter().peekable();
        match self {
            MatchType::All => outcomes.peek().is_some() && outcomes.all(|matched| matched),
            MatchType::Any => outcomes.any(|matched| matched),
            MatchType::None => !outcomes.any(|matched| matched),
        }
    }
}

/// Presence (or absence) of an INFO flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagFilter {
    pub field: String,
    pub present: bool,
}

impl FlagFilter {
    pub fn new<S: Into<String>>(field: S, present: bool) -> Self {
        Self {
            field: field.into(),
            present,
        }
    }
}

/// Numeric values in `[low, high]`, or `>= low` without `high`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFilter {
    pub scope: FieldScope,
    pub field: String,
    pub low: f64,
    pub high: Option<f64>,
    pub match_type: MatchType,
}

impl NumericFilter {
    pub fn new<S: Into<String>>(scope: FieldScope, field: S, low: f64, high: Option<f64>) -> Self {
        Self {
            scope,
            field: field.into(),
            low,
            high,
            match_type: MatchType::default(),
        }
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        value
            .as_f64()
            .map_or(false, |v| v >= self.low && self.high.map_or(true, |high| v <= high))
    }
}

/// String values containing `needle`, or equal to it when `exact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringFilter {
    pub scope: FieldScope,
    pub field: String,
    pub needle: String,
    pub exact: bool,
    pub match_type: MatchType,
}

impl StringFilter {
    pub fn new<S: Into<String>, T: Into<String>>(
        scope: FieldScope,
        field: S,
        needle: T,
        exact: bool,
    ) -> Self {
        Self {
            scope,
            field: field.into(),
            needle: needle.into(),
            exact,
            match_type: MatchType::default(),
        }
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        match value.as_str() {
            Some(text) if self.exact => text == self.needle,
            Some(text) => text.contains(self.needle.as_str()),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicate {
    Flag(FlagFilter),
    Numeric(NumericFilter),
    Text(StringFilter),
}

impl From<FlagFilter> for FieldPredicate {
    fn from(filter: FlagFilter) -> Self {
        FieldPredicate::Flag(filter)
    }
}

impl From<NumericFilter> for FieldPredicate {
    fn from(filter: NumericFilter) -> Self {
        FieldPredicate::Numeric(filter)
    }
}

impl From<StringFilter> for FieldPredicate {
    fn from(filter: StringFilter) -> Self {
        FieldPredicate::Text(filter)
    }
}

const FLAG_TYPES: &[FieldType] = &[FieldType::Flag];
const NUMERIC_TYPES: &[FieldType] = &[FieldType::Integer, FieldType::Float];
const TEXT_TYPES: &[FieldType] = &[FieldType::String];

impl FieldPredicate {
    fn target(&self) -> (FieldScope, &str, &'static [FieldType]) {
        match self {
            FieldPredicate::Flag(f) => (FieldScope::Info, f.field.as_str(), FLAG_TYPES),
            FieldPredicate::Numeric(f) => (f.scope, f.field.as_str(), NUMERIC_TYPES),
            FieldPredicate::Text(f) => (f.scope, f.field.as_str(), TEXT_TYPES),
        }
    }

    /// Checks that the field is declared with a type this predicate can evaluate.
    pub fn validate(&self, header: &Header) -> Result<(), FilterError> {
        let (scope, field, accepted) = self.target();
        let schema = header
            .schema(scope, field)
            .ok_or_else(|| FilterError::UnknownField {
                scope,
                field: field.into(),
            })?;
        if accepted.contains(&schema.kind()) {
            Ok(())
        } else {
            Err(FilterError::IncompatibleType {
                scope,
                field: field.into(),
                found: schema.kind(),
                expected: accepted.iter().join(" or "),
            })
        }
    }

    pub fn matches(&self, record: &VariantRecord, samples: &[Sample]) -> bool {
        match self {
            FieldPredicate::Flag(f) => record.info_value(&f.field).is_some() == f.present,
            FieldPredicate::Numeric(f) => f.match_type.aggregate(
                record
                    .field_values(f.scope, &f.field, samples)
                    .into_iter()
                    .map(|value| f.accepts(value)),
            ),
            FieldPredicate::Text(f) => f.match_type.aggregate(
                record
                    .field_values(f.scope, &f.field, samples)
                    .into_iter()
                    .map(|value| f.accepts(value)),
            ),
        }
    }
}

/// Ordered position ranges and field predicates, combined with AND.
#[derive(Debug, Clone, Default, Getters)]
#[getset(get = "pub")]
pub struct FilterPipeline {
    ranges: Vec<RangeFilter>,
    predicates: Vec<FieldPredicate>,
    /// Samples whose FORMAT values take part in FORMAT predicates; all if empty.
    samples: Vec<Sample>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.predicates.is_empty()
    }

    pub fn add_range(&mut self, range: RangeFilter) {
        self.ranges.push(range);
    }

    pub fn add_predicate<P: Into<FieldPredicate>>(
        &mut self,
        header: &Header,
        predicate: P,
    ) -> Result<(), FilterError> {
        let predicate = predicate.into();
        predicate.validate(header)?;
        self.predicates.push(predicate);
        Ok(())
    }

    /// Replaces the sample subset. Names the header does not declare are dropped.
    pub fn restrict_samples<I, S>(&mut self, header: &Header, samples: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (known, unknown): (Vec<_>, Vec<_>) = samples
            .into_iter()
            .map(|sample| sample.as_ref().to_owned())
            .partition(|sample| header.samples().contains(sample));
        if !unknown.is_empty() {
            warn!(
                "Ignoring samples not declared in the header: {}",
                unknown.join(", ")
            );
        }
        self.samples = known;
    }

    fn in_range(&self, record: &VariantRecord) -> bool {
        let mut ranges = self
            .ranges
            .iter()
            .filter(|range| range.contig() == record.contig())
            .peekable();
        ranges.peek().is_none() || ranges.any(|range| range.contains(record.position()))
    }

    pub fn accepts(&self, record: &VariantRecord) -> bool {
        self.in_range(record)
            && self
                .predicates
                .iter()
                .all(|predicate| predicate.matches(record, &self.samples))
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::test_utils::header;

    fn record(line: &str) -> VariantRecord {
        VariantRecord::decode(line, &header()).unwrap()
    }

    fn accepts(predicate: impl Into<FieldPredicate>, line: &str) -> bool {
        let header = header();
        let mut pipeline = FilterPipeline::new();
        pipeline.add_predicate(&header, predicate).unwrap();
        pipeline.accepts(&record(line))
    }

    const DEPTH_10: &str = "chr1\t100\trs1\tA\tG\t50\tPASS\tDP=10;AF=0.3,0.2;ZZ=Testable\tGT:DP\t0/1:40\t1/1:10";

    #[test]
    fn test_numeric_low_bound() {
        let dp = |low| NumericFilter::new(FieldScope::Info, "DP", low, None);
        assert!(!accepts(dp(50.0), DEPTH_10));
        assert!(accepts(dp(5.0), DEPTH_10));
        assert!(accepts(
            NumericFilter::new(FieldScope::Info, "DP", 0.0, Some(10.0)),
            DEPTH_10
        ));
        assert!(!accepts(
            NumericFilter::new(FieldScope::Info, "DP", 0.0, Some(9.5)),
            DEPTH_10
        ));
    }

    #[test]
    fn test_position_ranges() {
        let chr1 = record(DEPTH_10);
        let chr2 = record("chr2\t5000\t.\tG\tA\t99\tPASS\tDP=40");

        let mut pipeline = FilterPipeline::new();
        pipeline.add_range(RangeFilter::new("chr1", 1, Some(50)));
        assert!(!pipeline.accepts(&chr1));
        assert!(pipeline.accepts(&chr2));

        pipeline.add_range(RangeFilter::new("chr1", 1, Some(200)));
        assert!(pipeline.accepts(&chr1));

        let mut open = FilterPipeline::new();
        open.add_range(RangeFilter::new("chr1", 100, None));
        assert!(open.accepts(&chr1));
        assert!(RangeFilter::new("chr1", 100, None).covers(&chr1));
        assert!(!RangeFilter::new("chr2", 100, None).covers(&chr1));
    }

    #[test]
    fn test_registration_errors() {
        let header = header();
        let mut pipeline = FilterPipeline::new();
        assert!(matches!(
            pipeline.add_predicate(&header, FlagFilter::new("XX", true)),
            Err(FilterError::UnknownField { .. })
        ));
        match pipeline.add_predicate(&header, NumericFilter::new(FieldScope::Info, "ZZ", 1.0, None))
        {
            Err(FilterError::IncompatibleType {
                found, expected, ..
            }) => {
                assert_eq!(found, FieldType::String);
                assert_eq!(expected, "Integer or Float");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(pipeline
            .add_predicate(&header, FlagFilter::new("DP", true))
            .is_err());
        assert!(pipeline
            .add_predicate(&header, StringFilter::new(FieldScope::Info, "DP", "1", true))
            .is_err());
        // DP is declared in both scopes, ZZ only in INFO
        assert!(pipeline
            .add_predicate(&header, StringFilter::new(FieldScope::Format, "ZZ", "x", false))
            .is_err());
        assert!(pipeline
            .add_predicate(&header, NumericFilter::new(FieldScope::Format, "DP", 1.0, None))
            .is_ok());
        assert_eq!(pipeline.predicates().len(), 1);
    }

    #[test]
    fn test_flag_filter() {
        let flagged = "chr1\t1\t.\tA\tG\t.\tPASS\tDB;DP=1";
        let plain = "chr1\t1\t.\tA\tG\t.\tPASS\tDP=1";
        assert!(accepts(FlagFilter::new("DB", true), flagged));
        assert!(!accepts(FlagFilter::new("DB", true), plain));
        assert!(!accepts(FlagFilter::new("DB", false), flagged));
        assert!(accepts(FlagFilter::new("DB", false), plain));
    }

    #[test]
    fn test_match_types_over_lists() {
        let af = |match_type| {
            NumericFilter::new(FieldScope::Info, "AF", 0.25, None).with_match_type(match_type)
        };
        assert!(!accepts(af(MatchType::All), DEPTH_10));
        assert!(accepts(af(MatchType::Any), DEPTH_10));
        assert!(!accepts(af(MatchType::None), DEPTH_10));

        assert!(!MatchType::All.aggregate(Vec::new()));
        assert!(!MatchType::Any.aggregate(Vec::new()));
        assert!(MatchType::None.aggregate(Vec::new()));
        assert_eq!(MatchType::from_str("ANY").unwrap(), MatchType::Any);
        assert_eq!(MatchType::default().to_string(), "all");
    }

    #[test]
    fn test_string_filter() {
        let zz = |needle, exact| StringFilter::new(FieldScope::Info, "ZZ", needle, exact);
        assert!(accepts(zz("est", false), DEPTH_10));
        assert!(!accepts(zz("Test", true), DEPTH_10));
        assert!(accepts(zz("Testable", true), DEPTH_10));
        // absent field: nothing to match
        assert!(!accepts(zz("est", false), "chr1\t1\t.\tA\tG\t.\tPASS\tDP=1"));
        assert!(accepts(
            zz("est", false).with_match_type(MatchType::None),
            "chr1\t1\t.\tA\tG\t.\tPASS\tDP=1"
        ));
    }

    #[test]
    fn test_sample_subset() {
        let header = header();
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add_predicate(&header, NumericFilter::new(FieldScope::Format, "DP", 30.0, None))
            .unwrap();
        let record = record(DEPTH_10);
        assert!(!pipeline.accepts(&record));

        pipeline.restrict_samples(&header, ["S1", "NOPE"]);
        assert_eq!(pipeline.samples(), &vec!["S1".to_string()]);
        assert!(pipeline.accepts(&record));

        pipeline.restrict_samples(&header, ["S2"]);
        assert!(!pipeline.accepts(&record));
    }
}
