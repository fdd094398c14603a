use getset::{CopyGetters, Getters};
use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::{FormatError, Result, VariantError};
use crate::parser;
use crate::record::decode;
use crate::record::GenotypeAllele;
use crate::types::{FieldScope, FieldValue, Fields, Header, Sample, Value};

const CHROM: usize = 0;
const POS: usize = 1;
const ID: usize = 2;
const REF: usize = 3;
const ALT: usize = 4;
const QUAL: usize = 5;
const FILTER: usize = 6;
const INFO: usize = 7;
const FORMAT: usize = 8;

/// CHROM through INFO; FORMAT and the sample columns are optional.
const MIN_COLUMNS: usize = INFO + 1;

/// One decoded body line. Immutable once constructed; all classification
/// accessors are derived from the stored columns on every call.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct VariantRecord {
    columns: Vec<String>,
    #[getset(get_copy = "pub")]
    position: u64,
    #[getset(get_copy = "pub")]
    contig_length: Option<u64>,
    #[getset(get = "pub")]
    identifiers: Vec<String>,
    #[getset(get_copy = "pub")]
    quality: f64,
    #[getset(get = "pub")]
    info: Fields,
    #[getset(get = "pub")]
    genotypes: IndexMap<Sample, Fields>,
}

impl VariantRecord {
    /// Decodes a single tab-separated body line (without line terminator).
    ///
    /// # Examples
    ///
    /// ```
    /// use vcf_stream::{HeaderBuilder, VariantRecord};
    ///
    /// let mut builder = HeaderBuilder::new();
    /// for line in [
    ///     "##fileformat=VCFv4.2",
    ///     "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total Depth\">",
    ///     "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">",
    ///     "##contig=<ID=chr1,length=249250621>",
    ///     "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1",
    /// ] {
    ///     builder.push(line)?;
    /// }
    /// let header = builder.build();
    ///
    /// let record = VariantRecord::decode("chr1\t100\trs1\tA\tG\t50\tPASS\tDP=10\tGT\t0/1", &header)?;
    /// assert_eq!(record.position(), 100);
    /// assert!(record.is_single_nucleotide_variant());
    /// assert!(record.has_known_variant_id());
    /// # Ok::<(), vcf_stream::VcfError>(())
    /// ```
    pub fn decode(line: &str, header: &Header) -> Result<Self> {
        Self::from_columns(line.split('\t').map(str::to_owned).collect(), header)
    }

    pub fn from_columns(columns: Vec<String>, header: &Header) -> Result<Self> {
        if columns.len() < MIN_COLUMNS {
            return Err(FormatError::MissingColumns {
                expected: MIN_COLUMNS,
                found: columns.len(),
            }
            .into());
        }
        let contig = &columns[CHROM];
        let contig_length = header
            .contig(contig)
            .ok_or_else(|| FormatError::UndeclaredContig {
                contig: contig.clone(),
            })?
            .length();

        let position = parser::leading_position(&columns[POS]).ok_or_else(|| {
            VariantError::Unrepresentable {
                contig: contig.clone(),
                position: columns[POS].clone(),
            }
        })?;
        let position = u64::try_from(position).map_err(|_| VariantError::NegativePosition {
            contig: contig.clone(),
            position,
        })?;
        if let Some(length) = contig_length {
            if position > length.saturating_add(1) {
                return Err(VariantError::BeyondContig {
                    contig: contig.clone(),
                    position,
                    length,
                }
                .into());
            }
        }

        let identifiers = columns[ID].split(';').map(str::to_owned).collect();
        let quality = parser::leading_float(&columns[QUAL]);
        let info = decode::info(&columns[INFO], header.info())?;
        let genotypes = match columns.get(FORMAT) {
            Some(keys) => decode::genotypes(
                keys,
                &columns[FORMAT + 1..],
                header.samples(),
                header.format(),
            )?,
            None => IndexMap::new(),
        };

        Ok(Self {
            columns,
            position,
            contig_length,
            identifiers,
            quality,
            info,
            genotypes,
        })
    }

    pub fn contig(&self) -> &str {
        &self.columns[CHROM]
    }

    /// Alias of [`VariantRecord::contig`].
    pub fn chrom(&self) -> &str {
        self.contig()
    }

    /// The contig name without a leading `chr`.
    pub fn simple_contig(&self) -> &str {
        let contig = self.contig();
        contig.strip_prefix("chr").unwrap_or(contig)
    }

    pub fn reference(&self) -> &str {
        &self.columns[REF]
    }

    /// The ALT column as written, e.g. `A,T` for a multi-allelic site.
    pub fn alternate(&self) -> &str {
        &self.columns[ALT]
    }

    pub fn alternates(&self) -> Vec<&str> {
        self.alternate().split(',').collect()
    }

    pub fn filter_status(&self) -> &str {
        &self.columns[FILTER]
    }

    pub fn passing(&self) -> bool {
        self.filter_status().eq_ignore_ascii_case("pass")
    }

    pub fn is_telomere(&self) -> bool {
        self.position == 0
            || self
                .contig_length
                .map_or(false, |length| self.position == length.saturating_add(1))
    }

    pub fn has_identifier(&self) -> bool {
        self.identifiers.first().map_or(false, |id| id != ".")
    }

    /// Whether any identifier looks like a dbSNP id (`rs...`).
    pub fn has_known_variant_id(&self) -> bool {
        self.has_identifier()
            && self.identifiers.iter().any(|id| {
                id.get(..2)
                    .map_or(false, |prefix| prefix.eq_ignore_ascii_case("rs"))
            })
    }

    pub fn is_reference_call(&self) -> bool {
        self.alternate() == "."
    }

    pub fn is_single_nucleotide_variant(&self) -> bool {
        !self.is_reference_call() && self.reference().len() == 1 && self.alternate().len() == 1
    }

    /// Catches the relatively unusual multi-nucleotide polymorphism some callers emit.
    pub fn is_multi_nucleotide_polymorphism(&self) -> bool {
        !self.is_reference_call()
            && self.reference().len() > 1
            && self.reference().len() == self.alternate().len()
    }

    pub fn is_insertion(&self) -> bool {
        !self.is_reference_call() && self.alternate().len() > self.reference().len()
    }

    pub fn is_deletion(&self) -> bool {
        !self.is_reference_call() && self.reference().len() > self.alternate().len()
    }

    /// The input line, reassembled from its columns.
    pub fn raw_line(&self) -> String {
        self.columns.iter().join("\t")
    }

    pub fn info_value(&self, field: &str) -> Option<&FieldValue> {
        self.info.get(field)
    }

    pub fn format_value(&self, sample: &str, field: &str) -> Option<&FieldValue> {
        self.genotypes.get(sample).and_then(|fields| fields.get(field))
    }

    /// The GT alleles of `sample`, if GT is present and well-formed.
    pub fn genotype(&self, sample: &str) -> Option<Vec<GenotypeAllele>> {
        let gt = self.format_value(sample, "GT")?.scalar()?.as_str()?;
        parser::genotype(gt)
    }

    fn sample_values(&self, sample: &str, field: &str) -> &[Value] {
        self.format_value(sample, field)
            .map(FieldValue::values)
            .unwrap_or_default()
    }

    /// Flattens the values of `field`. For INFO this is the value itself (a
    /// scalar becomes a one-element list); for FORMAT the values of every
    /// sample in `samples` (all samples of the record if empty) are
    /// concatenated in order. Missing fields contribute nothing.
    pub fn field_values(&self, scope: FieldScope, field: &str, samples: &[Sample]) -> Vec<&Value> {
        match scope {
            FieldScope::Info => self
                .info_value(field)
                .map(FieldValue::values)
                .unwrap_or_default()
                .iter()
                .collect(),
            FieldScope::Format if samples.is_empty() => self
                .genotypes
                .keys()
                .flat_map(|sample| self.sample_values(sample, field))
                .collect(),
            FieldScope::Format => samples
                .iter()
                .flat_map(|sample| self.sample_values(sample, field))
                .collect(),
        }
    }
}
