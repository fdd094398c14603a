use std::io::{BufRead, BufReader, Read};
use std::mem;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::{FormatError, Result, VcfError};
use crate::filter::{
    FieldPredicate, FilterPipeline, FlagFilter, MatchType, NumericFilter, RangeFilter,
    StringFilter,
};
use crate::record::VariantRecord;
use crate::types::{FieldScope, Header, HeaderBuilder, Shared};

/// Returned by [`Observer::on_record_accepted`] to keep reading or to pause intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Pause,
}

/// Why [`VcfStream::resume`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The `#CHROM` line was read. Filters can be registered before resuming.
    HeaderComplete,
    /// The observer asked to pause after an accepted record.
    Paused,
    /// The input is exhausted.
    Complete,
}

/// Receives the stream's signals, in order: header complete once, record
/// accepted per retained record, stream complete once.
pub trait Observer {
    fn on_header_complete(&mut self, _header: &Header) {}

    fn on_record_accepted(&mut self, _record: &VariantRecord) -> Control {
        Control::Continue
    }

    fn on_stream_complete(&mut self) {}
}

impl Observer for () {}

enum Mode {
    Header(HeaderBuilder),
    Body,
    Complete,
    Failed,
}

/// Pull-driven VCF reader. Lines are consumed one at a time on [`resume`],
/// first to build the [`Header`], then decoded into [`VariantRecord`]s that
/// pass the registered filters and are stored per contig.
///
/// [`resume`]: VcfStream::resume
pub struct VcfStream<R: BufRead> {
    inner: R,
    mode: Mode,
    header: Shared<Header>,
    filters: FilterPipeline,
    variants: IndexMap<String, Vec<VariantRecord>>,
    line: String,
    line_number: usize,
    accepted: usize,
    rejected: usize,
}

impl VcfStream<BufReader<Box<dyn Read>>> {
    /// Opens a plain or compressed VCF file.
    ///
    /// # Examples
    ///
    /// ```
    /// use vcf_stream::{Progress, VcfStream};
    ///
    /// let mut stream = VcfStream::from_path("resources/example.vcf.gz")?;
    /// assert_eq!(stream.resume(&mut ())?, Progress::HeaderComplete);
    /// assert_eq!(stream.header().samples(), &["NA001", "NA002"]);
    ///
    /// stream.add_flag_filter("DB", true)?;
    /// stream.read_to_end(&mut ())?;
    /// assert_eq!(stream.all_records().len(), 4);
    /// # Ok::<(), vcf_stream::VcfError>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (reader, _format) = niffler::from_path(path)?;
        Ok(Self::new(BufReader::new(reader)))
    }
}

impl<R: BufRead> VcfStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: reader,
            mode: Mode::Header(HeaderBuilder::new()),
            header: Shared::new(Header::default()),
            filters: FilterPipeline::new(),
            variants: IndexMap::new(),
            line: String::new(),
            line_number: 0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Empty until the header is complete.
    pub fn header(&self) -> &Header {
        self.header.as_ref()
    }

    pub fn shared_header(&self) -> Shared<Header> {
        self.header.clone()
    }

    pub fn is_header_complete(&self) -> bool {
        !matches!(self.mode, Mode::Header(_))
    }

    pub fn filters(&self) -> &FilterPipeline {
        &self.filters
    }

    /// Consumes lines until the header completes, the observer pauses, or the
    /// input ends.
    ///
    /// A [`VcfError::Variant`] only loses the offending line and reading may
    /// continue with another call. Any other error aborts the stream and all
    /// later calls return [`VcfError::Aborted`].
    pub fn resume<O: Observer + ?Sized>(&mut self, observer: &mut O) -> Result<Progress> {
        match self.mode {
            Mode::Complete => return Ok(Progress::Complete),
            Mode::Failed => return Err(VcfError::Aborted),
            Mode::Header(_) | Mode::Body => {}
        }
        let progress = self.advance(observer);
        if let Err(err) = &progress {
            if !matches!(err, VcfError::Variant(_)) {
                self.mode = Mode::Failed;
            }
        }
        progress
    }

    /// Resumes until the input is exhausted, ignoring pauses.
    pub fn read_to_end<O: Observer + ?Sized>(&mut self, observer: &mut O) -> Result<()> {
        while self.resume(observer)? != Progress::Complete {}
        Ok(())
    }

    fn advance<O: Observer + ?Sized>(&mut self, observer: &mut O) -> Result<Progress> {
        while self.next_line()? {
            if self.line.is_empty() {
                continue;
            }
            if let Mode::Header(builder) = &mut self.mode {
                if builder.push(&self.line)? {
                    self.complete_header(observer);
                    return Ok(Progress::HeaderComplete);
                }
            } else if self.process(observer)? == Control::Pause {
                return Ok(Progress::Paused);
            }
        }
        self.finish(observer)
    }

    /// Reads the next line into the buffer without its terminator.
    fn next_line(&mut self) -> Result<bool> {
        let mut line = mem::take(&mut self.line);
        line.clear();
        let read = self.inner.read_line(&mut line);
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        self.line = line;
        if read? == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        Ok(true)
    }

    fn complete_header<O: Observer + ?Sized>(&mut self, observer: &mut O) {
        if let Mode::Header(builder) = mem::replace(&mut self.mode, Mode::Body) {
            self.header = Shared::new(builder.build());
        }
        self.variants = self
            .header
            .contigs()
            .keys()
            .map(|contig| (contig.clone(), Vec::new()))
            .collect();
        debug!(
            "Header complete after {} lines: {} contigs, {} INFO and {} FORMAT fields, {} samples",
            self.line_number,
            self.header.contigs().len(),
            self.header.info().len(),
            self.header.format().len(),
            self.header.samples().len()
        );
        observer.on_header_complete(&self.header);
    }

    fn process<O: Observer + ?Sized>(&mut self, observer: &mut O) -> Result<Control> {
        let record = VariantRecord::decode(&self.line, &self.header)?;
        if !self.filters.accepts(&record) {
            self.rejected += 1;
            trace!(
                "Rejected {}:{} on line {}",
                record.contig(),
                record.position(),
                self.line_number
            );
            return Ok(Control::Continue);
        }
        self.accepted += 1;
        let records = self
            .variants
            .entry(record.contig().to_owned())
            .or_default();
        records.push(record);
        Ok(records
            .last()
            .map_or(Control::Continue, |record| observer.on_record_accepted(record)))
    }

    fn finish<O: Observer + ?Sized>(&mut self, observer: &mut O) -> Result<Progress> {
        if let Mode::Header(builder) = &self.mode {
            let seen = builder.lines_seen();
            if seen == 0 {
                return Err(VcfError::Filetype { line: String::new() });
            }
            return Err(FormatError::MalformedHeader {
                line: seen,
                reason: "input ended before the #CHROM line".into(),
            }
            .into());
        }
        self.mode = Mode::Complete;
        debug!(
            "Stream complete after {} lines: {} records accepted, {} rejected",
            self.line_number, self.accepted, self.rejected
        );
        observer.on_stream_complete();
        Ok(Progress::Complete)
    }

    pub fn add_range(&mut self, range: RangeFilter) {
        self.filters.add_range(range);
    }

    /// Registers a predicate against the header's schemas. Needs a complete
    /// header; before that every field is unknown.
    pub fn add_predicate<P: Into<FieldPredicate>>(&mut self, predicate: P) -> Result<()> {
        Ok(self.filters.add_predicate(&self.header, predicate)?)
    }

    pub fn add_flag_filter(&mut self, field: &str, present: bool) -> Result<()> {
        self.add_predicate(FlagFilter::new(field, present))
    }

    pub fn add_numeric_filter(
        &mut self,
        scope: FieldScope,
        field: &str,
        low: f64,
        high: Option<f64>,
        match_type: MatchType,
    ) -> Result<()> {
        self.add_predicate(NumericFilter::new(scope, field, low, high).with_match_type(match_type))
    }

    pub fn add_string_filter(
        &mut self,
        scope: FieldScope,
        field: &str,
        needle: &str,
        exact: bool,
        match_type: MatchType,
    ) -> Result<()> {
        self.add_predicate(
            StringFilter::new(scope, field, needle, exact).with_match_type(match_type),
        )
    }

    pub fn restrict_samples<I, S>(&mut self, samples: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filters.restrict_samples(&self.header, samples);
    }

    /// Accepted records per contig, declared contigs first in header order.
    pub fn variants(&self) -> &IndexMap<String, Vec<VariantRecord>> {
        &self.variants
    }

    pub fn records(&self, contig: &str) -> &[VariantRecord] {
        self.variants
            .get(contig)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All accepted records so far, contig by contig.
    pub fn all_records(&self) -> Vec<&VariantRecord> {
        self.variants.values().flatten().collect()
    }

    pub fn into_variants(self) -> IndexMap<String, Vec<VariantRecord>> {
        self.variants
    }
}
