use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};

use vcf_stream::{FieldScope, MatchType, RangeFilter, VcfStream};

#[derive(Parser, Debug)]
#[command(
    name = "vcf-stream",
    version,
    about = "Stream a VCF file and print the records passing the given filters",
    long_about = None
)]
pub struct Cli {
    /// Plain or compressed VCF file
    #[arg(value_name = "VCF", value_parser = check_file_exists)]
    pub vcf: PathBuf,

    /// Position range (contig:start[-end]), e.g. chr1:12345-67890
    #[arg(short = 'r', long = "range", value_name = "RANGE", value_parser = parse_range)]
    pub ranges: Vec<RangeFilter>,

    /// Keep records carrying this INFO flag
    #[arg(long = "flag", value_name = "FIELD")]
    pub flags: Vec<String>,

    /// Keep records lacking this INFO flag
    #[arg(long = "no-flag", value_name = "FIELD")]
    pub absent_flags: Vec<String>,

    /// Numeric bounds ([info:|format:]FIELD=LOW[..HIGH]), e.g. format:DP=10..200
    #[arg(long = "numeric", value_name = "FILTER", value_parser = parse_numeric)]
    pub numeric: Vec<NumericArg>,

    /// Substring match ([info:|format:]FIELD=TEXT)
    #[arg(long = "contains", value_name = "FILTER", value_parser = parse_text)]
    pub contains: Vec<TextArg>,

    /// Exact match ([info:|format:]FIELD=TEXT)
    #[arg(long = "equals", value_name = "FILTER", value_parser = parse_text)]
    pub equals: Vec<TextArg>,

    /// How numeric and string filters combine multiple values: all, any or none
    #[arg(
        long = "match",
        value_name = "MATCH",
        default_value = "all",
        value_parser = parse_match_type
    )]
    pub match_type: MatchType,

    /// Restrict FORMAT filters to these samples (comma-separated)
    #[arg(long = "samples", value_name = "SAMPLES", value_delimiter = ',')]
    pub samples: Vec<String>,

    /// Print the number of accepted records per contig instead of the records
    #[arg(long = "count")]
    pub count: bool,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericArg {
    pub scope: FieldScope,
    pub field: String,
    pub low: f64,
    pub high: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextArg {
    pub scope: FieldScope,
    pub field: String,
    pub text: String,
}

impl Cli {
    /// Registers every requested filter on a stream whose header is complete.
    pub fn register<R: BufRead>(&self, stream: &mut VcfStream<R>) -> vcf_stream::Result<()> {
        for range in &self.ranges {
            stream.add_range(range.clone());
        }
        for field in &self.flags {
            stream.add_flag_filter(field, true)?;
        }
        for field in &self.absent_flags {
            stream.add_flag_filter(field, false)?;
        }
        for arg in &self.numeric {
            stream.add_numeric_filter(arg.scope, &arg.field, arg.low, arg.high, self.match_type)?;
        }
        let text = self
            .contains
            .iter()
            .map(|arg| (arg, false))
            .chain(self.equals.iter().map(|arg| (arg, true)));
        for (arg, exact) in text {
            stream.add_string_filter(arg.scope, &arg.field, &arg.text, exact, self.match_type)?;
        }
        if !self.samples.is_empty() {
            stream.restrict_samples(&self.samples);
        }
        Ok(())
    }
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match level {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] {} - {}",
                buf.timestamp_seconds(),
                style.value(level),
                record.module_path().unwrap_or("unknown_module"),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        return Err(anyhow!("File does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn parse_position(s: &str, arg: &str) -> Result<u64> {
    s.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid position '{}' in '{}': {}", s, arg, e))
}

/// Parses `contig:start[-end]`.
fn parse_range(s: &str) -> Result<RangeFilter> {
    let (contig, positions) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid range '{}'. Expected 'contig:start[-end]'", s))?;
    let contig = contig.trim();
    if contig.is_empty() {
        return Err(anyhow!("Contig cannot be empty in '{}'", s));
    }
    let (start, end) = match positions.split_once('-') {
        Some((start, end)) => (parse_position(start, s)?, Some(parse_position(end, s)?)),
        None => (parse_position(positions, s)?, None),
    };
    if let Some(end) = end {
        if end < start {
            return Err(anyhow!("End {} precedes start {} in '{}'", end, start, s));
        }
    }
    Ok(RangeFilter::new(contig, start, end))
}

/// Splits `[scope:]FIELD=VALUE`; the scope defaults to INFO.
fn split_field_arg(s: &str) -> Result<(FieldScope, &str, &str)> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid filter '{}'. Expected '[info:|format:]FIELD=VALUE'", s))?;
    let (scope, field) = match target.split_once(':') {
        Some((scope, field)) => (
            FieldScope::from_str(scope).map_err(|_| anyhow!("Unknown scope '{}' in '{}'", scope, s))?,
            field,
        ),
        None => (FieldScope::Info, target),
    };
    if field.is_empty() {
        return Err(anyhow!("Field cannot be empty in '{}'", s));
    }
    Ok((scope, field, value))
}

fn parse_bound(s: &str, arg: &str) -> Result<f64> {
    s.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid bound '{}' in '{}': {}", s, arg, e))
}

/// Parses `[scope:]FIELD=LOW[..HIGH]`.
fn parse_numeric(s: &str) -> Result<NumericArg> {
    let (scope, field, bounds) = split_field_arg(s)?;
    let (low, high) = match bounds.split_once("..") {
        Some((low, high)) => (parse_bound(low, s)?, Some(parse_bound(high, s)?)),
        None => (parse_bound(bounds, s)?, None),
    };
    Ok(NumericArg {
        scope,
        field: field.into(),
        low,
        high,
    })
}

fn parse_text(s: &str) -> Result<TextArg> {
    let (scope, field, text) = split_field_arg(s)?;
    Ok(TextArg {
        scope,
        field: field.into(),
        text: text.into(),
    })
}

fn parse_match_type(s: &str) -> Result<MatchType> {
    MatchType::from_str(s).map_err(|_| anyhow!("Invalid match type '{}'. Expected all, any or none", s))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("chr1:100-200").unwrap(),
            RangeFilter::new("chr1", 100, Some(200))
        );
        assert_eq!(
            parse_range("chrM:16500").unwrap(),
            RangeFilter::new("chrM", 16500, None)
        );
        assert!(parse_range("chr1").is_err());
        assert!(parse_range(":1-2").is_err());
        assert!(parse_range("chr1:200-100").is_err());
        assert!(parse_range("chr1:x").is_err());
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(
            parse_numeric("DP=10").unwrap(),
            NumericArg {
                scope: FieldScope::Info,
                field: "DP".into(),
                low: 10.0,
                high: None
            }
        );
        let arg = parse_numeric("format:DP=0.5..20").unwrap();
        assert_eq!(arg.scope, FieldScope::Format);
        assert_eq!(arg.high, Some(20.0));
        assert!(parse_numeric("sample:DP=1").is_err());
        assert!(parse_numeric("DP").is_err());
        assert!(parse_numeric("DP=abc").is_err());
    }

    #[test]
    fn test_parse_text_keeps_separators_in_value() {
        let arg = parse_text("FORMAT:GT=0/1").unwrap();
        assert_eq!(arg.scope, FieldScope::Format);
        assert_eq!(arg.field, "GT");
        assert_eq!(arg.text, "0/1");
        assert_eq!(parse_text("ZZ=a=b").unwrap().text, "a=b");
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "vcf-stream",
            "resources/example.vcf",
            "-r",
            "chr1:1-50000",
            "--flag",
            "DB",
            "--numeric",
            "format:DP=30",
            "--match",
            "any",
            "--samples",
            "NA001,NA002",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.ranges.len(), 1);
        assert_eq!(cli.flags, vec!["DB"]);
        assert_eq!(cli.match_type, MatchType::Any);
        assert_eq!(cli.samples, vec!["NA001", "NA002"]);
        assert_eq!(cli.verbosity, 2);
        assert!(!cli.count);

        assert!(Cli::try_parse_from(["vcf-stream", "resources/missing.vcf"]).is_err());
    }

    #[test]
    fn test_register_on_stream() {
        let cli = Cli::try_parse_from([
            "vcf-stream",
            "resources/example.vcf",
            "--range",
            "chr1:1-50000",
            "--no-flag",
            "DB",
        ])
        .unwrap();
        let mut stream = VcfStream::from_path(&cli.vcf).unwrap();
        stream.resume(&mut ()).unwrap();
        cli.register(&mut stream).unwrap();
        stream.read_to_end(&mut ()).unwrap();
        // chr1 10397 and 35000, then chr2 15000 and 243199374, chrM 16500
        assert_eq!(stream.all_records().len(), 5);
    }
}
