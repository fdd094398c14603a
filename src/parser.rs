use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::{anychar, char, digit1, multispace0, one_of};
use nom::combinator::{all_consuming, map_res, opt, recognize, rest, value};
use nom::multi::{many0, separated_list0};
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;

use crate::record::GenotypeAllele;
use crate::types::Number;

/// A double-quoted value. Commas inside do not separate entries;
/// backslash escapes are kept as written.
fn string(input: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0(alt((
            is_not("\\\""),
            recognize(pair(char('\\'), anychar)),
        )))),
        char('"'),
    )(input)
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        preceded(multispace0, is_not("<,=>")),
        char('='),
        alt((string, is_not(",>"))),
    )(input)
}

fn keys_and_values(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    separated_list0(char(','), key_value)(input)
}

/// Splits the part after `##` into key and raw value.
pub(crate) fn header_entry(entry: &str) -> Option<(&str, &str)> {
    let parsed: IResult<&str, (&str, &str)> = separated_pair(is_not("="), char('='), rest)(entry);
    parsed.ok().map(|(_, kv)| kv)
}

/// Parses `<ID=DP,Number=1,Description="a, b">` into its key/value pairs, in order.
pub(crate) fn structured(value: &str) -> Option<Vec<(&str, &str)>> {
    let parsed: IResult<&str, Vec<(&str, &str)>> = all_consuming(delimited(
        char('<'),
        keys_and_values,
        preceded(multispace0, char('>')),
    ))(value.trim_end());
    parsed.ok().map(|(_, pairs)| pairs)
}

fn info_number(input: &str) -> IResult<&str, Number> {
    alt((
        map_res(digit1, |digits: &str| digits.parse().map(Number::Count)),
        value(Number::AlternateAlleles, char('A')),
        value(Number::Alleles, char('R')),
        value(Number::Genotypes, char('G')),
        value(Number::Unknown, char('.')),
    ))(input)
}

pub(crate) fn number(text: &str) -> Option<Number> {
    all_consuming(info_number)(text).ok().map(|(_, n)| n)
}

/// Leading integer of `text`, ignoring whatever follows it; 0 if there is none.
pub(crate) fn leading_integer(text: &str) -> i64 {
    let parsed: IResult<&str, i64> = preceded(multispace0, nom::character::complete::i64)(text);
    parsed.map(|(_, v)| v).unwrap_or(0)
}

/// Leading integer of a POS column: 0 without digits, `None` when the
/// digits do not fit an `i64`.
pub(crate) fn leading_position(text: &str) -> Option<i64> {
    let parsed: IResult<&str, &str> =
        preceded(multispace0, recognize(pair(opt(one_of("+-")), digit1)))(text);
    match parsed {
        Ok((_, digits)) => digits.parse().ok(),
        Err(_) => Some(0),
    }
}

/// Leading float of `text`; 0 if there is none.
pub(crate) fn leading_float(text: &str) -> f64 {
    let parsed: IResult<&str, f64> = preceded(multispace0, double)(text);
    match parsed {
        Ok((_, v)) if !v.is_nan() => v,
        _ => 0.0,
    }
}

fn allele(input: &str) -> IResult<&str, Option<i32>> {
    alt((
        map_res(digit1, |digits: &str| digits.parse().map(Some)),
        value(None, char('.')),
    ))(input)
}

/// Parses a GT value such as `0/1`, `1|0` or `./.`.
pub(crate) fn genotype(text: &str) -> Option<Vec<GenotypeAllele>> {
    let parsed: IResult<&str, (Option<i32>, Vec<(char, Option<i32>)>)> =
        all_consuming(pair(allele, many0(pair(one_of("/|"), allele))))(text);
    let (_, (first, others)) = parsed.ok()?;
    let mut alleles = vec![GenotypeAllele::new(first, false)];
    alleles.extend(
        others
            .into_iter()
            .map(|(separator, index)| GenotypeAllele::new(index, separator == '|')),
    );
    Some(alleles)
}
