use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vcf_stream::{FieldScope, MatchType, VcfStream};

const PATH: &str = "resources/example.vcf";
const REPEATS: usize = 1000;

/// The example header followed by its body lines repeated `REPEATS` times.
fn input() -> String {
    let text = std::fs::read_to_string(PATH).unwrap();
    let (header, body): (Vec<&str>, Vec<&str>) = text.lines().partition(|l| l.starts_with('#'));
    let mut input = header.join("\n");
    input.push('\n');
    for _ in 0..REPEATS {
        for line in &body {
            input.push_str(line);
            input.push('\n');
        }
    }
    input
}

fn unfiltered(input: &str) -> usize {
    let mut stream = VcfStream::new(Cursor::new(input));
    stream.read_to_end(&mut ()).unwrap();
    stream.all_records().len()
}

fn filtered(input: &str) -> usize {
    let mut stream = VcfStream::new(Cursor::new(input));
    stream.resume(&mut ()).unwrap();
    stream
        .add_numeric_filter(FieldScope::Info, "DP", 50.0, None, MatchType::All)
        .unwrap();
    stream.add_flag_filter("DB", true).unwrap();
    stream.read_to_end(&mut ()).unwrap();
    stream.all_records().len()
}

fn benchmark_stream(c: &mut Criterion) {
    let input = input();
    let mut group = c.benchmark_group("STREAM");
    group.bench_with_input(BenchmarkId::new("UNFILTERED", PATH), &input, |b, input| {
        b.iter(|| unfiltered(black_box(input)))
    });
    group.bench_with_input(BenchmarkId::new("INFO_DP_AND_DB", PATH), &input, |b, input| {
        b.iter(|| filtered(black_box(input)))
    });
}

criterion_group!(benches, benchmark_stream);
criterion_main!(benches);
