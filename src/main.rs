mod cli;

use std::io::{self, BufWriter, Write};
use std::time;

use anyhow::Result;
use clap::Parser;
use cli::{init_verbose, Cli};
use vcf_stream::{Control, Observer, Progress, VariantRecord, VcfError, VcfStream};

/// Writes every accepted record as its raw line. A failed write pauses the
/// stream so the error can be reported.
struct RecordPrinter<W: Write> {
    out: W,
    print: bool,
    error: Option<io::Error>,
}

impl<W: Write> Observer for RecordPrinter<W> {
    fn on_record_accepted(&mut self, record: &VariantRecord) -> Control {
        if !self.print {
            return Control::Continue;
        }
        match writeln!(self.out, "{}", record.raw_line()) {
            Ok(()) => Control::Continue,
            Err(e) => {
                self.error = Some(e);
                Control::Pause
            }
        }
    }
}

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    log::trace!("CLI options set: {:?}", cli);
    log::info!("Running {}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let start_timer = time::Instant::now();
    let mut stream = VcfStream::from_path(&cli.vcf)?;
    let stdout = io::stdout();
    let mut printer = RecordPrinter {
        out: BufWriter::new(stdout.lock()),
        print: !cli.count,
        error: None,
    };

    loop {
        match stream.resume(&mut printer) {
            Ok(Progress::HeaderComplete) => cli.register(&mut stream)?,
            Ok(Progress::Paused) => {
                if let Some(e) = printer.error.take() {
                    return Err(e.into());
                }
            }
            Ok(Progress::Complete) => break,
            Err(VcfError::Variant(e)) => log::warn!("Skipping record: {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    if cli.count {
        for (contig, records) in stream.variants() {
            writeln!(printer.out, "{}\t{}", contig, records.len())?;
        }
    }
    printer.out.flush()?;

    log::info!(
        "Accepted {} records in {:.2?}",
        stream.all_records().len(),
        start_timer.elapsed()
    );
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
