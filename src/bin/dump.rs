use clap::Parser;
use ctf_reader::{prelude::*, tracing::try_init_tracing_subscriber};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Print the events of CTF stream files in timestamp order
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    #[clap(flatten)]
    pub reader_opts: ReaderOpts,

    /// Print per-stream packet spans and event counts instead of the events
    #[clap(long, help_heading = "OUTPUT")]
    pub summary: bool,

    /// Stream files, or directories containing stream files
    #[clap(name = "input", help_heading = "READER CONFIGURATION")]
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ctf(#[from] ctf_reader::Error),

    #[error("At least one CTF stream input path is required.")]
    MissingInputs,

    #[error("A schema file describing the trace is required.")]
    MissingSchema,
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    try_init_tracing_subscriber()?;

    let intr = Interruptor::new();
    let interruptor = intr.clone();
    ctrlc::set_handler(move || {
        if intr.is_set() {
            // 128 (fatal error signal "n") + 2 (control-c is fatal error signal 2)
            std::process::exit(130);
        } else {
            intr.set();
        }
    })?;

    let mut cfg = CtfConfig::load_merge_with_opts(opts.reader_opts)?;
    if !opts.inputs.is_empty() {
        cfg.inputs = opts.inputs;
    }
    if cfg.inputs.is_empty() {
        return Err(Error::MissingInputs.into());
    }
    let schema_path = cfg.schema.clone().ok_or(Error::MissingSchema)?;
    let metadata = TraceSchema::from_file(&schema_path)
        .and_then(|s| s.to_metadata())
        .map_err(Error::from)?;

    let stream_files = expand_inputs(&cfg.inputs, &schema_path)?;
    debug!(count = stream_files.len(), "Opening stream files");
    let mut reader =
        TraceReader::open_with_policy(Arc::new(metadata), &stream_files, cfg.lost_events_policy)
            .map_err(Error::from)?;

    if let Some(ts) = cfg.seek {
        if !reader.seek(ts) {
            warn!("No events at or after timestamp {ts}");
        }
    }

    let mut emitted: u64 = 0;
    let mut counts: HashMap<PathBuf, u64> = HashMap::new();
    while let Some(event) = reader.current_event_def() {
        if interruptor.is_set() || cfg.limit.map_or(false, |l| emitted >= l) {
            break;
        }
        if opts.summary {
            if let Some(s) = reader.current_stream() {
                *counts.entry(s.path().to_path_buf()).or_default() += event.event_count();
            }
        } else {
            println!("{event}");
        }
        emitted += 1;

        if let Err(e) = reader.advance() {
            debug!(error = %e, "Event decoding failed");
        }
    }

    if opts.summary {
        print_summary(&reader, &counts);
    }

    Ok(())
}

/// Stream files named by the inputs. Directories contribute every regular
/// file except hidden ones, the `metadata` file and the schema.
fn expand_inputs(inputs: &[PathBuf], schema: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for input in inputs.iter() {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(input)? {
            let path = entry?.path();
            let skip = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n == "metadata" || n.starts_with('.'),
                None => true,
            };
            if !skip && path.is_file() && path != schema {
                entries.push(path);
            }
        }
        if entries.is_empty() {
            warn!("Input path '{}' does not contain any stream files", input.display());
        }
        entries.sort();
        files.extend(entries);
    }
    Ok(files)
}

fn print_summary(reader: &TraceReader, counts: &HashMap<PathBuf, u64>) {
    let mut total = 0;
    for s in reader.streams() {
        let index = s.packet_index();
        let span = |ts: Option<u64>| match ts {
            Some(u64::MAX) => "open".to_owned(),
            Some(ts) => ts.to_string(),
            None => "-".to_owned(),
        };
        let target = index
            .get(0)
            .map(|e| e.target().to_string())
            .unwrap_or_default();
        let count = counts.get(s.path()).copied().unwrap_or(0);
        total += count;
        println!(
            "{}: stream {}, {} packets, [{}, {}], target {}, {} lost, {} events",
            s.path().display(),
            s.stream_id(),
            index.len(),
            span(index.timestamp_begin()),
            span(index.timestamp_end()),
            target,
            index.lost_events(),
            count,
        );
    }
    for (path, e) in reader.failed_inputs() {
        println!("{}: failed, {e}", path.display());
    }
    println!("total: {total} events");
}
