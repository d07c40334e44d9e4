#![deny(warnings, clippy::all)]

use clap::Parser;
use ctf_fs::config::{SinkParams, SourceParams};
use ctf_fs::opts::{SinkOpts, SourceOpts};
use ctf_fs::prelude::*;
use ctf_fs::tracing::try_init_tracing_subscriber;
use std::error::Error as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Copy CTF trace data from one filesystem location to another, re-serializing every
/// discovered trace through this crate's source and sink.
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    #[clap(flatten)]
    pub source: SourceOpts,

    /// Output directory to write mirrored trace directories into
    #[clap(name = "output")]
    pub output_base: std::path::PathBuf,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ctf(#[from] ctf_fs::error::Error),

    #[error("No CTF trace directories were found to copy")]
    NothingToCopy,
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

fn do_main() -> Result<(), Error> {
    let opts = Opts::parse();

    try_init_tracing_subscriber().map_err(|e| {
        eprintln!("Failed to init tracing: {e}");
        ctf_fs::error::Error::Config("failed to init tracing".to_string())
    })?;

    let intr = Interruptor::new();
    let interruptor = intr.clone();
    ctrlc::set_handler(move || {
        if intr.is_set() {
            // 128 (fatal error signal "n") + 2 (control-c is fatal error signal 2)
            std::process::exit(130);
        } else {
            intr.set();
        }
    })
    .expect("failed to install ctrlc handler");

    let source_params = SourceParams::merge_with_opts(opts.source);
    let sink_params = SinkParams::merge_with_opts(SinkOpts {
        config_file: None,
        output_base: opts.output_base,
    });

    let discovered = discover(&source_params.path).map_err(ctf_fs::error::Error::from)?;
    if discovered.is_empty() {
        return Err(Error::NothingToCopy);
    }

    let policy = PreEpochPolicy::Drop;
    let traces = load_traces(
        discovered,
        policy,
        source_params.offset_s,
        source_params.offset_ns,
    );
    if traces.is_empty() {
        warn!("No traces could be loaded from the discovered directories");
        return Ok(());
    }

    let sink = Arc::new(SinkMirror::new(sink_params.output_base));

    for trace in traces {
        tracing::info!(trace = %trace.display_name, ports = trace.ports.len(), "copying trace");
        let iterators: Result<Vec<SourceIterator>, ctf_fs::error::Error> = trace
            .ports
            .into_iter()
            .map(|group| SourceIterator::new(group).map_err(ctf_fs::error::Error::from))
            .collect();
        let iterators = iterators?;
        ctf_fs::graph::run_copy(iterators, sink.clone(), interruptor.clone())?;
    }

    Ok(())
}
