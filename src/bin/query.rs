#![deny(warnings, clippy::all)]

use clap::Parser;
use ctf_fs::query::metadata_info;
use ctf_fs::tracing::try_init_tracing_subscriber;
use std::error::Error as _;
use std::path::PathBuf;
use thiserror::Error;

/// Run the `metadata-info` query against a trace's `metadata` file
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    /// Path to a trace's `metadata` file
    #[clap(name = "metadata-path")]
    pub path: PathBuf,

    /// Print only the reconstructed text, not the `is-packetized` flag
    #[clap(long)]
    pub text_only: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ctf(#[from] ctf_fs::error::Error),
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

    try_init_tracing_subscriber().ok();

    let info = metadata_info(&opts.path).map_err(ctf_fs::error::Error::from)?;

    if opts.text_only {
        print!("{}", info.text);
    } else {
        println!("is-packetized: {}", info.is_packetized);
        println!("---");
        print!("{}", info.text);
    }

    Ok(())
}
