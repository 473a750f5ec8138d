use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indexer::{Indexer, ShutdownMode};

mod cli;
mod pager;
mod repl;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    let Some(index_path) = cli.index_path() else {
        eprintln!("cannot resolve an index path: pass -m, set $MOLE_INDEX_PATH, or set $HOME");
        return ExitCode::FAILURE;
    };

    let (indexer, loaded) = match Indexer::open(&cli.dir, &index_path) {
        Ok(opened) => opened,
        Err(error) => {
            eprintln!("failed to open index {}: {error}", index_path.display());
            return ExitCode::FAILURE;
        }
    };
    if loaded {
        println!("Index file successfully loaded! Awaiting instructions.");
    } else {
        println!("File doesn't exist! Creating new file and indexing in progress...");
    }

    if let Some(seconds) = cli.interval {
        if let Err(error) = indexer.start_scheduler(Duration::from_secs(seconds)) {
            eprintln!("failed to start periodic reindexing: {error}");
            indexer.shutdown(ShutdownMode::Graceful);
            return ExitCode::FAILURE;
        }
    }

    repl::run(indexer)
}
