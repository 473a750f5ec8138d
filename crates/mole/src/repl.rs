//! Interactive command loop.
//!
//! One command per stdin line: `exit`, `exit!`, `index`, `count`,
//! `largerthan <N>`, `namepart <S>`, `owner <UID>`. Unrecognized or
//! malformed lines are silent no-ops. Query commands evaluate their
//! predicate twice under a single database lock - once to count matches,
//! once to print - so the output is always one consistent snapshot.

use std::io::{self, BufRead};
use std::process::ExitCode;

use indexer::{Indexer, IndexedRecord, Predicate, ShutdownMode, TypeCounts};

use crate::pager;

/// Results longer than this go to the pager when one is configured.
const PAGER_THRESHOLD: usize = 3;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Exit,
    ExitForce,
    Index,
    Count,
    Query(Predicate),
}

/// Parses one input line; `None` means a silent no-op.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    match line {
        "exit" => return Some(Command::Exit),
        "exit!" => return Some(Command::ExitForce),
        "index" => return Some(Command::Index),
        "count" => return Some(Command::Count),
        _ => {}
    }

    let (head, rest) = line.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    let predicate = match head {
        "largerthan" => Predicate::LargerThan(rest.parse().ok()?),
        "namepart" => Predicate::NamePart(rest.to_string()),
        "owner" => Predicate::Owner(rest.parse().ok()?),
        _ => return None,
    };
    Some(Command::Query(predicate))
}

/// Runs the command loop until `exit`/`exit!` or end of input. EOF shuts
/// the engine down gracefully but keeps the legacy failure status.
pub fn run(indexer: Indexer) -> ExitCode {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_command(&line) {
            None => {}
            Some(Command::Exit) => {
                if indexer.build_in_progress().unwrap_or(false) {
                    println!("Indexing in progress. Please wait.");
                }
                indexer.shutdown(ShutdownMode::Graceful);
                return ExitCode::SUCCESS;
            }
            Some(Command::ExitForce) => {
                indexer.shutdown(ShutdownMode::Forced);
                return ExitCode::SUCCESS;
            }
            Some(Command::Index) => match indexer.trigger_reindex() {
                Ok(true) => println!("Starting reindexing!"),
                Ok(false) => println!("Indexing already in progress, please wait!"),
                Err(error) => log::error!("cannot start reindexing: {error}"),
            },
            Some(Command::Count) => run_count(&indexer),
            Some(Command::Query(predicate)) => run_query(&indexer, &predicate),
        }
    }

    indexer.shutdown(ShutdownMode::Graceful);
    ExitCode::FAILURE
}

fn run_count(indexer: &Indexer) {
    let counts = indexer.read(|db| TypeCounts::tally(db.records()));
    match counts {
        Ok(counts) => {
            println!("jpg Count: {}", counts.jpeg);
            println!("png Count: {}", counts.png);
            println!("zip Count: {}", counts.zip);
            println!("gzip Count: {}", counts.gzip);
            println!("folder Count: {}", counts.folder);
        }
        Err(error) => log::error!("count failed: {error}"),
    }
}

fn run_query(indexer: &Indexer, predicate: &Predicate) {
    let result = indexer.read(|db| {
        let matches = db.records().filter(|record| predicate.matches(record)).count();

        if matches > PAGER_THRESHOLD {
            if let Some(pager) = pager::configured() {
                match pager::spawn(&pager) {
                    Ok(child) => {
                        pager::page(
                            child,
                            db.records()
                                .filter(|record| predicate.matches(record))
                                .map(|record| format_match(&record)),
                        );
                        return;
                    }
                    Err(error) => {
                        log::warn!("cannot start pager {pager:?}, printing directly: {error}");
                    }
                }
            }
        }

        for record in db.records().filter(|record| predicate.matches(record)) {
            println!("{}", format_match(&record));
        }
    });
    if let Err(error) = result {
        log::error!("query failed: {error}");
    }
}

fn format_match(record: &IndexedRecord) -> String {
    format!("{} {} {}", record.path, record.size, record.tag)
}
