//! Client CLI (`spec.md` §6): offline CSV import/export/update against a
//! local store, independent of any network transport.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use shared_table_sync::client::{CsvView, LocalStore};
use shared_table_sync::server::TableFormat;
use shared_table_sync::SyncError;

#[derive(Parser)]
#[command(name = "stbl-client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append every line of `csv_file` as a pending-new row.
    Import { local_store: PathBuf, csv_file: PathBuf },
    /// Write the current snapshot (synced rows, then pending-new) to `csv_file`.
    Export { local_store: PathBuf, csv_file: PathBuf },
    /// Replace rows positionally from `csv_file`.
    Update { local_store: PathBuf, csv_file: PathBuf },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(255);
        }
    };

    let result = match cli.command {
        Command::Import { local_store, csv_file } => import(&local_store, &csv_file),
        Command::Export { local_store, csv_file } => export(&local_store, &csv_file),
        Command::Update { local_store, csv_file } => update(&local_store, &csv_file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, SyncError> {
    let file = File::open(path)?;
    BufReader::new(file).lines().map(|l| l.map_err(SyncError::from)).collect()
}

fn import(local_store: &Path, csv_file: &Path) -> Result<(), SyncError> {
    let mut store = LocalStore::load(local_store)?;
    for line in read_lines(csv_file)? {
        store.add(line);
    }
    store.save(local_store)
}

fn export(local_store: &Path, csv_file: &Path) -> Result<(), SyncError> {
    let mut store = LocalStore::load(local_store)?;
    let lines = CsvView::new(&mut store, TableFormat::Stbcsv).reader();
    let mut out = File::create(csv_file)?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn update(local_store: &Path, csv_file: &Path) -> Result<(), SyncError> {
    let mut store = LocalStore::load(local_store)?;
    let mut view = CsvView::new(&mut store, TableFormat::Stbcsv);
    view.reader();
    view.writer()?;
    for line in read_lines(csv_file)? {
        view.write(&line)?;
    }
    store.save(local_store)
}
