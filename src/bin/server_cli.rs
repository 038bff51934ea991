//! Server bootstrap CLI (`spec.md` §6): creates the relational table and
//! `tver` index for a new shared table. `tabletype` is recorded nowhere
//! server-side; it only ever governs header-row handling, decided at
//! request-handling time by the caller that constructs `ServerEngine`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rusqlite::Connection;

use shared_table_sync::store::sqlite::create_table;

#[derive(Parser)]
#[command(name = "stbl-server-init")]
struct Cli {
    dbfile: PathBuf,
    tablename: String,
    tabletype: TableType,
}

#[derive(Clone, Copy, ValueEnum)]
enum TableType {
    Stbcsv,
    Csv,
    Other,
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

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), rusqlite::Error> {
    let conn = Connection::open(&cli.dbfile)?;
    create_table(&conn, &cli.tablename)?;
    log::info!("created table {} ({:?}) in {}", cli.tablename, cli.tabletype, cli.dbfile.display());
    Ok(())
}

impl std::fmt::Debug for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TableType::Stbcsv => "stbcsv",
            TableType::Csv => "csv",
            TableType::Other => "other",
        };
        f.write_str(s)
    }
}
