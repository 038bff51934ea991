//! Row-text CSV split/join helpers shared by the column-addition utility
//! on both the client and server sides (`spec.md` §4.7).
//!
//! The actual tokenizing is delegated to the `csv` crate — an external
//! collaborator per `spec.md` §1 — these functions just adapt it to the
//! "one logical CSV line, no trailing newline" shape the rest of this
//! crate works with.

/// Split one CSV-encoded line into its fields.
pub fn split_line(line: &str) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|f| f.to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

/// Join fields back into one CSV-encoded line (no trailing newline).
pub fn join_row(fields: &[String]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let text = String::from_utf8(bytes).expect("csv writer output is always valid utf-8 given utf-8 input");
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}
