use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arboard::Clipboard;
use tracing::{debug, info, warn};

use crate::domain::TVCError;
use crate::record::Dataset;

/// Quotes a cell if it holds whitespace, line breaks, commas or quotes. Embedded quotes are doubled.
pub fn csv_cell(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c
        .chars()
        .any(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | ',' | '"'));
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

pub fn csv_header(dataset: &Dataset) -> String {
    dataset
        .columns
        .iter()
        .map(|c| csv_cell(&c.name))
        .collect::<Vec<String>>()
        .join(",")
}

/// All fields of one record, hidden columns included.
pub fn csv_row(dataset: &Dataset, row: usize) -> String {
    (0..dataset.columns.len())
        .map(|col| csv_cell(&dataset.value(row, col).raw()))
        .collect::<Vec<String>>()
        .join(",")
}

/// Writes the header and then `rows` in the given order. Returns the number of records written.
pub fn write_csv<W: Write>(dataset: &Dataset, rows: &[usize], mut out: W) -> Result<usize, TVCError> {
    writeln!(out, "{}", csv_header(dataset))?;
    for &row in rows {
        writeln!(out, "{}", csv_row(dataset, row))?;
    }
    out.flush()?;
    Ok(rows.len())
}

pub fn export_path(dataset: &Dataset, dir: &Path) -> PathBuf {
    let stem: String = dataset
        .name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{stem}.csv"))
}

pub fn export_rows(dataset: &Dataset, rows: &[usize], dir: &Path) -> Result<PathBuf, TVCError> {
    let path = export_path(dataset, dir);
    let file = File::create(&path)?;
    let written = write_csv(dataset, rows, BufWriter::new(file))?;
    info!("Exported {written} rows to {}", path.display());
    Ok(path)
}

/// System clipboard, if one is reachable. Headless sessions have none.
pub struct ClipboardSink {
    clipboard: Option<Clipboard>,
}

impl ClipboardSink {
    pub fn new() -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Clipboard unavailable: {e:?}");
                None
            }
        };
        Self { clipboard }
    }

    pub fn disabled() -> Self {
        Self { clipboard: None }
    }

    pub fn copy(&mut self, text: String) -> bool {
        let Some(clipboard) = self.clipboard.as_mut() else {
            return false;
        };
        match clipboard.set_text(text) {
            Ok(_) => {
                debug!("Copied row to clipboard.");
                true
            }
            Err(e) => {
                warn!("Error copying to clipboard: {e:?}");
                false
            }
        }
    }
}
