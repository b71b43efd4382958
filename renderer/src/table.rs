use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{Position, ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::RenderError;

/// One CSV record with the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// 1-based line in the source file.
    pub line: u64,
    pub cells: Vec<String>,
}

/// A CSV source loaded into memory. Rows may differ in width.
#[derive(Debug, Clone)]
pub struct Table {
    pub path: PathBuf,
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Load a comma-delimited file, skipping `#` comment lines.
/// The file is closed before this returns.
pub fn load_table(path: &Path) -> Result<Table, RenderError> {
    let file = File::open(path).map_err(|e| RenderError::SourceUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let table = read_table(file, path)?;
    debug!(path = %path.display(), rows = table.len(), "loaded table");
    Ok(table)
}

/// Read CSV from any reader. `path` is only used for error messages.
///
/// A record whose quotes do not pair up (an unterminated quoted field, or a
/// stray `"` inside a field) is a `MalformedRow`.
pub fn read_table<R: Read>(mut input: R, path: &Path) -> Result<Table, RenderError> {
    let mut data = Vec::new();
    input
        .read_to_end(&mut data)
        .map_err(|e| RenderError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b',')
        .comment(Some(b'#'))
        .from_reader(data.as_slice());

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let start = reader.position().clone();
        let more = reader
            .read_record(&mut record)
            .map_err(|e| csv_error(path, &data, e))?;
        if !more {
            break;
        }

        let (first_byte, line) = record_start(&data, &start);
        let end = (reader.position().byte() as usize).clamp(first_byte, data.len());
        let quotes = data[first_byte..end].iter().filter(|&&b| b == b'"').count();
        if quotes % 2 == 1 {
            return Err(RenderError::MalformedRow {
                path: path.to_path_buf(),
                line,
                reason: "unterminated or stray `\"` in record".to_string(),
            });
        }

        rows.push(TableRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(Table {
        path: path.to_path_buf(),
        rows,
    })
}

/// Byte offset and 1-based line where a record really begins.
///
/// The reader reports the position where it started looking, which sits
/// before any blank or `#` comment lines it skipped on the way.
fn record_start(data: &[u8], pos: &Position) -> (usize, u64) {
    let mut offset = (pos.byte() as usize).min(data.len());
    let mut line = pos.line();
    while offset < data.len() {
        match data[offset] {
            b'\n' => {
                offset += 1;
                line += 1;
            }
            b'\r' => offset += 1,
            b'#' => match data[offset..].iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    offset += newline + 1;
                    line += 1;
                }
                None => offset = data.len(),
            },
            _ => break,
        }
    }
    (offset, line)
}

fn csv_error(path: &Path, data: &[u8], err: csv::Error) -> RenderError {
    if let csv::ErrorKind::Io(io_err) = err.kind() {
        return RenderError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: io_err.to_string(),
        };
    }
    RenderError::MalformedRow {
        path: path.to_path_buf(),
        line: err.position().map(|p| record_start(data, p).1).unwrap_or(0),
        reason: err.to_string(),
    }
}
