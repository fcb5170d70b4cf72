//! CSV record parser: raw bytes in, lazy candidate-record stream out.
//!
//! Job-fatal checks (encoding, header shape, row limit) happen up front in
//! [`parse`]; everything after that is row-level and never aborts the
//! stream. The stream is single-pass and not restartable.

use csv::ReaderBuilder;

use crate::error::{JobError, RowErrorKind};

/// Maximum number of data rows accepted per batch.
pub const MAX_DATA_ROWS: usize = 5_000;

/// Columns the header must contain, matched case-insensitively.
pub const REQUIRED_COLUMNS: [&str; 4] = ["loginName", "email", "firstName", "lastName"];

const ACTIVE_COLUMN: &str = "active";

/// One raw CSV row, untrimmed and unvalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// 1-based data row number (header is row 0).
    pub row_number: u64,
    pub login_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Raw cell value; `None` when the file has no `active` column at all.
    pub active: Option<String>,
}

/// A row position paired with either a candidate record or the reason the
/// row could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub row_number: u64,
    pub result: Result<CandidateRecord, RowErrorKind>,
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    login_name: usize,
    email: usize,
    first_name: usize,
    last_name: usize,
    active: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, JobError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let mut required = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(name).ok_or_else(|| JobError::MissingColumn(name.to_string()))?;
        }
        let [login_name, email, first_name, last_name] = required;

        Ok(Self {
            login_name,
            email,
            first_name,
            last_name,
            active: find(ACTIVE_COLUMN),
        })
    }
}

/// Parse a CSV byte stream into a lazy sequence of candidate records.
///
/// Fails fast, before yielding any row, on:
/// - invalid UTF-8 (`UnreadableFile`),
/// - a header missing any required column (`MissingColumn`),
/// - more than [`MAX_DATA_ROWS`] data rows (`RowLimitExceeded`).
pub fn parse(bytes: &[u8]) -> Result<RecordStream<'_>, JobError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| JobError::UnreadableFile(format!("not valid UTF-8: {e}")))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| JobError::UnreadableFile(e.to_string()))?
        .clone();
    let columns = ColumnMap::from_headers(&headers)?;

    // Counting pass. A plain line count would miscount quoted newlines, so
    // this walks records the same way the lazy stream will.
    let found = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
        .into_records()
        .count();
    if found > MAX_DATA_ROWS {
        return Err(JobError::RowLimitExceeded {
            found,
            limit: MAX_DATA_ROWS,
        });
    }

    Ok(RecordStream {
        records: reader.into_records(),
        columns,
        row_number: 0,
    })
}

/// Lazy, single-pass stream of parsed rows in original file order.
///
/// Structural problems scoped to one row (column-count mismatch) surface as
/// `MalformedRow` for that row; the stream keeps going.
pub struct RecordStream<'a> {
    records: csv::StringRecordsIntoIter<&'a [u8]>,
    columns: ColumnMap,
    row_number: u64,
}

impl Iterator for RecordStream<'_> {
    type Item = ParsedRow;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.row_number += 1;
        let row_number = self.row_number;

        let result = match record {
            Ok(record) => {
                let cell = |idx: usize| record.get(idx).unwrap_or("").to_string();
                Ok(CandidateRecord {
                    row_number,
                    login_name: cell(self.columns.login_name),
                    email: cell(self.columns.email),
                    first_name: cell(self.columns.first_name),
                    last_name: cell(self.columns.last_name),
                    active: self.columns.active.map(cell),
                })
            }
            Err(e) => Err(RowErrorKind::MalformedRow(e.to_string())),
        };

        Some(ParsedRow { row_number, result })
    }
}
