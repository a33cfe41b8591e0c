//! Streaming reader for tab-delimited submission files.
//!
//! The first non-blank line is the header and must list the declared fields
//! in order. Data rows are yielded one at a time with their 1-based physical
//! line number (the header is line 1); blank lines are skipped.

use std::collections::VecDeque;
use std::io::{self, Read};

use csv::{ReaderBuilder, StringRecord};

use crate::error::{ParseFailure, ReadError};

const BOM: char = '\u{feff}';

/// Remembers where every `\n` of the raw stream sits.
///
/// The parser drops blank lines without reporting them, so physical line
/// numbers are recovered from byte offsets instead.
struct LineTracker<R> {
    inner: R,
    offset: u64,
    newlines: VecDeque<u64>,
    passed: u64,
}

impl<R: Read> LineTracker<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            newlines: VecDeque::new(),
            passed: 0,
        }
    }

    /// 1-based line of the record whose terminator ends right before `end`.
    ///
    /// Records are asked for in stream order, so offsets already passed are
    /// folded into a counter.
    fn line_ending_at(&mut self, end: u64) -> u64 {
        let last = end.saturating_sub(1);
        while self.newlines.front().is_some_and(|offset| *offset < last) {
            self.newlines.pop_front();
            self.passed += 1;
        }
        self.passed + 1
    }
}

impl<R: Read> Read for LineTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for (idx, byte) in buf[..n].iter().enumerate() {
            if *byte == b'\n' {
                self.newlines.push_back(self.offset + idx as u64);
            }
        }
        self.offset += n as u64;
        Ok(n)
    }
}

pub struct TsvReader<R: Read> {
    file_name: String,
    reader: csv::Reader<LineTracker<R>>,
    record: StringRecord,
    field_count: usize,
    rows: u64,
}

/// One data row borrowed from the reader.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub line: i64,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    pub fn get(&self, idx: usize) -> Option<&'a str> {
        self.record.get(idx)
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}

impl<R: Read> TsvReader<R> {
    /// Opens the stream and validates its header against `fields`.
    pub fn new(
        file_name: impl Into<String>,
        source: R,
        fields: &[String],
    ) -> Result<Self, ReadError> {
        let file_name = file_name.into();
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(LineTracker::new(source));

        let mut header = StringRecord::new();
        let has_header = reader
            .read_record(&mut header)
            .map_err(|err| ReadError::from_csv(&file_name, err))?;
        if !has_header {
            return Err(ParseFailure::MissingHeader { file_name }.into());
        }

        let found: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                if idx == 0 {
                    cell.trim_start_matches(BOM).to_string()
                } else {
                    cell.to_string()
                }
            })
            .collect();
        if found != fields {
            return Err(ParseFailure::HeaderMismatch {
                file_name,
                expected: fields.to_vec(),
                found,
            }
            .into());
        }

        Ok(Self {
            file_name,
            reader,
            record: StringRecord::new(),
            field_count: fields.len(),
            rows: 0,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Data rows read so far.
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    /// Next data row, or `None` at end of input.
    ///
    /// A row whose width differs from the declared field count is a
    /// [`ParseFailure::FieldCount`].
    pub fn next_row(&mut self) -> Result<Option<Row<'_>>, ReadError> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|err| ReadError::from_csv(&self.file_name, err))?;
        if !more {
            return Ok(None);
        }
        let end = self.reader.position().byte();
        let line = self.reader.get_mut().line_ending_at(end);
        if self.record.len() != self.field_count {
            return Err(ParseFailure::FieldCount {
                file_name: self.file_name.clone(),
                line,
                expected: self.field_count,
                found: self.record.len(),
            }
            .into());
        }
        self.rows += 1;
        Ok(Some(Row {
            line: i64::try_from(line).unwrap_or(i64::MAX),
            record: &self.record,
        }))
    }
}
