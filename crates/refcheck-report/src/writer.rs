//! JSON-lines streaming of error records.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use refcheck_model::{FileErrorCollection, SubmissionReport, SubmissionSchema};

use crate::error::{ReportError, Result};
use crate::record::ErrorRecord;

/// Streams error records to one open sink, one JSON object per line.
///
/// The sink stays open across writes; [`finish`](Self::finish) flushes it
/// and hands it back.
pub struct ReportWriter<W: Write> {
    sink: W,
    written: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, written: 0 }
    }

    pub fn write_record(&mut self, record: &ErrorRecord) -> Result<()> {
        serde_json::to_writer(&mut self.sink, record).map_err(ReportError::Serialize)?;
        self.sink.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Writes every violation of `collection` in line order.
    pub fn write_collection(
        &mut self,
        collection: &FileErrorCollection,
        schema: &SubmissionSchema,
    ) -> Result<usize> {
        let mut count = 0;
        for error in collection.iter() {
            let record = ErrorRecord::describe(error, &collection.file_type, schema)?;
            self.write_record(&record)?;
            count += 1;
        }
        if count > 0 {
            tracing::debug!(
                file = %collection.file_name,
                records = count,
                "wrote error records"
            );
        }
        Ok(count)
    }

    /// Writes all collections of `report`, ordered by file name.
    pub fn write_report(
        &mut self,
        report: &SubmissionReport,
        schema: &SubmissionSchema,
    ) -> Result<usize> {
        let mut count = 0;
        for collection in report.files() {
            count += self.write_collection(collection, schema)?;
        }
        Ok(count)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Reads records written by [`ReportWriter`]. Blank lines are ignored.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<ErrorRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|source| ReportError::Parse {
                line: idx + 1,
                source,
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Counts per violation code and per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub total: usize,
    pub by_error_type: BTreeMap<String, usize>,
    pub by_file: BTreeMap<String, usize>,
}

impl ReportSummary {
    pub fn from_report(report: &SubmissionReport) -> Self {
        let mut summary = Self::default();
        for error in report.errors() {
            summary.add(error.kind.code(), &error.file_name);
        }
        summary
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ErrorRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add(&record.error_type, &record.file_name);
        }
        summary
    }

    fn add(&mut self, error_type: &str, file_name: &str) {
        self.total += 1;
        *self
            .by_error_type
            .entry(error_type.to_string())
            .or_insert(0) += 1;
        *self.by_file.entry(file_name.to_string()).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
