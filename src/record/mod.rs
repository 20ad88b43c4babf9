//! Line-delimited JSON input records
//!
//! Each input line holds one JSON object. Blank lines are skipped; any other
//! line that is not a well-formed record of the expected shape becomes a
//! [`ParseError`] and does not stop the file.

mod external;
mod finding;

pub use external::{ExternalItemRecord, GroundedEntity, NormalizedItem};
pub use finding::{
    EntityRef, EvidenceStrength, FindingRecord, Magnitude, OntologyTerm, OrganismRef,
    PaperMetadata, Provenance,
};

use serde::de::DeserializeOwned;
use std::io::BufRead;
use std::marker::PhantomData;
use thiserror::Error;

/// A line that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// One successfully parsed record and where it came from
#[derive(Debug, Clone)]
pub struct ParsedRecord<T> {
    /// 1-based line number in the input
    pub line: usize,
    /// The line as read, used for content-derived identifiers
    pub raw: String,
    pub record: T,
}

/// Parse one input line.
pub fn parse_line<T: DeserializeOwned>(line: usize, raw: &str) -> Result<ParsedRecord<T>, ParseError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| ParseError {
        line,
        message: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(ParseError {
            line,
            message: "expected a JSON object".to_string(),
        });
    }
    let record = serde_json::from_value(value).map_err(|e| ParseError {
        line,
        message: e.to_string(),
    })?;
    Ok(ParsedRecord {
        line,
        raw: raw.to_string(),
        record,
    })
}

/// Streams records from line-delimited JSON
pub struct RecordReader<R, T> {
    lines: std::io::Lines<R>,
    line_no: usize,
    _record: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DeserializeOwned> RecordReader<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            _record: PhantomData,
        }
    }

    /// Group the stream into batches of up to `size` parsed records.
    pub fn batches(self, size: usize) -> Batches<R, T> {
        Batches {
            reader: self,
            size: size.max(1),
        }
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for RecordReader<R, T> {
    type Item = Result<ParsedRecord<T>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(parse_line(self.line_no, &line)),
                Err(e) => {
                    return Some(Err(ParseError {
                        line: self.line_no,
                        message: e.to_string(),
                    }))
                }
            }
        }
    }
}

/// Parsed records plus the lines that failed while filling the batch
#[derive(Debug)]
pub struct Batch<T> {
    pub records: Vec<ParsedRecord<T>>,
    pub parse_errors: Vec<ParseError>,
}

/// Iterator over [`Batch`]es; see [`RecordReader::batches`]
pub struct Batches<R, T> {
    reader: RecordReader<R, T>,
    size: usize,
}

impl<R: BufRead, T: DeserializeOwned> Iterator for Batches<R, T> {
    type Item = Batch<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Batch {
            records: Vec::with_capacity(self.size),
            parse_errors: Vec::new(),
        };
        while batch.records.len() < self.size {
            match self.reader.next() {
                Some(Ok(record)) => batch.records.push(record),
                Some(Err(e)) => batch.parse_errors.push(e),
                None => break,
            }
        }
        if batch.records.is_empty() && batch.parse_errors.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}
