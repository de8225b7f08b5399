//! Dry-run output.

use crate::models::{PersonRecord, WriteOperation};
use crate::services::OperationSink;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PlanLine<'a> {
    record: i64,
    name: String,
    #[serde(flatten)]
    operation: &'a WriteOperation,
}

/// Writes each planned operation as one JSON line instead of applying it.
pub struct PlanWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> PlanWriter<W> {
    /// Creates a plan writer over `out`.
    pub const fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Number of operations written so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OperationSink for PlanWriter<W> {
    fn submit(&mut self, record: &PersonRecord, ops: &[WriteOperation]) -> Result<()> {
        for operation in ops {
            let line = PlanLine {
                record: record.id.0,
                name: record.full_name(),
                operation,
            };
            serde_json::to_writer(&mut self.out, &line)
                .map_err(|e| Error::failed("write_plan", e))?;
            self.out
                .write_all(b"\n")
                .map_err(|e| Error::failed("write_plan", e))?;
            self.written += 1;
        }
        self.out.flush().map_err(|e| Error::failed("write_plan", e))
    }
}
